//! Instruction execution for the 8080.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_possible_truncation)]

use emu_core::{CpuContext, CpuError, CpuModel, CF, NF, XF, YF};

use crate::alu;

/// Execute one instruction step: age the EI shield, service a pending bus
/// request, deliver a pending interrupt, then fetch and dispatch.
pub fn step(ctx: &mut CpuContext) {
    // EI shields exactly the one instruction that follows it.
    let protected = ctx.int_protection;
    ctx.int_protection = false;

    if ctx.devices.bus_request_pending() {
        ctx.service_bus_request();
    }

    if !protected && ctx.regs.iff1 && ctx.devices.int_pending() {
        let data = ctx.devices.take_interrupt();
        ctx.regs.iff1 = false;
        ctx.regs.iff2 = false;
        if ctx.halted {
            // Resume after the HALT the CPU was parked on.
            ctx.regs.pc = ctx.regs.pc.wrapping_add(1);
            ctx.halted = false;
        }
        ctx.set_inta_status();
        if data < 0 {
            ctx.stop_with(CpuError::IntError { data });
            return;
        }
        // The device byte is executed as if it were the next fetched opcode,
        // typically RST n or CALL.
        execute(ctx, data as u8);
        return;
    }

    let op = ctx.fetch_opcode();
    execute(ctx, op);
}

/// 3-bit register field access (r != 6).
fn get_reg(ctx: &CpuContext, r: u8) -> u8 {
    match r & 7 {
        0 => ctx.regs.b,
        1 => ctx.regs.c,
        2 => ctx.regs.d,
        3 => ctx.regs.e,
        4 => ctx.regs.h,
        5 => ctx.regs.l,
        7 => ctx.regs.a,
        _ => unreachable!("M operand handled by the caller"),
    }
}

fn set_reg(ctx: &mut CpuContext, r: u8, value: u8) {
    match r & 7 {
        0 => ctx.regs.b = value,
        1 => ctx.regs.c = value,
        2 => ctx.regs.d = value,
        3 => ctx.regs.e = value,
        4 => ctx.regs.h = value,
        5 => ctx.regs.l = value,
        7 => ctx.regs.a = value,
        _ => unreachable!("M operand handled by the caller"),
    }
}

/// 2-bit register-pair field (SP variant).
fn get_rp(ctx: &CpuContext, rp: u8) -> u16 {
    match rp & 3 {
        0 => ctx.regs.bc(),
        1 => ctx.regs.de(),
        2 => ctx.regs.hl(),
        _ => ctx.regs.sp,
    }
}

fn set_rp(ctx: &mut CpuContext, rp: u8, value: u16) {
    match rp & 3 {
        0 => ctx.regs.set_bc(value),
        1 => ctx.regs.set_de(value),
        2 => ctx.regs.set_hl(value),
        _ => ctx.regs.sp = value,
    }
}

/// Condition code field (NZ, Z, NC, C, PO, PE, P, M).
fn condition(f: u8, cc: u8) -> bool {
    use emu_core::{PF, SF, ZF};
    match cc & 7 {
        0 => f & ZF == 0,
        1 => f & ZF != 0,
        2 => f & CF == 0,
        3 => f & CF != 0,
        4 => f & PF == 0,
        5 => f & PF != 0,
        6 => f & SF == 0,
        7 => f & SF != 0,
        _ => unreachable!(),
    }
}

/// ALU operation field (ADD, ADC, SUB, SBB, ANA, XRA, ORA, CMP).
fn alu_a(ctx: &mut CpuContext, alu_op: u8, value: u8) {
    let a = ctx.regs.a;
    let carry = ctx.regs.f & CF != 0;
    let result = match alu_op & 7 {
        0 => alu::add8(a, value, false),
        1 => alu::add8(a, value, carry),
        2 => alu::sub8(a, value, false),
        3 => alu::sub8(a, value, carry),
        4 => alu::ana(a, value),
        5 => alu::xra(a, value),
        6 => alu::ora(a, value),
        _ => alu::sub8(a, value, false), // CMP: result discarded
    };
    if alu_op & 7 != 7 {
        ctx.regs.a = result.value;
    }
    ctx.regs.f = result.flags;
}

/// Dispatch one opcode and account its T-states.
fn execute(ctx: &mut CpuContext, op: u8) {
    let t = match op {
        // NOP
        0x00 => 4,

        // Undocumented NOP mirrors
        0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => {
            if ctx.conf.undoc_inst {
                4
            } else {
                ctx.stop_with(CpuError::OpTrap1 {
                    addr: ctx.regs.pc.wrapping_sub(1),
                    op,
                });
                0
            }
        }

        // LXI rp, nn (01=B, 11=D, 21=H, 31=SP)
        0x01 | 0x11 | 0x21 | 0x31 => {
            let value = ctx.fetch_operand_word();
            set_rp(ctx, (op >> 4) & 3, value);
            10
        }

        // STAX B / STAX D
        0x02 | 0x12 => {
            let addr = if op == 0x02 { ctx.regs.bc() } else { ctx.regs.de() };
            ctx.mem_write(addr, ctx.regs.a);
            7
        }

        // LDAX B / LDAX D
        0x0A | 0x1A => {
            let addr = if op == 0x0A { ctx.regs.bc() } else { ctx.regs.de() };
            ctx.regs.a = ctx.mem_read(addr);
            7
        }

        // INX rp
        0x03 | 0x13 | 0x23 | 0x33 => {
            let rp = (op >> 4) & 3;
            set_rp(ctx, rp, get_rp(ctx, rp).wrapping_add(1));
            5
        }

        // DCX rp
        0x0B | 0x1B | 0x2B | 0x3B => {
            let rp = (op >> 4) & 3;
            set_rp(ctx, rp, get_rp(ctx, rp).wrapping_sub(1));
            5
        }

        // INR r (04=B .. 3C=A), INR M (34)
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
            let r = (op >> 3) & 7;
            if r == 6 {
                let addr = ctx.regs.hl();
                let result = alu::inr(ctx.mem_read(addr));
                ctx.mem_write(addr, result.value);
                ctx.regs.f = (ctx.regs.f & CF) | result.flags;
                10
            } else {
                let result = alu::inr(get_reg(ctx, r));
                set_reg(ctx, r, result.value);
                ctx.regs.f = (ctx.regs.f & CF) | result.flags;
                5
            }
        }

        // DCR r, DCR M (35)
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
            let r = (op >> 3) & 7;
            if r == 6 {
                let addr = ctx.regs.hl();
                let result = alu::dcr(ctx.mem_read(addr));
                ctx.mem_write(addr, result.value);
                ctx.regs.f = (ctx.regs.f & CF) | result.flags;
                10
            } else {
                let result = alu::dcr(get_reg(ctx, r));
                set_reg(ctx, r, result.value);
                ctx.regs.f = (ctx.regs.f & CF) | result.flags;
                5
            }
        }

        // MVI r, n / MVI M, n (36)
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            let value = ctx.fetch_operand();
            let r = (op >> 3) & 7;
            if r == 6 {
                ctx.mem_write(ctx.regs.hl(), value);
                10
            } else {
                set_reg(ctx, r, value);
                7
            }
        }

        // RLC
        0x07 => {
            let carry = ctx.regs.a >> 7;
            ctx.regs.a = (ctx.regs.a << 1) | carry;
            ctx.regs.f = (ctx.regs.f & !CF) | carry;
            4
        }

        // RRC
        0x0F => {
            let carry = ctx.regs.a & 1;
            ctx.regs.a = (ctx.regs.a >> 1) | (carry << 7);
            ctx.regs.f = (ctx.regs.f & !CF) | carry;
            4
        }

        // RAL
        0x17 => {
            let carry = ctx.regs.a >> 7;
            ctx.regs.a = (ctx.regs.a << 1) | (ctx.regs.f & CF);
            ctx.regs.f = (ctx.regs.f & !CF) | carry;
            4
        }

        // RAR
        0x1F => {
            let carry = ctx.regs.a & 1;
            ctx.regs.a = (ctx.regs.a >> 1) | ((ctx.regs.f & CF) << 7);
            ctx.regs.f = (ctx.regs.f & !CF) | carry;
            4
        }

        // DAD rp
        0x09 | 0x19 | 0x29 | 0x39 => {
            let (result, carry) = alu::dad(ctx.regs.hl(), get_rp(ctx, (op >> 4) & 3));
            ctx.regs.set_hl(result);
            ctx.regs.f = (ctx.regs.f & !CF) | u8::from(carry);
            10
        }

        // SHLD nn
        0x22 => {
            let addr = ctx.fetch_operand_word();
            ctx.mem_write_word(addr, ctx.regs.hl());
            16
        }

        // LHLD nn
        0x2A => {
            let addr = ctx.fetch_operand_word();
            let value = ctx.mem_read_word(addr);
            ctx.regs.set_hl(value);
            16
        }

        // STA nn
        0x32 => {
            let addr = ctx.fetch_operand_word();
            ctx.mem_write(addr, ctx.regs.a);
            13
        }

        // LDA nn
        0x3A => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.a = ctx.mem_read(addr);
            13
        }

        // DAA
        0x27 => {
            let result = alu::daa(ctx.regs.a, ctx.regs.f);
            ctx.regs.a = result.value;
            ctx.regs.f = result.flags;
            4
        }

        // CMA
        0x2F => {
            ctx.regs.a = !ctx.regs.a;
            4
        }

        // STC
        0x37 => {
            ctx.regs.f |= CF;
            4
        }

        // CMC
        0x3F => {
            ctx.regs.f ^= CF;
            4
        }

        // HLT
        0x76 => {
            ctx.set_halt_status();
            if ctx.regs.iff1 {
                // Park on the HALT; each re-execution burns one opcode time
                // until an interrupt arrives or the run loop breaks.
                ctx.regs.pc = ctx.regs.pc.wrapping_sub(1);
            } else {
                ctx.stop_with(CpuError::OpHalt {
                    addr: ctx.regs.pc.wrapping_sub(1),
                });
            }
            7
        }

        // MOV r, r' / MOV r, M / MOV M, r
        0x40..=0x7F => {
            let src = op & 7;
            let dst = (op >> 3) & 7;
            if src == 6 {
                let value = ctx.mem_read(ctx.regs.hl());
                set_reg(ctx, dst, value);
                7
            } else if dst == 6 {
                let value = get_reg(ctx, src);
                ctx.mem_write(ctx.regs.hl(), value);
                7
            } else {
                let value = get_reg(ctx, src);
                set_reg(ctx, dst, value);
                5
            }
        }

        // ADD/ADC/SUB/SBB/ANA/XRA/ORA/CMP r|M
        0x80..=0xBF => {
            let r = op & 7;
            if r == 6 {
                let value = ctx.mem_read(ctx.regs.hl());
                alu_a(ctx, op >> 3, value);
                7
            } else {
                let value = get_reg(ctx, r);
                alu_a(ctx, op >> 3, value);
                4
            }
        }

        // Rcc
        0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.regs.pc = ctx.pop_word();
                11
            } else {
                5
            }
        }

        // POP rp (F1 = PSW)
        0xC1 | 0xD1 | 0xE1 | 0xF1 => {
            let value = ctx.pop_word();
            match (op >> 4) & 3 {
                0 => ctx.regs.set_bc(value),
                1 => ctx.regs.set_de(value),
                2 => ctx.regs.set_hl(value),
                _ => {
                    ctx.regs.a = (value >> 8) as u8;
                    // The forced 8080 flag bits stay forced.
                    ctx.regs.f = (value as u8 | NF) & !(YF | XF);
                }
            }
            10
        }

        // PUSH rp (F5 = PSW)
        0xC5 | 0xD5 | 0xE5 | 0xF5 => {
            let value = match (op >> 4) & 3 {
                0 => ctx.regs.bc(),
                1 => ctx.regs.de(),
                2 => ctx.regs.hl(),
                _ => (u16::from(ctx.regs.a) << 8) | u16::from(ctx.regs.f_for(CpuModel::I8080)),
            };
            ctx.push_word(value);
            11
        }

        // Jcc nn
        0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
            let target = ctx.fetch_operand_word();
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.regs.pc = target;
            }
            10
        }

        // JMP nn
        0xC3 => {
            ctx.regs.pc = ctx.fetch_operand_word();
            10
        }

        // Undocumented JMP mirror
        0xCB => {
            if ctx.conf.undoc_inst {
                ctx.regs.pc = ctx.fetch_operand_word();
                10
            } else {
                ctx.stop_with(CpuError::OpTrap1 {
                    addr: ctx.regs.pc.wrapping_sub(1),
                    op,
                });
                0
            }
        }

        // Ccc nn
        0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
            let target = ctx.fetch_operand_word();
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.push_word(ctx.regs.pc);
                ctx.regs.pc = target;
                17
            } else {
                11
            }
        }

        // CALL nn
        0xCD => {
            let target = ctx.fetch_operand_word();
            ctx.push_word(ctx.regs.pc);
            ctx.regs.pc = target;
            17
        }

        // Undocumented CALL mirrors
        0xDD | 0xED | 0xFD => {
            if ctx.conf.undoc_inst {
                let target = ctx.fetch_operand_word();
                ctx.push_word(ctx.regs.pc);
                ctx.regs.pc = target;
                17
            } else {
                ctx.stop_with(CpuError::OpTrap1 {
                    addr: ctx.regs.pc.wrapping_sub(1),
                    op,
                });
                0
            }
        }

        // ADI/ACI/SUI/SBI/ANI/XRI/ORI/CPI n
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            let value = ctx.fetch_operand();
            alu_a(ctx, op >> 3, value);
            7
        }

        // RST n
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            ctx.push_word(ctx.regs.pc);
            ctx.regs.pc = u16::from(op & 0x38);
            11
        }

        // RET
        0xC9 => {
            ctx.regs.pc = ctx.pop_word();
            10
        }

        // Undocumented RET mirror
        0xD9 => {
            if ctx.conf.undoc_inst {
                ctx.regs.pc = ctx.pop_word();
                10
            } else {
                ctx.stop_with(CpuError::OpTrap1 {
                    addr: ctx.regs.pc.wrapping_sub(1),
                    op,
                });
                0
            }
        }

        // OUT n
        0xD3 => {
            let port = ctx.fetch_operand();
            ctx.io_output(port, ctx.regs.a);
            10
        }

        // IN n
        0xDB => {
            let port = ctx.fetch_operand();
            ctx.regs.a = ctx.io_input(port, true);
            10
        }

        // XTHL
        0xE3 => {
            let value = ctx.mem_read_word(ctx.regs.sp);
            ctx.mem_write_word(ctx.regs.sp, ctx.regs.hl());
            ctx.regs.set_hl(value);
            18
        }

        // PCHL
        0xE9 => {
            ctx.regs.pc = ctx.regs.hl();
            5
        }

        // XCHG
        0xEB => {
            let de = ctx.regs.de();
            ctx.regs.set_de(ctx.regs.hl());
            ctx.regs.set_hl(de);
            4
        }

        // DI
        0xF3 => {
            ctx.regs.iff1 = false;
            ctx.regs.iff2 = false;
            4
        }

        // EI (interrupts become eligible after the next instruction)
        0xFB => {
            ctx.regs.iff1 = true;
            ctx.regs.iff2 = true;
            ctx.int_protection = true;
            4
        }

        // SPHL
        0xF9 => {
            ctx.regs.sp = ctx.regs.hl();
            5
        }
    };
    ctx.add_t(t);
}
