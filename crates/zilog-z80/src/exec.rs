//! Instruction execution for the Z80: interrupt gate, prefix state machine
//! and the unprefixed plane.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use emu_core::{CpuContext, CpuError, CF, HF, NF, PF, SF, XF, YF, ZF};

use crate::alu;
use crate::exec_cb;
use crate::exec_ed;

/// Index register selected by the active DD/FD prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    HL,
    IX,
    IY,
}

impl Index {
    pub(crate) fn base(self, ctx: &CpuContext) -> u16 {
        match self {
            Self::HL => ctx.regs.hl(),
            Self::IX => ctx.regs.ix,
            Self::IY => ctx.regs.iy,
        }
    }

    pub(crate) fn set_base(self, ctx: &mut CpuContext, value: u16) {
        match self {
            Self::HL => ctx.regs.set_hl(value),
            Self::IX => ctx.regs.ix = value,
            Self::IY => ctx.regs.iy = value,
        }
    }

    pub(crate) const fn prefix_byte(self) -> u8 {
        match self {
            Self::HL => 0,
            Self::IX => 0xDD,
            Self::IY => 0xFD,
        }
    }
}

/// Store a new flag byte. The undocumented Y/X copies only land in F when
/// they are modeled; otherwise those positions read back as zero, like the
/// non-undocumented flag tables of the original.
pub(crate) fn set_f(ctx: &mut CpuContext, flags: u8) {
    ctx.regs.f = if ctx.conf.undoc_flags {
        flags
    } else {
        flags & !(YF | XF)
    };
}

/// Execute one instruction step: age the EI shield, service a pending bus
/// request, deliver NMI or a maskable interrupt, then fetch and dispatch.
pub fn step(ctx: &mut CpuContext) {
    // EI shields exactly the one instruction that follows it (maskable only).
    let protected = ctx.int_protection;
    ctx.int_protection = false;

    if ctx.devices.bus_request_pending() {
        ctx.service_bus_request();
    }

    if ctx.devices.take_nmi() {
        deliver_nmi(ctx);
        return;
    }

    if !protected && ctx.regs.iff1 && ctx.devices.int_pending() {
        deliver_int(ctx);
        return;
    }

    let op = ctx.fetch_opcode();
    dispatch(ctx, op);
}

/// Leave a HALT park: the saved PC must point past the HALT opcode so the
/// handler returns to the instruction after it.
fn leave_halt(ctx: &mut CpuContext) {
    if ctx.halted {
        ctx.regs.pc = ctx.regs.pc.wrapping_add(1);
        ctx.halted = false;
    }
}

fn deliver_nmi(ctx: &mut CpuContext) {
    leave_halt(ctx);
    ctx.regs.iff2 = ctx.regs.iff1;
    ctx.regs.iff1 = false;
    ctx.push_word(ctx.regs.pc);
    ctx.regs.pc = 0x0066;
    ctx.regs.wz = 0x0066;
    ctx.add_t(11);
}

fn deliver_int(ctx: &mut CpuContext) {
    let data = ctx.devices.take_interrupt();
    ctx.regs.iff1 = false;
    ctx.regs.iff2 = false;
    leave_halt(ctx);
    ctx.set_inta_status();
    match ctx.regs.im {
        0 => {
            // Mode 0: the device byte is executed as an instruction.
            if data < 0 {
                ctx.stop_with(CpuError::IntError { data });
                return;
            }
            dispatch(ctx, data as u8);
            ctx.add_t(2);
        }
        1 => {
            ctx.push_word(ctx.regs.pc);
            ctx.regs.pc = 0x0038;
            ctx.regs.wz = 0x0038;
            ctx.add_t(13);
        }
        _ => {
            // Mode 2: vector table indexed by I and the device byte.
            if data < 0 {
                ctx.stop_with(CpuError::IntError { data });
                return;
            }
            ctx.push_word(ctx.regs.pc);
            let vector = (u16::from(ctx.regs.i) << 8) | u16::from(data as u8 & 0xFE);
            ctx.regs.pc = ctx.mem_read_word(vector);
            ctx.regs.wz = ctx.regs.pc;
            ctx.add_t(19);
        }
    }
}

/// Prefix state machine: record the index register and plane, then execute
/// the final opcode. Each accepted DD/FD costs 4 T-states and one refresh.
pub(crate) fn dispatch(ctx: &mut CpuContext, first: u8) {
    let mut idx = Index::HL;
    let mut op = first;
    loop {
        match op {
            0xDD => {
                idx = Index::IX;
                ctx.add_t(4);
                op = ctx.fetch_opcode();
            }
            0xFD => {
                idx = Index::IY;
                ctx.add_t(4);
                op = ctx.fetch_opcode();
            }
            0xCB => {
                exec_cb::execute(ctx, idx);
                return;
            }
            0xED => {
                // ED drops any pending index prefix.
                exec_ed::execute(ctx);
                return;
            }
            _ => {
                execute_base(ctx, op, idx);
                return;
            }
        }
    }
}

/// 3-bit register field. With an index prefix, H and L name the halves of
/// IX/IY (undocumented); memory forms pass `Index::HL` to reach the real
/// registers.
pub(crate) fn get_reg8(ctx: &CpuContext, idx: Index, r: u8) -> u8 {
    match r & 7 {
        0 => ctx.regs.b,
        1 => ctx.regs.c,
        2 => ctx.regs.d,
        3 => ctx.regs.e,
        4 => match idx {
            Index::HL => ctx.regs.h,
            _ => (idx.base(ctx) >> 8) as u8,
        },
        5 => match idx {
            Index::HL => ctx.regs.l,
            _ => idx.base(ctx) as u8,
        },
        7 => ctx.regs.a,
        _ => unreachable!("(HL) operand handled by the caller"),
    }
}

pub(crate) fn set_reg8(ctx: &mut CpuContext, idx: Index, r: u8, value: u8) {
    match r & 7 {
        0 => ctx.regs.b = value,
        1 => ctx.regs.c = value,
        2 => ctx.regs.d = value,
        3 => ctx.regs.e = value,
        4 => match idx {
            Index::HL => ctx.regs.h = value,
            _ => {
                let base = idx.base(ctx);
                idx.set_base(ctx, (base & 0x00FF) | (u16::from(value) << 8));
            }
        },
        5 => match idx {
            Index::HL => ctx.regs.l = value,
            _ => {
                let base = idx.base(ctx);
                idx.set_base(ctx, (base & 0xFF00) | u16::from(value));
            }
        },
        7 => ctx.regs.a = value,
        _ => unreachable!("(HL) operand handled by the caller"),
    }
}

/// 2-bit register-pair field (SP variant); slot 2 is HL/IX/IY.
fn get_rp(ctx: &CpuContext, idx: Index, rp: u8) -> u16 {
    match rp & 3 {
        0 => ctx.regs.bc(),
        1 => ctx.regs.de(),
        2 => idx.base(ctx),
        _ => ctx.regs.sp,
    }
}

fn set_rp(ctx: &mut CpuContext, idx: Index, rp: u8, value: u16) {
    match rp & 3 {
        0 => ctx.regs.set_bc(value),
        1 => ctx.regs.set_de(value),
        2 => idx.set_base(ctx, value),
        _ => ctx.regs.sp = value,
    }
}

/// Condition code field (NZ, Z, NC, C, PO, PE, P, M).
pub(crate) fn condition(f: u8, cc: u8) -> bool {
    match cc & 7 {
        0 => f & ZF == 0,
        1 => f & ZF != 0,
        2 => f & CF == 0,
        3 => f & CF != 0,
        4 => f & PF == 0,
        5 => f & PF != 0,
        6 => f & SF == 0,
        _ => f & SF != 0,
    }
}

/// Effective address of a (HL) / (IX+d) / (IY+d) operand, plus the extra
/// T-states the displaced form costs (beyond the 4 for the prefix itself).
/// The displaced address lands in WZ.
fn mem_operand(ctx: &mut CpuContext, idx: Index) -> (u16, u32) {
    match idx {
        Index::HL => (ctx.regs.hl(), 0),
        _ => {
            let d = ctx.fetch_operand() as i8;
            let addr = idx.base(ctx).wrapping_add(d as u16);
            ctx.regs.wz = addr;
            (addr, 8)
        }
    }
}

/// ALU operation field applied to A (ADD, ADC, SUB, SBC, AND, XOR, OR, CP).
fn alu_a(ctx: &mut CpuContext, op: u8, value: u8) {
    let a = ctx.regs.a;
    let carry = ctx.regs.f & CF != 0;
    let result = match (op >> 3) & 7 {
        0 => alu::add8(a, value, false),
        1 => alu::add8(a, value, carry),
        2 => alu::sub8(a, value, false),
        3 => alu::sub8(a, value, carry),
        4 => alu::and8(a, value),
        5 => alu::xor8(a, value),
        6 => alu::or8(a, value),
        _ => alu::cp8(a, value),
    };
    if (op >> 3) & 7 != 7 {
        ctx.regs.a = result.value;
    }
    set_f(ctx, result.flags);
}

/// Register forms that exist only because a DD/FD prefix rewrites H/L; they
/// trap when undocumented opcodes are excluded.
fn undocumented_index_form(op: u8) -> bool {
    match op {
        // INC/DEC/LD n with IXH/IXL
        0x24 | 0x25 | 0x26 | 0x2C | 0x2D | 0x2E => true,
        0x76 => false,
        0x40..=0x7F => {
            let src = op & 7;
            let dst = (op >> 3) & 7;
            (matches!(src, 4 | 5) && dst != 6) || (matches!(dst, 4 | 5) && src != 6)
        }
        0x80..=0xBF => matches!(op & 7, 4 | 5),
        _ => false,
    }
}

/// Dispatch one unprefixed (or index-rewritten) opcode and account its
/// T-states. The 4 T-states of any DD/FD prefix are already counted.
fn execute_base(ctx: &mut CpuContext, op: u8, idx: Index) {
    if idx != Index::HL && !ctx.conf.undoc_inst && undocumented_index_form(op) {
        ctx.stop_with(CpuError::OpTrap2 {
            addr: ctx.regs.pc.wrapping_sub(2),
            prefix: idx.prefix_byte(),
            op,
        });
        return;
    }

    let t = match op {
        // NOP
        0x00 => 4,

        // LD rr, nn (01=BC, 11=DE, 21=HL/IX/IY, 31=SP)
        0x01 | 0x11 | 0x21 | 0x31 => {
            let value = ctx.fetch_operand_word();
            set_rp(ctx, idx, (op >> 4) & 3, value);
            10
        }

        // LD (BC), A
        0x02 => {
            let addr = ctx.regs.bc();
            ctx.regs.wz = (u16::from(ctx.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
            ctx.mem_write(addr, ctx.regs.a);
            7
        }

        // LD (DE), A
        0x12 => {
            let addr = ctx.regs.de();
            ctx.regs.wz = (u16::from(ctx.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
            ctx.mem_write(addr, ctx.regs.a);
            7
        }

        // LD A, (BC)
        0x0A => {
            let addr = ctx.regs.bc();
            ctx.regs.wz = addr.wrapping_add(1);
            ctx.regs.a = ctx.mem_read(addr);
            7
        }

        // LD A, (DE)
        0x1A => {
            let addr = ctx.regs.de();
            ctx.regs.wz = addr.wrapping_add(1);
            ctx.regs.a = ctx.mem_read(addr);
            7
        }

        // INC rr
        0x03 | 0x13 | 0x23 | 0x33 => {
            let rp = (op >> 4) & 3;
            let value = get_rp(ctx, idx, rp).wrapping_add(1);
            set_rp(ctx, idx, rp, value);
            6
        }

        // DEC rr
        0x0B | 0x1B | 0x2B | 0x3B => {
            let rp = (op >> 4) & 3;
            let value = get_rp(ctx, idx, rp).wrapping_sub(1);
            set_rp(ctx, idx, rp, value);
            6
        }

        // INC r / INC (HL) / INC (IX+d)
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
            let r = (op >> 3) & 7;
            if r == 6 {
                let (addr, extra) = mem_operand(ctx, idx);
                let result = alu::inc8(ctx.mem_read(addr));
                ctx.mem_write(addr, result.value);
                set_f(ctx, (ctx.regs.f & CF) | result.flags);
                11 + extra
            } else {
                let result = alu::inc8(get_reg8(ctx, idx, r));
                set_reg8(ctx, idx, r, result.value);
                set_f(ctx, (ctx.regs.f & CF) | result.flags);
                4
            }
        }

        // DEC r / DEC (HL) / DEC (IX+d)
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
            let r = (op >> 3) & 7;
            if r == 6 {
                let (addr, extra) = mem_operand(ctx, idx);
                let result = alu::dec8(ctx.mem_read(addr));
                ctx.mem_write(addr, result.value);
                set_f(ctx, (ctx.regs.f & CF) | result.flags);
                11 + extra
            } else {
                let result = alu::dec8(get_reg8(ctx, idx, r));
                set_reg8(ctx, idx, r, result.value);
                set_f(ctx, (ctx.regs.f & CF) | result.flags);
                4
            }
        }

        // LD r, n / LD (HL), n / LD (IX+d), n
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            let r = (op >> 3) & 7;
            if r == 6 {
                // The displacement comes before the immediate.
                let (addr, extra) = mem_operand(ctx, idx);
                let value = ctx.fetch_operand();
                ctx.mem_write(addr, value);
                // Only 2 internal T-states on top of the displacement read.
                10 + if extra != 0 { 5 } else { 0 }
            } else {
                let value = ctx.fetch_operand();
                set_reg8(ctx, idx, r, value);
                7
            }
        }

        // RLCA
        0x07 => {
            let carry = ctx.regs.a >> 7;
            ctx.regs.a = (ctx.regs.a << 1) | carry;
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF))
                    | (ctx.regs.a & (YF | XF))
                    | if carry != 0 { CF } else { 0 },
            );
            4
        }

        // RRCA
        0x0F => {
            let carry = ctx.regs.a & 1;
            ctx.regs.a = (ctx.regs.a >> 1) | (carry << 7);
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF))
                    | (ctx.regs.a & (YF | XF))
                    | if carry != 0 { CF } else { 0 },
            );
            4
        }

        // RLA
        0x17 => {
            let old_carry = ctx.regs.f & CF;
            let new_carry = ctx.regs.a >> 7;
            ctx.regs.a = (ctx.regs.a << 1) | old_carry;
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF))
                    | (ctx.regs.a & (YF | XF))
                    | if new_carry != 0 { CF } else { 0 },
            );
            4
        }

        // RRA
        0x1F => {
            let old_carry = ctx.regs.f & CF;
            let new_carry = ctx.regs.a & 1;
            ctx.regs.a = (ctx.regs.a >> 1) | (old_carry << 7);
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF))
                    | (ctx.regs.a & (YF | XF))
                    | if new_carry != 0 { CF } else { 0 },
            );
            4
        }

        // EX AF, AF'
        0x08 => {
            ctx.regs.ex_af();
            4
        }

        // ADD HL/IX/IY, rr
        0x09 | 0x19 | 0x29 | 0x39 => {
            let base = idx.base(ctx);
            ctx.regs.wz = base.wrapping_add(1);
            let rr = get_rp(ctx, idx, (op >> 4) & 3);
            let (result, flags) = alu::add16(base, rr);
            idx.set_base(ctx, result);
            set_f(ctx, (ctx.regs.f & (SF | ZF | PF)) | flags);
            11
        }

        // DJNZ e
        0x10 => {
            let d = ctx.fetch_operand() as i8;
            ctx.regs.b = ctx.regs.b.wrapping_sub(1);
            if ctx.regs.b != 0 {
                ctx.regs.pc = ctx.regs.pc.wrapping_add(d as u16);
                ctx.regs.wz = ctx.regs.pc;
                13
            } else {
                8
            }
        }

        // JR e
        0x18 => {
            let d = ctx.fetch_operand() as i8;
            ctx.regs.pc = ctx.regs.pc.wrapping_add(d as u16);
            ctx.regs.wz = ctx.regs.pc;
            12
        }

        // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
        0x20 | 0x28 | 0x30 | 0x38 => {
            let d = ctx.fetch_operand() as i8;
            if condition(ctx.regs.f, (op >> 3) & 3) {
                ctx.regs.pc = ctx.regs.pc.wrapping_add(d as u16);
                ctx.regs.wz = ctx.regs.pc;
                12
            } else {
                7
            }
        }

        // LD (nn), HL/IX/IY
        0x22 => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = addr.wrapping_add(1);
            ctx.mem_write_word(addr, idx.base(ctx));
            16
        }

        // LD HL/IX/IY, (nn)
        0x2A => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = addr.wrapping_add(1);
            let value = ctx.mem_read_word(addr);
            idx.set_base(ctx, value);
            16
        }

        // DAA
        0x27 => {
            let result = alu::daa(ctx.regs.a, ctx.regs.f);
            ctx.regs.a = result.value;
            set_f(ctx, result.flags);
            4
        }

        // CPL
        0x2F => {
            ctx.regs.a = !ctx.regs.a;
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF | CF)) | HF | NF | (ctx.regs.a & (YF | XF)),
            );
            4
        }

        // LD (nn), A
        0x32 => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = (u16::from(ctx.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
            ctx.mem_write(addr, ctx.regs.a);
            13
        }

        // LD A, (nn)
        0x3A => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = addr.wrapping_add(1);
            ctx.regs.a = ctx.mem_read(addr);
            13
        }

        // SCF
        0x37 => {
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF)) | CF | (ctx.regs.a & (YF | XF)),
            );
            4
        }

        // CCF
        0x3F => {
            let old_carry = ctx.regs.f & CF;
            set_f(
                ctx,
                (ctx.regs.f & (SF | ZF | PF))
                    | (ctx.regs.a & (YF | XF))
                    | if old_carry != 0 { HF } else { CF },
            );
            4
        }

        // HALT
        0x76 => {
            ctx.set_halt_status();
            if ctx.regs.iff1 {
                // Park on the HALT; re-executed until an interrupt arrives
                // or the run loop breaks.
                ctx.regs.pc = ctx.regs.pc.wrapping_sub(1);
            } else {
                ctx.stop_with(CpuError::OpHalt {
                    addr: ctx.regs.pc.wrapping_sub(1),
                });
            }
            4
        }

        // LD r, r' / LD r, (HL) / LD (HL), r (and the IX+d forms)
        0x40..=0x7F => {
            let src = op & 7;
            let dst = (op >> 3) & 7;
            if src == 6 {
                // Memory source: the register side is always the real set.
                let (addr, extra) = mem_operand(ctx, idx);
                let value = ctx.mem_read(addr);
                set_reg8(ctx, Index::HL, dst, value);
                7 + extra
            } else if dst == 6 {
                let (addr, extra) = mem_operand(ctx, idx);
                let value = get_reg8(ctx, Index::HL, src);
                ctx.mem_write(addr, value);
                7 + extra
            } else {
                let value = get_reg8(ctx, idx, src);
                set_reg8(ctx, idx, dst, value);
                4
            }
        }

        // ALU A, r / ALU A, (HL) / ALU A, (IX+d)
        0x80..=0xBF => {
            let r = op & 7;
            if r == 6 {
                let (addr, extra) = mem_operand(ctx, idx);
                let value = ctx.mem_read(addr);
                alu_a(ctx, op, value);
                7 + extra
            } else {
                let value = get_reg8(ctx, idx, r);
                alu_a(ctx, op, value);
                4
            }
        }

        // RET cc
        0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.regs.pc = ctx.pop_word();
                ctx.regs.wz = ctx.regs.pc;
                11
            } else {
                5
            }
        }

        // POP rr (C1=BC, D1=DE, E1=HL/IX/IY, F1=AF)
        0xC1 | 0xD1 | 0xE1 | 0xF1 => {
            let value = ctx.pop_word();
            match (op >> 4) & 3 {
                0 => ctx.regs.set_bc(value),
                1 => ctx.regs.set_de(value),
                2 => idx.set_base(ctx, value),
                _ => ctx.regs.set_af(value),
            }
            10
        }

        // PUSH rr
        0xC5 | 0xD5 | 0xE5 | 0xF5 => {
            let value = match (op >> 4) & 3 {
                0 => ctx.regs.bc(),
                1 => ctx.regs.de(),
                2 => idx.base(ctx),
                _ => ctx.regs.af(),
            };
            ctx.push_word(value);
            11
        }

        // JP cc, nn
        0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
            let target = ctx.fetch_operand_word();
            ctx.regs.wz = target;
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.regs.pc = target;
            }
            10
        }

        // JP nn
        0xC3 => {
            let target = ctx.fetch_operand_word();
            ctx.regs.wz = target;
            ctx.regs.pc = target;
            10
        }

        // CALL cc, nn
        0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
            let target = ctx.fetch_operand_word();
            ctx.regs.wz = target;
            if condition(ctx.regs.f, (op >> 3) & 7) {
                ctx.push_word(ctx.regs.pc);
                ctx.regs.pc = target;
                17
            } else {
                10
            }
        }

        // CALL nn
        0xCD => {
            let target = ctx.fetch_operand_word();
            ctx.regs.wz = target;
            ctx.push_word(ctx.regs.pc);
            ctx.regs.pc = target;
            17
        }

        // ALU A, n
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            let value = ctx.fetch_operand();
            alu_a(ctx, op, value);
            7
        }

        // RST n
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            ctx.push_word(ctx.regs.pc);
            let target = u16::from(op & 0x38);
            ctx.regs.pc = target;
            ctx.regs.wz = target;
            11
        }

        // RET
        0xC9 => {
            ctx.regs.pc = ctx.pop_word();
            ctx.regs.wz = ctx.regs.pc;
            10
        }

        // OUT (n), A
        0xD3 => {
            let port = ctx.fetch_operand();
            ctx.regs.wz =
                (u16::from(ctx.regs.a) << 8) | u16::from(port.wrapping_add(1));
            ctx.io_output(port, ctx.regs.a);
            11
        }

        // IN A, (n)
        0xDB => {
            let port = ctx.fetch_operand();
            ctx.regs.wz = ((u16::from(ctx.regs.a) << 8) | u16::from(port)).wrapping_add(1);
            let value = ctx.io_input(port, true);
            ctx.regs.a = value;
            11
        }

        // EXX
        0xD9 => {
            ctx.regs.exx();
            4
        }

        // EX (SP), HL/IX/IY
        0xE3 => {
            let value = ctx.mem_read_word(ctx.regs.sp);
            ctx.mem_write_word(ctx.regs.sp, idx.base(ctx));
            idx.set_base(ctx, value);
            ctx.regs.wz = value;
            19
        }

        // JP (HL)/(IX)/(IY)
        0xE9 => {
            ctx.regs.pc = idx.base(ctx);
            4
        }

        // EX DE, HL (never index-rewritten)
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

        // LD SP, HL/IX/IY
        0xF9 => {
            ctx.regs.sp = idx.base(ctx);
            6
        }

        // Prefixes are consumed by `dispatch`.
        0xCB | 0xDD | 0xED | 0xFD => unreachable!("prefix bytes handled by dispatch"),
    };
    ctx.add_t(t);
}
