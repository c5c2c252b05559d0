//! CB plane: rotates, shifts and bit operations, including the DDCB/FDCB
//! displaced forms with their undocumented register writeback.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use emu_core::{CpuContext, CpuError, CF, HF, PF, SF, XF, YF, ZF};

use crate::alu::{self, AluResult};
use crate::exec::{get_reg8, set_f, set_reg8, Index};

/// Where the operand byte comes from (and goes back to).
enum Operand {
    Reg(u8),
    Mem(u16),
    /// DDCB/FDCB with a register field: memory operand, result also written
    /// back to the register (undocumented).
    MemReg(u16, u8),
}

/// Execute one CB-plane instruction. For `Index::HL` the opcode follows the
/// CB directly; for IX/IY the displacement byte comes first and the final
/// opcode fetch does not refresh R.
pub(crate) fn execute(ctx: &mut CpuContext, idx: Index) {
    let mut disp = 0u8;
    let (op, operand) = match idx {
        Index::HL => {
            let op = ctx.fetch_opcode();
            let r = op & 7;
            if r == 6 {
                (op, Operand::Mem(ctx.regs.hl()))
            } else {
                (op, Operand::Reg(r))
            }
        }
        _ => {
            let d = ctx.fetch_operand() as i8;
            disp = d as u8;
            let addr = idx.base(ctx).wrapping_add(d as u16);
            ctx.regs.wz = addr;
            let op = ctx.fetch_opcode_no_refresh();
            let r = op & 7;
            if r == 6 {
                (op, Operand::Mem(addr))
            } else if ctx.conf.undoc_inst {
                (op, Operand::MemReg(addr, r))
            } else {
                ctx.stop_with(CpuError::OpTrap4 {
                    addr: ctx.regs.pc.wrapping_sub(4),
                    b0: idx.prefix_byte(),
                    b1: 0xCB,
                    b2: d as u8,
                    b3: op,
                });
                return;
            }
        }
    };

    let value = match operand {
        Operand::Reg(r) => get_reg8(ctx, Index::HL, r),
        Operand::Mem(addr) | Operand::MemReg(addr, _) => ctx.mem_read(addr),
    };

    match op >> 6 {
        // Rotates and shifts
        0 => {
            if op >> 3 == 6 && !ctx.conf.undoc_inst {
                // SLL exists on no data sheet.
                trap_undoc(ctx, idx, disp, op);
                return;
            }
            let result = rotate(ctx, op, value);
            set_f(ctx, result.flags);
            write_back(ctx, &operand, result.value);
            ctx.add_t(rw_t(idx, &operand));
        }

        // BIT b, r / BIT b, (HL) / BIT b, (IX+d)
        1 => {
            let bit = (op >> 3) & 7;
            let tested = value & (1 << bit);
            let mut flags = (ctx.regs.f & CF) | HF;
            if tested == 0 {
                flags |= ZF | PF;
            }
            if bit == 7 && tested != 0 {
                flags |= SF;
            }
            // Y/X leak from the operand register, or from the internal WZ
            // latch for the memory forms.
            flags |= match &operand {
                Operand::Reg(_) => value & (YF | XF),
                Operand::Mem(_) | Operand::MemReg(..) => {
                    ((ctx.regs.wz >> 8) as u8) & (YF | XF)
                }
            };
            set_f(ctx, flags);
            ctx.add_t(match (idx, &operand) {
                (Index::HL, Operand::Reg(_)) => 8,
                (Index::HL, _) => 12,
                _ => 16,
            });
        }

        // RES b, r
        2 => {
            let bit = (op >> 3) & 7;
            write_back(ctx, &operand, value & !(1 << bit));
            ctx.add_t(rw_t(idx, &operand));
        }

        // SET b, r
        _ => {
            let bit = (op >> 3) & 7;
            write_back(ctx, &operand, value | (1 << bit));
            ctx.add_t(rw_t(idx, &operand));
        }
    }
}

fn rotate(ctx: &CpuContext, op: u8, value: u8) -> AluResult {
    let carry = ctx.regs.f & CF != 0;
    match (op >> 3) & 7 {
        0 => alu::rlc8(value),
        1 => alu::rrc8(value),
        2 => alu::rl8(value, carry),
        3 => alu::rr8(value, carry),
        4 => alu::sla8(value),
        5 => alu::sra8(value),
        6 => alu::sll8(value),
        _ => alu::srl8(value),
    }
}

fn write_back(ctx: &mut CpuContext, operand: &Operand, value: u8) {
    match *operand {
        Operand::Reg(r) => set_reg8(ctx, Index::HL, r, value),
        Operand::Mem(addr) => ctx.mem_write(addr, value),
        Operand::MemReg(addr, r) => {
            ctx.mem_write(addr, value);
            set_reg8(ctx, Index::HL, r, value);
        }
    }
}

/// T-states for a read-modify-write CB operation (prefix T already counted
/// for the displaced forms).
fn rw_t(idx: Index, operand: &Operand) -> u32 {
    match (idx, operand) {
        (Index::HL, Operand::Reg(_)) => 8,
        (Index::HL, _) => 15,
        _ => 19,
    }
}

fn trap_undoc(ctx: &mut CpuContext, idx: Index, disp: u8, op: u8) {
    match idx {
        Index::HL => ctx.stop_with(CpuError::OpTrap2 {
            addr: ctx.regs.pc.wrapping_sub(2),
            prefix: 0xCB,
            op,
        }),
        _ => ctx.stop_with(CpuError::OpTrap4 {
            addr: ctx.regs.pc.wrapping_sub(4),
            b0: idx.prefix_byte(),
            b1: 0xCB,
            b2: disp,
            b3: op,
        }),
    }
}
