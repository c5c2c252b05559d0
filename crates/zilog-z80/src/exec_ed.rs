//! ED plane: 16-bit arithmetic, I/R transfers, RRD/RLD, interrupt-mode and
//! return opcodes, and the block move/compare/IO family.
//!
//! Repeating block instructions execute one iteration per step and back PC
//! up over the prefix pair, so R advances twice per iteration and a pending
//! interrupt can be taken between iterations.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_possible_truncation)]

use emu_core::{CpuContext, CpuError, CF, HF, NF, PF, SF, SZYXP_FLAGS, SZYX_FLAGS, XF, YF, ZF};

use crate::alu;
use crate::exec::{get_reg8, set_f, set_reg8, Index};

/// Mirrors and (C)-port oddities that only execute when undocumented
/// opcodes are enabled.
fn ed_undocumented(op: u8) -> bool {
    matches!(
        op,
        0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C // NEG mirrors
            | 0x55 | 0x65 | 0x75                       // RETN mirrors
            | 0x5D | 0x6D | 0x7D                       // RETI mirrors
            | 0x4E | 0x66 | 0x6E | 0x76 | 0x7E         // IM mirrors
            | 0x70 | 0x71                              // IN (C) / OUT (C),0
    )
}

pub(crate) fn execute(ctx: &mut CpuContext) {
    let op = ctx.fetch_opcode();

    if !ctx.conf.undoc_inst && ed_undocumented(op) {
        ctx.stop_with(CpuError::OpTrap2 {
            addr: ctx.regs.pc.wrapping_sub(2),
            prefix: 0xED,
            op,
        });
        return;
    }

    let t: u32 = match op {
        // IN r, (C); 70 = IN (C), flags only
        0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
            ctx.regs.wz = ctx.regs.bc().wrapping_add(1);
            let value = ctx.io_input(ctx.regs.c, true);
            let r = (op >> 3) & 7;
            if r != 6 {
                set_reg8(ctx, Index::HL, r, value);
            }
            set_f(ctx, SZYXP_FLAGS[value as usize] | (ctx.regs.f & CF));
            12
        }

        // OUT (C), r; 71 = OUT (C), 0
        0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
            ctx.regs.wz = ctx.regs.bc().wrapping_add(1);
            let r = (op >> 3) & 7;
            let value = if r == 6 { 0 } else { get_reg8(ctx, Index::HL, r) };
            ctx.io_output(ctx.regs.c, value);
            12
        }

        // SBC HL, rr
        0x42 | 0x52 | 0x62 | 0x72 => {
            let hl = ctx.regs.hl();
            ctx.regs.wz = hl.wrapping_add(1);
            let rr = get_rp(ctx, (op >> 4) & 3);
            let (result, flags) = alu::sbc16(hl, rr, ctx.regs.f & CF != 0);
            ctx.regs.set_hl(result);
            set_f(ctx, flags);
            15
        }

        // ADC HL, rr
        0x4A | 0x5A | 0x6A | 0x7A => {
            let hl = ctx.regs.hl();
            ctx.regs.wz = hl.wrapping_add(1);
            let rr = get_rp(ctx, (op >> 4) & 3);
            let (result, flags) = alu::adc16(hl, rr, ctx.regs.f & CF != 0);
            ctx.regs.set_hl(result);
            set_f(ctx, flags);
            15
        }

        // LD (nn), rr
        0x43 | 0x53 | 0x63 | 0x73 => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = addr.wrapping_add(1);
            let value = get_rp(ctx, (op >> 4) & 3);
            ctx.mem_write_word(addr, value);
            20
        }

        // LD rr, (nn)
        0x4B | 0x5B | 0x6B | 0x7B => {
            let addr = ctx.fetch_operand_word();
            ctx.regs.wz = addr.wrapping_add(1);
            let value = ctx.mem_read_word(addr);
            set_rp(ctx, (op >> 4) & 3, value);
            20
        }

        // NEG (and mirrors)
        0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
            let result = alu::sub8(0, ctx.regs.a, false);
            ctx.regs.a = result.value;
            set_f(ctx, result.flags);
            8
        }

        // RETN (and mirrors): IFF2 restored into IFF1
        0x45 | 0x55 | 0x65 | 0x75 => {
            ctx.regs.iff1 = ctx.regs.iff2;
            ctx.regs.pc = ctx.pop_word();
            ctx.regs.wz = ctx.regs.pc;
            14
        }

        // RETI (and mirrors)
        0x4D | 0x5D | 0x6D | 0x7D => {
            ctx.regs.iff1 = ctx.regs.iff2;
            ctx.regs.pc = ctx.pop_word();
            ctx.regs.wz = ctx.regs.pc;
            14
        }

        // IM 0 (and mirrors)
        0x46 | 0x4E | 0x66 | 0x6E => {
            ctx.regs.im = 0;
            8
        }

        // IM 1
        0x56 | 0x76 => {
            ctx.regs.im = 1;
            8
        }

        // IM 2
        0x5E | 0x7E => {
            ctx.regs.im = 2;
            8
        }

        // LD I, A
        0x47 => {
            ctx.regs.i = ctx.regs.a;
            9
        }

        // LD R, A: all 8 bits land in the counter, bit 7 also in the latch
        0x4F => {
            let a = ctx.regs.a;
            ctx.regs.set_r_full(a);
            9
        }

        // LD A, I
        0x57 => {
            ctx.regs.a = ctx.regs.i;
            let value = ctx.regs.a;
            set_f(
                ctx,
                (ctx.regs.f & CF)
                    | SZYX_FLAGS[value as usize]
                    | if ctx.regs.iff2 { PF } else { 0 },
            );
            9
        }

        // LD A, R
        0x5F => {
            ctx.regs.a = ctx.regs.r_full();
            let value = ctx.regs.a;
            set_f(
                ctx,
                (ctx.regs.f & CF)
                    | SZYX_FLAGS[value as usize]
                    | if ctx.regs.iff2 { PF } else { 0 },
            );
            9
        }

        // RRD
        0x67 => {
            let hl = ctx.regs.hl();
            let mem = ctx.mem_read(hl);
            ctx.regs.wz = hl.wrapping_add(1);
            let new_a = (ctx.regs.a & 0xF0) | (mem & 0x0F);
            let new_mem = ((ctx.regs.a & 0x0F) << 4) | (mem >> 4);
            ctx.regs.a = new_a;
            ctx.mem_write(hl, new_mem);
            set_f(ctx, SZYXP_FLAGS[new_a as usize] | (ctx.regs.f & CF));
            18
        }

        // RLD
        0x6F => {
            let hl = ctx.regs.hl();
            let mem = ctx.mem_read(hl);
            ctx.regs.wz = hl.wrapping_add(1);
            let new_a = (ctx.regs.a & 0xF0) | (mem >> 4);
            let new_mem = ((mem & 0x0F) << 4) | (ctx.regs.a & 0x0F);
            ctx.regs.a = new_a;
            ctx.mem_write(hl, new_mem);
            set_f(ctx, SZYXP_FLAGS[new_a as usize] | (ctx.regs.f & CF));
            18
        }

        // LDI / LDD
        0xA0 | 0xA8 => block_ld(ctx, op == 0xA0, false),

        // LDIR / LDDR
        0xB0 | 0xB8 => block_ld(ctx, op == 0xB0, true),

        // CPI / CPD
        0xA1 | 0xA9 => block_cp(ctx, op == 0xA1, false),

        // CPIR / CPDR
        0xB1 | 0xB9 => block_cp(ctx, op == 0xB1, true),

        // INI / IND
        0xA2 | 0xAA => block_in(ctx, op == 0xA2, false),

        // INIR / INDR
        0xB2 | 0xBA => block_in(ctx, op == 0xB2, true),

        // OUTI / OUTD
        0xA3 | 0xAB => block_out(ctx, op == 0xA3, false),

        // OTIR / OTDR
        0xB3 | 0xBB => block_out(ctx, op == 0xB3, true),

        // Everything else in the ED space is a NOP pair on the silicon.
        _ => {
            if ctx.conf.undoc_inst {
                8
            } else {
                ctx.stop_with(CpuError::OpTrap2 {
                    addr: ctx.regs.pc.wrapping_sub(2),
                    prefix: 0xED,
                    op,
                });
                0
            }
        }
    };
    ctx.add_t(t);
}

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

/// Back PC up over the prefix pair so the next step re-fetches ED xx.
fn repeat(ctx: &mut CpuContext) -> u8 {
    ctx.regs.pc = ctx.regs.pc.wrapping_sub(2);
    ctx.regs.wz = ctx.regs.pc.wrapping_add(1);
    (ctx.regs.pc >> 8) as u8
}

/// One LDI/LDD/LDIR/LDDR iteration. Returns the iteration's T-states for
/// the repeating forms.
fn block_ld(ctx: &mut CpuContext, forward: bool, repeating: bool) -> u32 {
    let hl = ctx.regs.hl();
    let de = ctx.regs.de();
    let value = ctx.mem_read(hl);
    ctx.mem_write(de, value);
    if forward {
        ctx.regs.set_hl(hl.wrapping_add(1));
        ctx.regs.set_de(de.wrapping_add(1));
    } else {
        ctx.regs.set_hl(hl.wrapping_sub(1));
        ctx.regs.set_de(de.wrapping_sub(1));
    }
    let bc = ctx.regs.bc().wrapping_sub(1);
    ctx.regs.set_bc(bc);

    let n = value.wrapping_add(ctx.regs.a);
    let base = (ctx.regs.f & (SF | ZF | CF)) | if bc != 0 { PF } else { 0 };
    if repeating && bc != 0 {
        let pch = repeat(ctx);
        set_f(ctx, base | (pch & (YF | XF)));
        21
    } else {
        set_f(
            ctx,
            base | (n & XF) | if n & 0x02 != 0 { YF } else { 0 },
        );
        16
    }
}

/// One CPI/CPD/CPIR/CPDR iteration.
fn block_cp(ctx: &mut CpuContext, forward: bool, repeating: bool) -> u32 {
    let hl = ctx.regs.hl();
    let value = ctx.mem_read(hl);
    if forward {
        ctx.regs.set_hl(hl.wrapping_add(1));
        ctx.regs.wz = ctx.regs.wz.wrapping_add(1);
    } else {
        ctx.regs.set_hl(hl.wrapping_sub(1));
        ctx.regs.wz = ctx.regs.wz.wrapping_sub(1);
    }
    let bc = ctx.regs.bc().wrapping_sub(1);
    ctx.regs.set_bc(bc);

    let result = ctx.regs.a.wrapping_sub(value);
    let hf = (ctx.regs.a & 0x0F) < (value & 0x0F);
    let n = result.wrapping_sub(u8::from(hf));
    let base = (ctx.regs.f & CF)
        | NF
        | (SZYX_FLAGS[result as usize] & !(YF | XF))
        | if hf { HF } else { 0 }
        | if bc != 0 { PF } else { 0 };
    if repeating && bc != 0 && result != 0 {
        let pch = repeat(ctx);
        set_f(ctx, base | (pch & (YF | XF)));
        21
    } else {
        set_f(
            ctx,
            base | (n & XF) | if n & 0x02 != 0 { YF } else { 0 },
        );
        16
    }
}

/// One INI/IND/INIR/INDR iteration.
fn block_in(ctx: &mut CpuContext, forward: bool, repeating: bool) -> u32 {
    let bc = ctx.regs.bc();
    ctx.regs.wz = if forward {
        bc.wrapping_add(1)
    } else {
        bc.wrapping_sub(1)
    };
    let value = ctx.io_input(ctx.regs.c, false);
    let hl = ctx.regs.hl();
    ctx.mem_write(hl, value);
    ctx.regs.b = ctx.regs.b.wrapping_sub(1);
    let c_adj = if forward {
        ctx.regs.c.wrapping_add(1)
    } else {
        ctx.regs.c.wrapping_sub(1)
    };
    ctx.regs.set_hl(if forward {
        hl.wrapping_add(1)
    } else {
        hl.wrapping_sub(1)
    });

    let k = u16::from(value) + u16::from(c_adj);
    let flags = io_block_flags(ctx.regs.b, value, k);
    if repeating && ctx.regs.b != 0 {
        let pch = repeat(ctx);
        set_f(ctx, (flags & !(YF | XF)) | (pch & (YF | XF)));
        21
    } else {
        set_f(ctx, flags);
        16
    }
}

/// One OUTI/OUTD/OTIR/OTDR iteration.
fn block_out(ctx: &mut CpuContext, forward: bool, repeating: bool) -> u32 {
    let hl = ctx.regs.hl();
    let value = ctx.mem_read(hl);
    ctx.regs.b = ctx.regs.b.wrapping_sub(1);
    let bc = ctx.regs.bc();
    ctx.regs.wz = if forward {
        bc.wrapping_add(1)
    } else {
        bc.wrapping_sub(1)
    };
    ctx.io_output(ctx.regs.c, value);
    ctx.regs.set_hl(if forward {
        hl.wrapping_add(1)
    } else {
        hl.wrapping_sub(1)
    });

    let k = u16::from(value) + u16::from(ctx.regs.l);
    let flags = io_block_flags(ctx.regs.b, value, k);
    if repeating && ctx.regs.b != 0 {
        let pch = repeat(ctx);
        set_f(ctx, (flags & !(YF | XF)) | (pch & (YF | XF)));
        21
    } else {
        set_f(ctx, flags);
        16
    }
}

/// Shared flag derivation for the block I/O family.
fn io_block_flags(b: u8, value: u8, k: u16) -> u8 {
    let mut flags = SZYX_FLAGS[b as usize];
    if value & 0x80 != 0 {
        flags |= NF;
    }
    if k > 0xFF {
        flags |= HF | CF;
    }
    flags |= SZYXP_FLAGS[(((k as u8) & 7) ^ b) as usize] & PF;
    flags
}
