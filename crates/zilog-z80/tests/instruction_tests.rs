//! Unit tests for individual Z80 instructions.
//!
//! Programs are terminated with DI; HALT, which records an OpHalt error and
//! stops the context, like a monitor dropping into its trap handler.

use emu_core::{CpuContext, CpuError, CpuModel, CpuState, CF, HF, NF, PF, SF, XF, YF, ZF};
use zilog_z80::step;

fn ctx_with(program: &[u8]) -> CpuContext {
    let mut ctx = CpuContext::new(CpuModel::Z80);
    ctx.mem.load_bytes(0x0000, program, program.len()).unwrap();
    ctx.regs.sp = 0xF000;
    ctx.state = CpuState::ContinRun;
    ctx
}

/// Step until the context stops (HALT with interrupts disabled).
fn run_until_stop(ctx: &mut CpuContext) {
    for _ in 0..10_000 {
        if ctx.state != CpuState::ContinRun {
            return;
        }
        step(ctx);
    }
    panic!("program did not stop");
}

#[test]
fn nop_advances_pc_and_counts_t_states() {
    let mut ctx = ctx_with(&[0x00, 0x00, 0x76]);
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0001);
    assert_eq!(ctx.t_states, 4);
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0002);
    assert_eq!(ctx.t_states, 8);
}

#[test]
fn halt_with_interrupts_disabled_reports_op_halt() {
    let mut ctx = ctx_with(&[0x76]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.error, Some(CpuError::OpHalt { addr: 0x0000 }));
    assert_eq!(ctx.state, CpuState::Stopped);
}

#[test]
fn ld_immediate_and_pairs() {
    let mut ctx = ctx_with(&[
        0x3E, 0x42, // LD A, 0x42
        0x01, 0x34, 0x12, // LD BC, 0x1234
        0x31, 0x00, 0x80, // LD SP, 0x8000
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0x42);
    assert_eq!(ctx.regs.bc(), 0x1234);
    assert_eq!(ctx.regs.sp, 0x8000);
}

#[test]
fn push_pop_round_trip() {
    let mut ctx = ctx_with(&[
        0x01, 0x34, 0x12, // LD BC, 0x1234
        0xC5, // PUSH BC
        0x01, 0x00, 0x00, // LD BC, 0
        0xC1, // POP BC
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.bc(), 0x1234);
    assert_eq!(ctx.regs.sp, 0xF000);
}

#[test]
fn call_and_ret() {
    let mut ctx = ctx_with(&[
        0xCD, 0x10, 0x00, // CALL 0x0010
        0x3E, 0x99, // LD A, 0x99
        0x76,
    ]);
    ctx.mem
        .load_bytes(0x0010, &[0x3E, 0x42, 0xC9], 3)
        .unwrap(); // LD A, 0x42; RET
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0x99);
    assert_eq!(ctx.regs.sp, 0xF000);
}

#[test]
fn djnz_loops_b_times() {
    let mut ctx = ctx_with(&[
        0x06, 0x05, // LD B, 5
        0xAF, // XOR A
        0x3C, // INC A      <- loop
        0x10, 0xFD, // DJNZ -3
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 5);
    assert_eq!(ctx.regs.b, 0);
}

#[test]
fn daa_after_addition() {
    // ADD A, 0x27 with A=0x15, then DAA: BCD 15 + 27 = 42.
    let mut ctx = ctx_with(&[0xC6, 0x27, 0x27, 0x76]);
    ctx.regs.a = 0x15;
    ctx.regs.f = 0x00;
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0x42);
    let f = ctx.regs.f;
    assert_eq!(f & HF, 0, "H cleared");
    assert_eq!(f & NF, 0, "N cleared");
    assert_eq!(f & CF, 0, "C cleared");
    assert_ne!(f & PF, 0, "P set (0x42 has even parity)");
    assert_eq!(f & ZF, 0, "Z cleared");
    assert_eq!(f & SF, 0, "S cleared");
}

#[test]
fn ldir_copies_a_block() {
    let mut ctx = ctx_with(&[0xED, 0xB0, 0x76]); // LDIR
    ctx.regs.set_hl(0x2000);
    ctx.regs.set_de(0x3000);
    ctx.regs.set_bc(0x0010);
    let data: Vec<u8> = (0..16).collect();
    ctx.mem.load_bytes(0x2000, &data, 16).unwrap();

    run_until_stop(&mut ctx);

    for i in 0..16u16 {
        assert_eq!(ctx.mem.read(0x3000 + i), i as u8);
    }
    assert_eq!(ctx.regs.bc(), 0);
    assert_eq!(ctx.regs.hl(), 0x2010);
    assert_eq!(ctx.regs.de(), 0x3010);
    assert_eq!(ctx.regs.f & PF, 0, "P/V cleared once BC reaches 0");
}

#[test]
fn ldir_iterations_are_separate_steps() {
    let mut ctx = ctx_with(&[0xED, 0xB0, 0x76]);
    ctx.regs.set_hl(0x2000);
    ctx.regs.set_de(0x3000);
    ctx.regs.set_bc(0x0003);

    step(&mut ctx);
    // One byte moved, PC backed over the prefix, 21 T-states.
    assert_eq!(ctx.regs.bc(), 2);
    assert_eq!(ctx.regs.pc, 0x0000);
    assert_eq!(ctx.t_states, 21);

    step(&mut ctx);
    step(&mut ctx);
    // Final iteration costs 16 and falls through.
    assert_eq!(ctx.regs.bc(), 0);
    assert_eq!(ctx.regs.pc, 0x0002);
    assert_eq!(ctx.t_states, 21 + 21 + 16);
}

#[test]
fn bit7_hl_leaks_wz_into_y_and_x() {
    let mut ctx = ctx_with(&[0xCB, 0x7E, 0x76]); // BIT 7, (HL)
    ctx.regs.set_hl(0x1234);
    ctx.regs.wz = 0x5678;
    ctx.mem.write(0x1234, 0x80);

    step(&mut ctx);

    let f = ctx.regs.f;
    assert_eq!(f & ZF, 0);
    assert_ne!(f & SF, 0);
    assert_ne!(f & HF, 0);
    assert_eq!(f & NF, 0);
    assert_eq!(f & YF != 0, 0x56 & 0x20 != 0, "Y from WZ high byte");
    assert_eq!(f & XF != 0, 0x56 & 0x08 != 0, "X from WZ high byte");
}

#[test]
fn indexed_loads_use_displacement() {
    let mut ctx = ctx_with(&[
        0xDD, 0x21, 0x00, 0x40, // LD IX, 0x4000
        0xDD, 0x36, 0x05, 0xAB, // LD (IX+5), 0xAB
        0xDD, 0x7E, 0x05, // LD A, (IX+5)
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.mem.read(0x4005), 0xAB);
    assert_eq!(ctx.regs.a, 0xAB);
}

#[test]
fn indexed_memory_form_keeps_real_h() {
    // LD H, (IX+0) must load the real H, not IXH.
    let mut ctx = ctx_with(&[0xDD, 0x66, 0x00, 0x76]);
    ctx.regs.ix = 0x4000;
    ctx.regs.h = 0x00;
    ctx.mem.write(0x4000, 0x5A);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.h, 0x5A);
    assert_eq!(ctx.regs.ix, 0x4000);
}

#[test]
fn undocumented_ixh_arithmetic() {
    // LD IXH, 0x12 (DD 26 12) then ADD A, IXH (DD 84).
    let mut ctx = ctx_with(&[0xDD, 0x26, 0x12, 0xDD, 0x84, 0x76]);
    ctx.regs.a = 0x01;
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.ix & 0xFF00, 0x1200);
    assert_eq!(ctx.regs.a, 0x13);
}

#[test]
fn undocumented_forms_trap_when_excluded() {
    let mut ctx = ctx_with(&[0xDD, 0x26, 0x12, 0x76]); // LD IXH, n
    ctx.conf.undoc_inst = false;
    step(&mut ctx);
    assert!(matches!(
        ctx.error,
        Some(CpuError::OpTrap2 {
            prefix: 0xDD,
            op: 0x26,
            ..
        })
    ));
    assert_eq!(ctx.state, CpuState::Stopped);
}

#[test]
fn sll_shifts_in_a_one() {
    let mut ctx = ctx_with(&[0xCB, 0x37, 0x76]); // SLL A
    ctx.regs.a = 0x80;
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0x01);
    assert_ne!(ctx.regs.f & CF, 0);
}

#[test]
fn ddcb_rotate_writes_back_to_register() {
    // DD CB 02 00: RLC (IX+2), result also lands in B (undocumented).
    let mut ctx = ctx_with(&[0xDD, 0xCB, 0x02, 0x00, 0x76]);
    ctx.regs.ix = 0x4000;
    ctx.mem.write(0x4002, 0x81);
    step(&mut ctx);
    assert_eq!(ctx.mem.read(0x4002), 0x03);
    assert_eq!(ctx.regs.b, 0x03);
    assert_ne!(ctx.regs.f & CF, 0);
    assert_eq!(ctx.t_states, 23);
}

#[test]
fn refresh_counter_counts_fetches_and_prefixes() {
    let mut ctx = ctx_with(&[
        0x00, // NOP: 1 fetch
        0xDD, 0x00, // DD NOP: prefix + opcode
        0xDD, 0xCB, 0x01, 0x06, // DDCB: two increments, none for the final byte
        0x76,
    ]);
    step(&mut ctx);
    assert_eq!(ctx.regs.r, 1);
    step(&mut ctx);
    assert_eq!(ctx.regs.r, 3, "prefix and opcode each refresh");
    step(&mut ctx);
    assert_eq!(ctx.regs.r, 5, "DDCB refreshes only twice");
}

#[test]
fn ld_r_a_then_ld_a_r_round_trips_low_bits() {
    let mut ctx = ctx_with(&[
        0xED, 0x4F, // LD R, A
        0xED, 0x5F, // LD A, R
        0x76,
    ]);
    ctx.regs.a = 0xD5;
    step(&mut ctx);
    step(&mut ctx);
    // Two M1 fetches happen between the load and the read-back.
    assert_eq!(ctx.regs.a & 0x80, 0x80, "bit 7 comes from the latch");
    assert_eq!(ctx.regs.a & 0x7F, (0xD5 + 2) & 0x7F);
}

#[test]
fn alternate_bank_swaps() {
    let mut ctx = ctx_with(&[
        0x01, 0x34, 0x12, // LD BC, 0x1234
        0xD9, // EXX
        0x01, 0x78, 0x56, // LD BC, 0x5678
        0xD9, // EXX
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.bc(), 0x1234);
    assert_eq!(ctx.regs.b_alt, 0x56);
    assert_eq!(ctx.regs.c_alt, 0x78);
}

#[test]
fn sixteen_bit_wraparound() {
    let mut ctx = ctx_with(&[]);
    ctx.mem.load_bytes(0xFFFF, &[0x00], 1).unwrap(); // NOP at the top
    ctx.regs.pc = 0xFFFF;
    ctx.state = CpuState::ContinRun;
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0000);
}

#[test]
fn cpir_stops_on_match() {
    let mut ctx = ctx_with(&[0xED, 0xB1, 0x76]); // CPIR
    ctx.regs.a = 0x33;
    ctx.regs.set_hl(0x2000);
    ctx.regs.set_bc(0x0010);
    ctx.mem.load_bytes(0x2000, &[0x11, 0x22, 0x33, 0x44], 4).unwrap();
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.hl(), 0x2003, "HL one past the match");
    assert_eq!(ctx.regs.bc(), 0x000D);
    assert_ne!(ctx.regs.f & ZF, 0);
    assert_ne!(ctx.regs.f & PF, 0, "BC still nonzero");
}

#[test]
fn out_and_in_via_port_handlers() {
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    let mut ctx = ctx_with(&[
        0x3E, 0x5A, // LD A, 0x5A
        0xD3, 0x10, // OUT (0x10), A
        0xDB, 0x20, // IN A, (0x20)
        0x76,
    ]);
    let latch = Arc::new(AtomicU8::new(0));
    let latch2 = Arc::clone(&latch);
    ctx.io
        .set_out_handler(0x10, Box::new(move |v| latch2.store(v, Ordering::Relaxed)));
    ctx.io.set_in_handler(0x20, Box::new(|| 0x77));
    run_until_stop(&mut ctx);
    assert_eq!(latch.load(Ordering::Relaxed), 0x5A);
    assert_eq!(ctx.regs.a, 0x77);
}

#[test]
fn unmapped_port_reads_ff() {
    let mut ctx = ctx_with(&[0xDB, 0x42, 0x76]); // IN A, (0x42)
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0xFF);
    assert_eq!(ctx.error, Some(CpuError::OpHalt { addr: 0x0002 }));
}

#[test]
fn rom_page_ignores_stores() {
    use emu_core::PageAttr;
    let mut ctx = ctx_with(&[
        0x21, 0x00, 0x20, // LD HL, 0x2000
        0x36, 0x55, // LD (HL), 0x55
        0x76,
    ]);
    ctx.mem.set_attribute(0x20, PageAttr::ReadOnly);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.mem.read(0x2000), 0x00);
}

#[test]
fn t_state_costs_match_the_data_sheet() {
    // (program, expected T-states for the first instruction)
    let cases: &[(&[u8], u64)] = &[
        (&[0x00], 4),                   // NOP
        (&[0x3E, 0x01], 7),             // LD A, n
        (&[0x01, 0x00, 0x00], 10),      // LD BC, nn
        (&[0x34], 11),                  // INC (HL)
        (&[0xC3, 0x00, 0x10], 10),      // JP nn
        (&[0xCD, 0x00, 0x10], 17),      // CALL nn
        (&[0xC9], 10),                  // RET
        (&[0xE3], 19),                  // EX (SP), HL
        (&[0xCB, 0x07], 8),             // RLC A
        (&[0xCB, 0x46], 12),            // BIT 0, (HL)
        (&[0xCB, 0x06], 15),            // RLC (HL)
        (&[0xED, 0x44], 8),             // NEG
        (&[0xED, 0x57], 9),             // LD A, I
        (&[0xED, 0x6F], 18),            // RLD
        (&[0xED, 0x43, 0x00, 0x20], 20),// LD (nn), BC
        (&[0xDD, 0x23], 10),            // INC IX
        (&[0xDD, 0xE5], 15),            // PUSH IX
        (&[0xDD, 0x86, 0x01], 19),      // ADD A, (IX+1)
        (&[0xDD, 0x36, 0x01, 0x00], 19),// LD (IX+1), n
        (&[0xDD, 0xCB, 0x01, 0x46], 20),// BIT 0, (IX+1)
        (&[0xDD, 0xCB, 0x01, 0x16], 23),// RL (IX+1)
    ];
    for &(program, expected) in cases {
        let mut ctx = ctx_with(program);
        step(&mut ctx);
        assert_eq!(
            ctx.t_states, expected,
            "T-states for opcode bytes {program:02X?}"
        );
    }
}

#[test]
fn conditional_timing_differs_when_not_taken() {
    // JR NZ with Z set: 7 T-states, with Z clear: 12.
    let mut ctx = ctx_with(&[0x20, 0x02, 0x76]);
    ctx.regs.f = ZF;
    step(&mut ctx);
    assert_eq!(ctx.t_states, 7);

    let mut ctx = ctx_with(&[0x20, 0x02, 0x76]);
    ctx.regs.f = 0;
    step(&mut ctx);
    assert_eq!(ctx.t_states, 12);
}
