//! Unit tests for individual 8080 instructions.

use emu_core::{CpuContext, CpuError, CpuModel, CpuState, CF, HF, NF, PF, SF, XF, YF, ZF};
use intel_8080::step;

fn ctx_with(program: &[u8]) -> CpuContext {
    let mut ctx = CpuContext::new(CpuModel::I8080);
    ctx.mem.load_bytes(0x0000, program, program.len()).unwrap();
    ctx.regs.sp = 0xF000;
    ctx.state = CpuState::ContinRun;
    ctx
}

/// Step until the context stops (HLT with interrupts disabled).
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
fn mov_and_mvi() {
    let mut ctx = ctx_with(&[
        0x3E, 0x42, // MVI A, 0x42
        0x47, // MOV B, A
        0x26, 0x20, // MVI H, 0x20
        0x2E, 0x00, // MVI L, 0x00
        0x70, // MOV M, B
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.b, 0x42);
    assert_eq!(ctx.mem.read(0x2000), 0x42);
}

#[test]
fn ana_b_with_complementary_pattern() {
    // A=0xAA AND B=0x55 -> 0; the 8080 half-carry is the OR of bit 3.
    let mut ctx = ctx_with(&[0xA0, 0x76]); // ANA B
    ctx.regs.a = 0xAA;
    ctx.regs.b = 0x55;
    ctx.regs.f = 0xFF & !(YF | XF);
    step(&mut ctx);

    assert_eq!(ctx.regs.a, 0x00);
    let f = ctx.regs.f;
    assert_ne!(f & ZF, 0);
    assert_eq!(f & SF, 0);
    assert_ne!(f & PF, 0);
    assert_eq!(f & CF, 0);
    assert_ne!(f & HF, 0, "AC from OR of bit 3 of the operands");
    assert_ne!(f & NF, 0);
    assert_eq!(f & (YF | XF), 0);
}

#[test]
fn forced_flag_bits_survive_every_instruction() {
    let programs: &[&[u8]] = &[
        &[0x3E, 0x7F, 0xC6, 0x01], // MVI A; ADI (overflowing)
        &[0x3E, 0x10, 0xD6, 0x20], // SUI with borrow
        &[0x07],                   // RLC
        &[0x27],                   // DAA
        &[0x04],                   // INR B
        &[0x35],                   // DCR M
        &[0xF5, 0xF1],             // PUSH PSW; POP PSW
    ];
    for program in programs {
        let mut ctx = ctx_with(program);
        for _ in 0..program.len() {
            if ctx.state != CpuState::ContinRun {
                break;
            }
            step(&mut ctx);
        }
        assert_ne!(ctx.regs.f & NF, 0, "N forced for {program:02X?}");
        assert_eq!(ctx.regs.f & (YF | XF), 0, "Y/X forced for {program:02X?}");
    }
}

#[test]
fn inr_dcr_leave_carry_alone() {
    let mut ctx = ctx_with(&[0x37, 0x04, 0x05, 0x76]); // STC; INR B; DCR B
    run_until_stop(&mut ctx);
    assert_ne!(ctx.regs.f & CF, 0, "carry untouched");
    assert_ne!(ctx.regs.f & ZF, 0, "B wrapped back to zero");
}

#[test]
fn dad_only_touches_carry() {
    let mut ctx = ctx_with(&[
        0x21, 0xFF, 0xFF, // LXI H, 0xFFFF
        0x01, 0x02, 0x00, // LXI B, 0x0002
        0x09, // DAD B
        0x76,
    ]);
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.hl(), 0x0001);
    assert_ne!(ctx.regs.f & CF, 0);
}

#[test]
fn daa_adjusts_bcd() {
    let mut ctx = ctx_with(&[0x3E, 0x15, 0xC6, 0x27, 0x27, 0x76]); // MVI A; ADI; DAA
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.a, 0x42);
}

#[test]
fn conditional_call_and_return_timing() {
    // CNZ taken: 17 T-states, not taken: 11.
    let mut ctx = ctx_with(&[0xC4, 0x00, 0x10]);
    ctx.regs.f &= !ZF;
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x1000);
    assert_eq!(ctx.t_states, 17);

    let mut ctx = ctx_with(&[0xC4, 0x00, 0x10]);
    ctx.regs.f |= ZF;
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0003);
    assert_eq!(ctx.t_states, 11);
}

#[test]
fn xthl_swaps_with_stack_top() {
    let mut ctx = ctx_with(&[0xE3, 0x76]); // XTHL
    ctx.regs.set_hl(0x1234);
    ctx.regs.sp = 0x8000;
    ctx.mem.load_bytes(0x8000, &[0x78, 0x56], 2).unwrap();
    run_until_stop(&mut ctx);
    assert_eq!(ctx.regs.hl(), 0x5678);
    assert_eq!(ctx.mem.read(0x8000), 0x34);
    assert_eq!(ctx.mem.read(0x8001), 0x12);
}

#[test]
fn push_psw_composes_the_8080_flag_byte() {
    let mut ctx = ctx_with(&[0xF5, 0x76]); // PUSH PSW
    ctx.regs.a = 0x9C;
    ctx.regs.f = SF | ZF | CF | NF;
    run_until_stop(&mut ctx);
    let pushed_f = ctx.mem.read(0xEFFE);
    assert_eq!(ctx.mem.read(0xEFFF), 0x9C);
    assert_eq!(pushed_f & (YF | XF), 0, "bits 5 and 3 always 0");
    assert_ne!(pushed_f & NF, 0, "bit 1 always 1");
    assert_ne!(pushed_f & CF, 0);
}

#[test]
fn undocumented_mirrors_execute_by_default() {
    let mut ctx = ctx_with(&[0x08, 0xCB, 0x10, 0x00, 0x76]); // NOP*; JMP 0x0010
    ctx.mem.load_bytes(0x0010, &[0x76], 1).unwrap();
    run_until_stop(&mut ctx);
    assert_eq!(ctx.error, Some(CpuError::OpHalt { addr: 0x0010 }));
}

#[test]
fn undocumented_mirrors_trap_when_excluded() {
    let mut ctx = ctx_with(&[0xD9, 0x76]); // RET mirror
    ctx.conf.undoc_inst = false;
    step(&mut ctx);
    assert_eq!(
        ctx.error,
        Some(CpuError::OpTrap1 {
            addr: 0x0000,
            op: 0xD9
        })
    );
}

#[test]
fn io_moves_bytes_through_the_port_bus() {
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    let mut ctx = ctx_with(&[
        0x3E, 0x5A, // MVI A
        0xD3, 0x10, // OUT 0x10
        0xDB, 0x20, // IN 0x20
        0x76,
    ]);
    let latch = Arc::new(AtomicU8::new(0));
    let latch2 = Arc::clone(&latch);
    ctx.io
        .set_out_handler(0x10, Box::new(move |v| latch2.store(v, Ordering::Relaxed)));
    ctx.io.set_in_handler(0x20, Box::new(|| 0x99));
    run_until_stop(&mut ctx);
    assert_eq!(latch.load(Ordering::Relaxed), 0x5A);
    assert_eq!(ctx.regs.a, 0x99);
}

#[test]
fn repeated_input_polls_tick_the_busy_counter() {
    let mut ctx = ctx_with(&[
        0xDB, 0x10, // IN 0x10    <- loop
        0xC3, 0x00, 0x00, // JMP 0x0000
    ]);
    ctx.io.set_in_handler(0x10, Box::new(|| 0x00));
    for _ in 0..20 {
        step(&mut ctx);
    }
    assert_eq!(ctx.io.busy_loop_count(), 10);
}

#[test]
fn rst_delivery_on_interrupt() {
    let mut ctx = ctx_with(&[0x00, 0x00]);
    ctx.regs.iff1 = true;
    ctx.devices.request_interrupt(0xD7); // RST 2 -> 0x0010
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0010);
    assert!(!ctx.regs.iff1);
    assert_eq!(ctx.mem.read(ctx.regs.sp), 0x00, "interrupted PC pushed");
    assert_eq!(ctx.t_states, 11);
}

#[test]
fn ei_shield_makes_ei_ret_atomic() {
    let mut ctx = ctx_with(&[0xFB, 0xC9]); // EI; RET
    ctx.push_word(0x2000);
    ctx.devices.request_interrupt(0xC7); // RST 0
    step(&mut ctx); // EI
    step(&mut ctx); // RET, shielded
    assert_eq!(ctx.regs.pc, 0x2000);
    step(&mut ctx); // delivery
    assert_eq!(ctx.regs.pc, 0x0000);
    assert_eq!(ctx.mem.read(ctx.regs.sp), 0x00);
    assert_eq!(ctx.mem.read(ctx.regs.sp + 1), 0x20);
}

#[test]
fn hlt_with_interrupts_enabled_parks() {
    let mut ctx = ctx_with(&[0xFB, 0x76, 0x3C]); // EI; HLT; INR A
    step(&mut ctx);
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0001);
    assert!(ctx.halted);

    ctx.devices.request_interrupt(0xC7); // RST 0
    step(&mut ctx);
    assert_eq!(ctx.regs.pc, 0x0000);
    assert_eq!(ctx.mem.read(ctx.regs.sp), 0x02, "resume address is past the HLT");
}

#[test]
fn missing_interrupt_data_stops_the_cpu() {
    let mut ctx = ctx_with(&[0x00]);
    ctx.regs.iff1 = true;
    ctx.devices.request_interrupt_no_data();
    step(&mut ctx);
    assert_eq!(ctx.error, Some(CpuError::IntError { data: -1 }));
    assert_eq!(ctx.state, CpuState::Stopped);
}

#[test]
fn t_state_costs_match_the_data_sheet() {
    let cases: &[(&[u8], u64)] = &[
        (&[0x00], 4),              // NOP
        (&[0x47], 5),              // MOV B, A
        (&[0x46], 7),              // MOV B, M
        (&[0x3E, 0x00], 7),        // MVI A
        (&[0x36, 0x00], 10),       // MVI M
        (&[0x01, 0x00, 0x00], 10), // LXI B
        (&[0x09], 10),             // DAD B
        (&[0x3A, 0x00, 0x20], 13), // LDA
        (&[0x2A, 0x00, 0x20], 16), // LHLD
        (&[0xC5], 11),             // PUSH B
        (&[0xC1], 10),             // POP B
        (&[0xC3, 0x00, 0x00], 10), // JMP
        (&[0xCD, 0x00, 0x10], 17), // CALL
        (&[0xE3], 18),             // XTHL
        (&[0xEB], 4),              // XCHG
        (&[0xE9], 5),              // PCHL
        (&[0xDB, 0x01], 10),       // IN
        (&[0xD3, 0x01], 10),       // OUT
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
