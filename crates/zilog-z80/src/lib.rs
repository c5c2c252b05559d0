//! Zilog Z80 CPU emulation.
//!
//! One call to `step()` executes exactly one instruction (or one iteration
//! of a repeating block instruction) against the shared `CpuContext`, after
//! honoring any pending bus request, NMI or maskable interrupt.

mod alu;
mod exec;
mod exec_cb;
mod exec_ed;

pub use exec::step;
