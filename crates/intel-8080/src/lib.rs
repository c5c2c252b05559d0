//! Intel 8080 CPU emulation.
//!
//! One call to `step()` executes exactly one instruction against the shared
//! `CpuContext`, after honoring any pending bus request or interrupt.

mod alu;
mod exec;

pub use exec::step;
