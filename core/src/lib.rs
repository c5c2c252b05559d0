//! Shared core for the Z80/8080 emulation: register file, flag tables,
//! memory and I/O buses, the device fabric and the execution context the
//! decoders run against.

mod bus;
mod context;
mod flags;
mod io;
mod memory;
mod registers;
mod state;

pub use bus::{
    DeviceBus, DmaMaster, CPU_HLTA, CPU_INP, CPU_INTA, CPU_M1, CPU_MEMR, CPU_MEMW, CPU_OUT,
    CPU_WO, INT_DATA_NONE,
};
pub use context::{CoreConfig, CpuContext, CycleHook};
pub use flags::{parity, CF, HF, NF, PF, SF, XF, YF, ZF, SZP_FLAGS, SZYX_FLAGS, SZYXP_FLAGS};
pub use io::{InHandler, IoBus, OutHandler, IO_DATA_UNUSED};
pub use memory::{LoadError, Memory, PageAttr, MEM_SIZE, NUM_PAGES, PAGE_SIZE, UNMAPPED_DATA};
pub use registers::Registers;
pub use state::{BusMode, CpuError, CpuModel, CpuState};
