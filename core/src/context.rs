//! The execution context threaded through the decoders.
//!
//! Everything the original kept as process-wide scalars lives here as one
//! value owned by the scheduler: registers, buses, interrupt bookkeeping,
//! the T-state counter and the bus-status byte. Devices hold the shared
//! `DeviceBus` handle instead of touching the context.

use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::bus::{
    DeviceBus, CPU_HLTA, CPU_INP, CPU_INTA, CPU_M1, CPU_MEMR, CPU_MEMW, CPU_OUT, CPU_WO,
};
use crate::flags::{NF, XF, YF};
use crate::io::{IoBus, IO_DATA_UNUSED};
use crate::memory::Memory;
use crate::registers::Registers;
use crate::state::{CpuError, CpuModel, CpuState};

/// Runtime feature selection.
///
/// The original excluded models, undocumented opcodes and the flag tables at
/// build time; here the same choices are plain data consulted at dispatch.
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    /// Execute undocumented opcodes instead of trapping on them.
    pub undoc_inst: bool,
    /// Model the undocumented Y/X flags and the WZ latch.
    pub undoc_flags: bool,
    /// Treat access to a port with no handler as a fatal trap.
    pub io_trap: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            undoc_inst: true,
            undoc_flags: true,
            io_trap: false,
        }
    }
}

/// Front-panel machine-cycle hook: (bus status, address, data).
pub type CycleHook = Box<dyn FnMut(u8, u16, u8) + Send>;

/// CPU execution context: registers, buses, interrupt and error state.
pub struct CpuContext {
    pub model: CpuModel,
    pub conf: CoreConfig,
    pub regs: Registers,
    pub mem: Memory,
    pub io: IoBus,
    pub devices: Arc<DeviceBus>,

    pub state: CpuState,
    pub error: Option<CpuError>,

    /// Global T-state counter.
    pub t_states: u64,
    /// Bus status byte observable by front panels, updated per machine cycle.
    pub bus_status: u8,

    /// One-instruction interrupt shield raised by EI.
    pub int_protection: bool,
    /// The CPU is parked on a HALT opcode.
    pub halted: bool,

    cycle_hook: Option<CycleHook>,
}

impl CpuContext {
    /// Create a context in the powered-off state (all zeros, Stopped).
    #[must_use]
    pub fn new(model: CpuModel) -> Self {
        Self::with_config(model, CoreConfig::default())
    }

    /// Create a context with explicit feature selection.
    #[must_use]
    pub fn with_config(model: CpuModel, conf: CoreConfig) -> Self {
        let mut ctx = Self {
            model,
            conf,
            regs: Registers::default(),
            mem: Memory::new(),
            io: IoBus::new(),
            devices: Arc::new(DeviceBus::new()),
            state: CpuState::Stopped,
            error: None,
            t_states: 0,
            bus_status: 0,
            int_protection: false,
            halted: false,
            cycle_hook: None,
        };
        if model == CpuModel::I8080 {
            ctx.regs.f = (ctx.regs.f | NF) & !(YF | XF);
        }
        ctx
    }

    /// Install a front-panel cycle hook. Absent a hook the executor runs
    /// full instructions without yielding.
    pub fn set_cycle_hook(&mut self, hook: CycleHook) {
        self.cycle_hook = Some(hook);
    }

    /// Power-on: every register except PC takes a random value, PC=0, IFF=0.
    pub fn power_on(&mut self) {
        let mut rng = rand::thread_rng();
        let r = &mut self.regs;
        r.a = rng.gen();
        r.f = rng.gen();
        r.b = rng.gen();
        r.c = rng.gen();
        r.d = rng.gen();
        r.e = rng.gen();
        r.h = rng.gen();
        r.l = rng.gen();
        r.a_alt = rng.gen();
        r.f_alt = rng.gen();
        r.b_alt = rng.gen();
        r.c_alt = rng.gen();
        r.d_alt = rng.gen();
        r.e_alt = rng.gen();
        r.h_alt = rng.gen();
        r.l_alt = rng.gen();
        r.ix = rng.gen();
        r.iy = rng.gen();
        r.sp = rng.gen();
        r.pc = 0;
        r.i = 0;
        r.iff1 = false;
        r.iff2 = false;
        if self.model == CpuModel::I8080 {
            r.f = (r.f | NF) & !(YF | XF);
        }
    }

    /// Reset pulse: clear interrupt state and force PC to 0. The Z80 model
    /// also resets I, R, R7 and the interrupt mode.
    pub fn reset(&mut self) {
        self.state = CpuState::Reset;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.int_protection = false;
        self.halted = false;
        self.error = None;
        self.regs.pc = 0;
        if self.model == CpuModel::Z80 {
            self.regs.i = 0;
            self.regs.r = 0;
            self.regs.r7 = 0;
            self.regs.im = 0;
        }
        // Drain anything devices left pending.
        if self.devices.int_pending() {
            self.devices.take_interrupt();
        }
        self.devices.take_nmi();
        self.state = CpuState::Stopped;
    }

    /// Switch the CPU model, preserving shared registers. Entering the
    /// I8080 forces its fixed flag bits. No-op when the model is unchanged.
    pub fn switch_model(&mut self, new_model: CpuModel) {
        if self.model == new_model {
            return;
        }
        if new_model == CpuModel::I8080 {
            self.regs.f = (self.regs.f | NF) & !(YF | XF);
        }
        self.model = new_model;
        self.state = CpuState::ModelSwitch;
        self.error = Some(CpuError::ModelSwitch);
    }

    /// Record a fatal condition and leave the run loop.
    pub fn stop_with(&mut self, error: CpuError) {
        self.error = Some(error);
        self.state = CpuState::Stopped;
    }

    /// Account T-states for the current instruction.
    pub fn add_t(&mut self, t: u32) {
        self.t_states += u64::from(t);
    }

    fn sample_cycle(&mut self, addr: u16, data: u8) {
        if let Some(hook) = self.cycle_hook.as_mut() {
            hook(self.bus_status, addr, data);
        }
    }

    /// M1 opcode fetch: raises M1 on the bus status and increments R on the
    /// Z80. The only legal way to obtain an opcode byte.
    pub fn fetch_opcode(&mut self) -> u8 {
        self.bus_status = CPU_M1 | CPU_MEMR | CPU_WO;
        if self.model == CpuModel::Z80 {
            self.regs.inc_r();
        }
        let value = self.mem.read(self.regs.pc);
        self.sample_cycle(self.regs.pc, value);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch the trailing opcode byte of a DDCB/FDCB sequence: an M1 cycle
    /// that does not refresh (documented Z80 quirk).
    pub fn fetch_opcode_no_refresh(&mut self) -> u8 {
        self.bus_status = CPU_M1 | CPU_MEMR | CPU_WO;
        let value = self.mem.read(self.regs.pc);
        self.sample_cycle(self.regs.pc, value);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch an immediate or displacement byte at PC.
    pub fn fetch_operand(&mut self) -> u8 {
        self.bus_status = CPU_MEMR | CPU_WO;
        let value = self.mem.read(self.regs.pc);
        self.sample_cycle(self.regs.pc, value);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian immediate word at PC.
    pub fn fetch_operand_word(&mut self) -> u16 {
        let lo = self.fetch_operand();
        let hi = self.fetch_operand();
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Memory read cycle.
    pub fn mem_read(&mut self, addr: u16) -> u8 {
        self.bus_status = CPU_MEMR | CPU_WO;
        let value = self.mem.read(addr);
        self.sample_cycle(addr, value);
        value
    }

    /// Memory write cycle.
    pub fn mem_write(&mut self, addr: u16, value: u8) {
        self.bus_status = CPU_MEMW;
        self.sample_cycle(addr, value);
        self.mem.write(addr, value);
    }

    /// Read a little-endian word.
    pub fn mem_read_word(&mut self, addr: u16) -> u16 {
        let lo = self.mem_read(addr);
        let hi = self.mem_read(addr.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Write a little-endian word.
    pub fn mem_write_word(&mut self, addr: u16, value: u16) {
        self.mem_write(addr, value as u8);
        self.mem_write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Push a word (high byte first, as the hardware does).
    pub fn push_word(&mut self, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(self.regs.sp, value as u8);
    }

    /// Pop a word.
    pub fn pop_word(&mut self) -> u16 {
        let lo = self.mem_read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.mem_read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Input cycle. `busy` marks reads that look like status polls so the
    /// scheduler can detect spin loops.
    pub fn io_input(&mut self, port: u8, busy: bool) -> u8 {
        let value = if busy {
            self.io.input_busy(port)
        } else {
            self.io.input(port)
        };
        let data = match value {
            Some(v) => v,
            None => {
                if self.conf.io_trap {
                    self.stop_with(CpuError::IoTrapIn {
                        addr: self.regs.pc,
                        port,
                    });
                }
                IO_DATA_UNUSED
            }
        };
        self.bus_status = CPU_WO | CPU_INP;
        self.sample_cycle(u16::from(port), data);
        debug!("input {data:02x} from port {port:02x}");
        data
    }

    /// Output cycle.
    pub fn io_output(&mut self, port: u8, value: u8) {
        debug!("output {value:02x} to port {port:02x}");
        if !self.io.output(port, value) && self.conf.io_trap {
            self.stop_with(CpuError::IoTrapOut {
                addr: self.regs.pc,
                port,
            });
        }
        self.bus_status = CPU_OUT;
        self.sample_cycle(u16::from(port), value);
    }

    /// Run the DMA hand-off loop while a peripheral holds the bus. Returns
    /// once the request clears; T-states reported by the master are added
    /// to the global counter.
    pub fn service_bus_request(&mut self) {
        let devices = Arc::clone(&self.devices);
        while devices.bus_request_pending() {
            let t = devices.run_dma_cycle(self.bus_status, &mut self.mem);
            self.t_states += t;
        }
    }

    /// Raise the HALT acknowledge on the bus status.
    pub fn set_halt_status(&mut self) {
        self.bus_status = CPU_WO | CPU_HLTA | CPU_MEMR;
        self.halted = true;
    }

    /// Raise the interrupt acknowledge on the bus status (M1 + INTA).
    pub fn set_inta_status(&mut self) {
        self.bus_status = CPU_INTA | CPU_WO | CPU_M1;
        self.halted = false;
    }

    /// Honor an external stop request at an instruction boundary.
    pub fn poll_external_stop(&mut self) {
        if self.devices.take_stop() {
            self.state = CpuState::Stopped;
        }
    }
}
