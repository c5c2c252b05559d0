//! Bus-status byte and the shared device fabric.
//!
//! Devices and UI threads publish interrupt and bus-request signals into
//! `DeviceBus` from their own threads; the executor polls it at the top of
//! each instruction step. Required ordering (see the concurrency model):
//! `int_data` must be visible before `int_pending`, and `int_pending` is
//! cleared only after the executor has consumed `int_data`.

use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::memory::Memory;
use crate::state::{BusMode, CpuModel};

/// Memory read in progress (status LED, not an enable).
pub const CPU_MEMR: u8 = 0x80;
/// Input cycle.
pub const CPU_INP: u8 = 0x40;
/// Opcode fetch (first machine cycle).
pub const CPU_M1: u8 = 0x20;
/// Output cycle.
pub const CPU_OUT: u8 = 0x10;
/// HALT acknowledge.
pub const CPU_HLTA: u8 = 0x08;
/// Memory write in progress.
pub const CPU_MEMW: u8 = 0x04;
/// Write-out inverted: set on every cycle that is not a write.
pub const CPU_WO: u8 = 0x02;
/// Interrupt acknowledge.
pub const CPU_INTA: u8 = 0x01;

/// DMA master callback: receives the acknowledge status byte and the memory
/// bus, returns the T-states consumed. Must eventually clear the request
/// with `end_bus_request`.
pub type DmaMaster = Box<dyn FnMut(u8, &mut Memory) -> u64 + Send>;

/// Signal value meaning "no interrupt data on the bus".
pub const INT_DATA_NONE: i16 = -1;

/// Shared fabric handle for interrupt sources, DMA masters and front panels.
#[derive(Default)]
pub struct DeviceBus {
    nmi_pending: AtomicBool,
    int_pending: AtomicBool,
    int_data: AtomicI16,
    bus_request: AtomicBool,
    bus_mode: AtomicU8,
    dma_master: Mutex<Option<DmaMaster>>,
    /// Front-panel address/programmed-input switches.
    address_switch: AtomicU16,
    /// External stop request; honored at the next instruction boundary.
    stop: AtomicBool,
    /// Requested CPU model (0 = none); honored at the next boundary.
    model_request: AtomicU8,
}

impl DeviceBus {
    #[must_use]
    pub fn new() -> Self {
        let bus = Self::default();
        bus.int_data.store(INT_DATA_NONE, Ordering::Relaxed);
        bus
    }

    /// Request a maskable interrupt with `data` on the data bus.
    pub fn request_interrupt(&self, data: u8) {
        self.int_data.store(i16::from(data), Ordering::Release);
        self.int_pending.store(true, Ordering::Release);
    }

    /// Request a maskable interrupt without valid bus data (delivery will
    /// fail with an interrupt error, as on real hardware with a floating
    /// bus the executor refuses to guess).
    pub fn request_interrupt_no_data(&self) {
        self.int_data.store(INT_DATA_NONE, Ordering::Release);
        self.int_pending.store(true, Ordering::Release);
    }

    /// Whether a maskable interrupt is pending.
    #[must_use]
    pub fn int_pending(&self) -> bool {
        self.int_pending.load(Ordering::Acquire)
    }

    /// Consume the pending interrupt: reads the bus data, then clears the
    /// pending flag. Returns `INT_DATA_NONE` if the device never supplied a
    /// byte. Call only after `int_pending` returned true.
    pub fn take_interrupt(&self) -> i16 {
        let data = self.int_data.load(Ordering::Acquire);
        self.int_data.store(INT_DATA_NONE, Ordering::Release);
        self.int_pending.store(false, Ordering::Release);
        data
    }

    /// Request a non-maskable interrupt.
    pub fn request_nmi(&self) {
        self.nmi_pending.store(true, Ordering::Release);
    }

    /// Consume a pending NMI, if any.
    pub fn take_nmi(&self) -> bool {
        self.nmi_pending.swap(false, Ordering::AcqRel)
    }

    /// Start a bus-request cycle: the DMA master takes the bus until it
    /// calls `end_bus_request`.
    pub fn start_bus_request(&self, mode: BusMode, master: DmaMaster) {
        *self.dma_master.lock().unwrap() = Some(master);
        self.bus_mode.store(mode.code(), Ordering::Release);
        self.bus_request.store(true, Ordering::Release);
    }

    /// End the bus-request cycle and release the bus back to the CPU.
    pub fn end_bus_request(&self) {
        self.bus_request.store(false, Ordering::Release);
        self.bus_mode.store(BusMode::None.code(), Ordering::Release);
        *self.dma_master.lock().unwrap() = None;
    }

    /// Whether a peripheral is requesting the bus.
    #[must_use]
    pub fn bus_request_pending(&self) -> bool {
        self.bus_request.load(Ordering::Acquire)
    }

    /// Current bus mode.
    #[must_use]
    pub fn bus_mode(&self) -> BusMode {
        BusMode::from_code(self.bus_mode.load(Ordering::Acquire))
    }

    /// Run one DMA hand-off: invoke the master with the acknowledge byte and
    /// the memory bus, returning the T-states it consumed.
    ///
    /// The callback is taken out of its slot for the duration of the call so
    /// the master may itself call `end_bus_request` without deadlocking. A
    /// request with no registered master is dropped.
    pub fn run_dma_cycle(&self, bus_ack: u8, mem: &mut Memory) -> u64 {
        let master = self.dma_master.lock().unwrap().take();
        let Some(mut master) = master else {
            self.end_bus_request();
            return 0;
        };
        let t = master(bus_ack, mem);
        let mut slot = self.dma_master.lock().unwrap();
        if self.bus_request.load(Ordering::Acquire) && slot.is_none() {
            *slot = Some(master);
        }
        t
    }

    /// Set the front-panel address switches.
    pub fn set_address_switch(&self, value: u16) {
        self.address_switch.store(value, Ordering::Relaxed);
    }

    /// Read the front-panel address switches.
    #[must_use]
    pub fn address_switch(&self) -> u16 {
        self.address_switch.load(Ordering::Relaxed)
    }

    /// Ask the run loop to stop at the next instruction boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Consume a pending stop request.
    pub fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }

    /// Ask the scheduler to switch the CPU model at the next boundary.
    pub fn request_model(&self, model: CpuModel) {
        let code = match model {
            CpuModel::Z80 => 1,
            CpuModel::I8080 => 2,
        };
        self.model_request.store(code, Ordering::Release);
    }

    /// Consume a pending model-switch request.
    pub fn take_model_request(&self) -> Option<CpuModel> {
        match self.model_request.swap(0, Ordering::AcqRel) {
            1 => Some(CpuModel::Z80),
            2 => Some(CpuModel::I8080),
            _ => None,
        }
    }
}
