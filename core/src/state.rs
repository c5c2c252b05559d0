//! CPU model, execution state machine and error kinds.

use thiserror::Error;

/// Which processor the executor emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuModel {
    #[default]
    Z80,
    I8080,
}

/// State of the CPU emulation, driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    #[default]
    Stopped,
    ContinRun,
    SingleStep,
    /// The model changed mid-run; the scheduler re-selects the executor.
    ModelSwitch,
    /// A reset pulse is being processed.
    Reset,
}

/// Bus mode requested by a DMA master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl BusMode {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::ReadWrite => 3,
        }
    }
}

/// Why the executor stopped.
///
/// Recorded in the context rather than returned; the scheduler inspects it
/// after the step. Only `ModelSwitch` is recoverable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("INT disabled and HALT Op-Code reached at {addr:#06x}")]
    OpHalt { addr: u16 },
    #[error("Op-code trap at {addr:#06x} {op:#04x}")]
    OpTrap1 { addr: u16, op: u8 },
    #[error("Op-code trap at {addr:#06x} {prefix:#04x} {op:#04x}")]
    OpTrap2 { addr: u16, prefix: u8, op: u8 },
    #[error("Op-code trap at {addr:#06x} {b0:#04x} {b1:#04x} {b2:#04x} {b3:#04x}")]
    OpTrap4 {
        addr: u16,
        b0: u8,
        b1: u8,
        b2: u8,
        b3: u8,
    },
    #[error("I/O input Trap at {addr:#06x}, port {port:#04x}")]
    IoTrapIn { addr: u16, port: u8 },
    #[error("I/O output Trap at {addr:#06x}, port {port:#04x}")]
    IoTrapOut { addr: u16, port: u8 },
    #[error("System halted")]
    IoHalt,
    #[error("Fatal I/O Error at {addr:#06x}")]
    IoError { addr: u16 },
    #[error("User Interrupt at {addr:#06x}")]
    UserInt { addr: u16 },
    #[error("Unsupported bus data during INT: {data:#04x}")]
    IntError { data: i16 },
    #[error("System powered off")]
    PowerOff,
    /// Internal pseudo-error: the scheduler clears it and re-dispatches.
    #[error("CPU model switched")]
    ModelSwitch,
}

impl CpuError {
    /// Stable numeric encoding, visible in logs only.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::OpHalt { .. } => 1,
            Self::OpTrap1 { .. } => 2,
            Self::OpTrap2 { .. } => 3,
            Self::OpTrap4 { .. } => 4,
            Self::IoTrapIn { .. } => 5,
            Self::IoTrapOut { .. } => 6,
            Self::IoHalt => 7,
            Self::IoError { .. } => 8,
            Self::UserInt { .. } => 9,
            Self::IntError { .. } => 10,
            Self::PowerOff => 11,
            Self::ModelSwitch => 12,
        }
    }

    /// Whether the scheduler may continue running after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ModelSwitch)
    }
}
