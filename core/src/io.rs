//! 256-slot I/O port dispatch with busy-loop detection.

/// Value seen on an input port with no handler attached.
pub const IO_DATA_UNUSED: u8 = 0xFF;

/// Input port handler.
pub type InHandler = Box<dyn FnMut() -> u8 + Send>;

/// Output port handler.
pub type OutHandler = Box<dyn FnMut(u8) + Send>;

/// The I/O port bus: 256 input and 256 output slots.
///
/// Unhandled input reads 0xFF, unhandled output is discarded; whether an
/// unhandled access is additionally fatal is the context's trap policy, so
/// the dispatch here only reports whether a handler existed.
pub struct IoBus {
    in_handlers: [Option<InHandler>; 256],
    out_handlers: [Option<OutHandler>; 256],
    busy_loop_cnt: u32,
    last_in_port: Option<u8>,
}

impl Default for IoBus {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBus {
    /// Create a bus with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_handlers: std::array::from_fn(|_| None),
            out_handlers: std::array::from_fn(|_| None),
            busy_loop_cnt: 0,
            last_in_port: None,
        }
    }

    /// Attach an input handler to a port.
    pub fn set_in_handler(&mut self, port: u8, handler: InHandler) {
        self.in_handlers[port as usize] = Some(handler);
    }

    /// Attach an output handler to a port.
    pub fn set_out_handler(&mut self, port: u8, handler: OutHandler) {
        self.out_handlers[port as usize] = Some(handler);
    }

    /// Read a port. Returns `None` when no handler is attached (the data
    /// seen by the CPU is then `IO_DATA_UNUSED`).
    pub fn input(&mut self, port: u8) -> Option<u8> {
        if self.last_in_port != Some(port) {
            self.busy_loop_cnt = 0;
        }
        self.last_in_port = Some(port);
        self.in_handlers[port as usize].as_mut().map(|h| h())
    }

    /// Same as `input`, additionally ticking the busy-loop counter: repeated
    /// reads of the same port with no intervening output look like a status
    /// poll and let the scheduler yield the host.
    pub fn input_busy(&mut self, port: u8) -> Option<u8> {
        let value = self.input(port);
        self.busy_loop_cnt = self.busy_loop_cnt.saturating_add(1);
        value
    }

    /// Write a port. Returns whether a handler consumed the byte. Any output
    /// breaks a busy loop.
    pub fn output(&mut self, port: u8, value: u8) -> bool {
        self.busy_loop_cnt = 0;
        self.last_in_port = None;
        match self.out_handlers[port as usize].as_mut() {
            Some(h) => {
                h(value);
                true
            }
            None => false,
        }
    }

    /// Current busy-loop count.
    #[must_use]
    pub fn busy_loop_count(&self) -> u32 {
        self.busy_loop_cnt
    }

    /// Reset the busy-loop count (after the scheduler has yielded).
    pub fn reset_busy_loop(&mut self) {
        self.busy_loop_cnt = 0;
    }
}
