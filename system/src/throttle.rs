//! Wall-clock pacing toward a target CPU frequency.

use std::thread;
use std::time::{Duration, Instant};

/// Compares executed T-states against wall time in ~10 ms slices and sleeps
/// off any surplus, converging on the configured frequency. Without a
/// target the throttle is inert (unlimited speed).
pub struct Throttle {
    freq_hz: Option<f64>,
    slice_t: u64,
    base_t: u64,
    next_check: u64,
    started: Instant,
}

impl Throttle {
    /// `mhz = None` runs unthrottled.
    #[must_use]
    pub fn new(mhz: Option<f32>) -> Self {
        let freq_hz = mhz.map(|f| f64::from(f) * 1_000_000.0);
        // One pacing decision per 10 ms of emulated time.
        let slice_t = freq_hz.map_or(u64::MAX, |f| (f / 100.0) as u64);
        Self {
            freq_hz,
            slice_t: slice_t.max(1),
            base_t: 0,
            next_check: slice_t,
            started: Instant::now(),
        }
    }

    /// Restart pacing from the given T-state count.
    pub fn reset(&mut self, t_now: u64) {
        self.base_t = t_now;
        self.next_check = t_now.saturating_add(self.slice_t);
        self.started = Instant::now();
    }

    /// Called at each instruction boundary with the global T-state counter;
    /// sleeps when emulation is ahead of the wall clock.
    pub fn pace(&mut self, t_now: u64) {
        let Some(freq_hz) = self.freq_hz else {
            return;
        };
        if t_now < self.next_check {
            return;
        }
        self.next_check = t_now.saturating_add(self.slice_t);

        let emulated = Duration::from_secs_f64((t_now - self.base_t) as f64 / freq_hz);
        let elapsed = self.started.elapsed();
        if emulated > elapsed {
            thread::sleep(emulated - elapsed);
        }
    }
}
