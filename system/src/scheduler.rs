//! The outer run/step loops driving the per-model executors.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use emu_core::{CpuContext, CpuError, CpuModel, CpuState, DeviceBus};
use log::{error, info, warn};

use crate::throttle::Throttle;

/// Host-side knobs for the driver.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Target CPU frequency in MHz; `None` runs unlimited.
    pub clock_mhz: Option<f32>,
    /// Busy-loop poll count after which the host thread yields.
    pub busy_loop_yield: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clock_mhz: None,
            busy_loop_yield: 10,
        }
    }
}

/// Owns the CPU context and drives one of the two executors according to
/// the selected model.
pub struct Scheduler {
    ctx: CpuContext,
    throttle: Throttle,
    busy_loop_yield: u32,
    cpu_time: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(ctx: CpuContext) -> Self {
        Self::with_config(ctx, SchedulerConfig::default())
    }

    #[must_use]
    pub fn with_config(ctx: CpuContext, conf: SchedulerConfig) -> Self {
        Self {
            ctx,
            throttle: Throttle::new(conf.clock_mhz),
            busy_loop_yield: conf.busy_loop_yield,
            cpu_time: Duration::ZERO,
        }
    }

    /// The execution context (registers, buses, state).
    #[must_use]
    pub fn context(&self) -> &CpuContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut CpuContext {
        &mut self.ctx
    }

    /// Shared fabric handle for device and UI threads.
    #[must_use]
    pub fn devices(&self) -> Arc<DeviceBus> {
        Arc::clone(&self.ctx.devices)
    }

    fn dispatch_one(&mut self) {
        match self.ctx.model {
            CpuModel::Z80 => zilog_z80::step(&mut self.ctx),
            CpuModel::I8080 => intel_8080::step(&mut self.ctx),
        }
    }

    /// Honor boundary-level external requests (stop, model switch).
    fn poll_external(&mut self) {
        self.ctx.poll_external_stop();
        if let Some(model) = self.ctx.devices.take_model_request() {
            self.ctx.switch_model(model);
        }
    }

    /// Run until the CPU stops. Each iteration executes one instruction via
    /// the current model's executor; a model switch re-selects the executor
    /// and continues.
    pub fn run(&mut self) {
        self.ctx.state = CpuState::ContinRun;
        self.ctx.error = None;
        self.throttle.reset(self.ctx.t_states);
        let started = Instant::now();

        loop {
            self.dispatch_one();
            self.poll_external();

            if self.ctx.io.busy_loop_count() >= self.busy_loop_yield {
                // A tight status poll should not spin the host at 100%.
                self.ctx.io.reset_busy_loop();
                thread::sleep(Duration::from_millis(1));
            }
            self.throttle.pace(self.ctx.t_states);

            if self.ctx.error == Some(CpuError::ModelSwitch) {
                self.ctx.error = None;
                self.ctx.state = CpuState::ContinRun;
                continue;
            }
            if self.ctx.state != CpuState::ContinRun {
                break;
            }
        }

        self.cpu_time += started.elapsed();
        self.report_error();
    }

    /// Execute exactly one instruction, then stop.
    pub fn step(&mut self) {
        self.ctx.state = CpuState::SingleStep;
        self.ctx.error = None;
        let started = Instant::now();

        self.dispatch_one();
        self.poll_external();
        if self.ctx.error == Some(CpuError::ModelSwitch) {
            self.ctx.error = None;
        }

        self.cpu_time += started.elapsed();
        self.ctx.state = CpuState::Stopped;
        self.report_error();
    }

    /// Pull the reset line: clears interrupt state and restarts at 0.
    pub fn reset(&mut self) {
        self.ctx.reset();
    }

    /// Switch the CPU model; shared registers persist.
    pub fn switch_model(&mut self, model: CpuModel) {
        self.ctx.switch_model(model);
        if self.ctx.error == Some(CpuError::ModelSwitch) {
            // Outside the run loop the pseudo-error has no consumer.
            self.ctx.error = None;
            self.ctx.state = CpuState::Stopped;
        }
    }

    /// Permanently power the session off.
    pub fn power_off(&mut self) {
        self.ctx.stop_with(CpuError::PowerOff);
    }

    /// Log why the CPU stopped, in the severity the condition deserves.
    pub fn report_error(&self) {
        let Some(err) = self.ctx.error else {
            return;
        };
        match err {
            CpuError::ModelSwitch => {}
            CpuError::OpHalt { .. } | CpuError::IoHalt | CpuError::UserInt { .. } | CpuError::PowerOff => {
                info!("{err}");
            }
            CpuError::IntError { .. } => warn!("{err}"),
            _ => error!("{err} (error code {})", err.code()),
        }
    }

    /// Log executed T-states, wall time and the effective clock.
    pub fn report_stats(&self) {
        if self.cpu_time.is_zero() {
            return;
        }
        let t = self.ctx.t_states;
        let us = self.cpu_time.as_micros().max(1) as u64;
        info!(
            "CPU ran {} ms and executed {t} t-states ({:.2} MHz)",
            us / 1000,
            t as f64 / us as f64
        );
    }
}
