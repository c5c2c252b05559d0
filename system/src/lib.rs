//! Scheduler/driver around the CPU executors: the outer run and step loops,
//! speed throttling, model switching and error reporting.

mod scheduler;
mod throttle;

pub use scheduler::{Scheduler, SchedulerConfig};
pub use throttle::Throttle;
