//! Runtime core: scheduling, effect interpretation and supervision.
//!
//! The public API from this module is [`Scheduler`] (drive tasks directly),
//! [`Supervisor`] (run a root roster with restart policies) and their
//! supporting types.
//!
//! Internal modules:
//! - [`scheduler`]: task registry, ready queue, advance/finish/cancel;
//! - [`interpreter`]: effect slots, RACE/ALL composition, stale-event detection;
//! - [`supervisor`]: root roster, restart policy, shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`registry`]: live task entries and final reports.

mod builder;
mod config;
mod handle;
mod interpreter;
mod registry;
mod scheduler;
mod shutdown;
mod supervisor;

#[cfg(test)]
mod tests;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use handle::SchedulerHandle;
pub use registry::{Lifecycle, TaskReport};
pub use scheduler::Scheduler;
pub use supervisor::{RunReport, Supervisor};
