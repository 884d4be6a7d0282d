//! Restart policies for the root supervisor.
//!
//! ## Contents
//! - [`RestartPolicy`] whether a top-level task is started again
//! - [`BackoffPolicy`] how long to wait before restart `n`
//! - [`JitterPolicy`]  randomization to avoid synchronized restarts
//!
//! ## Quick wiring
//! ```text
//! SagaSpec { restart, backoff, max_restarts }
//!      └─► Supervisor, when a root task exits:
//!           - Failed    → restart.restarts_failed() && attempt < max_restarts
//!                         → delay = backoff.next(attempt)
//!           - Completed → restart.after_completion()
//!           - Cancelled → never restarted
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
