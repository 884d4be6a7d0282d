//! # Restart policies for top-level tasks.
//!
//! [`RestartPolicy`] decides what the root supervisor does when a top-level
//! task ends.
//!
//! - [`RestartPolicy::Never`] leave it terminated (default).
//! - [`RestartPolicy::OnFailure`] restart after a failure, with backoff.
//! - [`RestartPolicy::Always`] restart after a failure (with backoff) and
//!   after completion (after `interval`).
//!
//! Cancelled tasks are never restarted.
//!
//! ## Choosing the right policy
//! ```text
//! login flow        → Never       (a crash must not loop the login screen)
//! remote sync       → OnFailure   (transient network errors)
//! periodic refresh  → Always { interval: Some(60s) }
//! ```

use std::time::Duration;

/// Policy controlling whether a top-level task is started again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart (default).
    #[default]
    Never,
    /// Restart only after a failure.
    OnFailure,
    /// Restart after failure or completion.
    ///   - `interval`: delay after a successful completion (`None` = immediately).
    Always {
        interval: Option<Duration>,
    },
}

impl RestartPolicy {
    /// True if a failed task should be started again.
    pub fn restarts_failed(&self) -> bool {
        !matches!(self, RestartPolicy::Never)
    }

    /// Delay before restarting a completed task, `None` if it stays terminated.
    pub fn after_completion(&self) -> Option<Duration> {
        match self {
            RestartPolicy::Always { interval } => Some(interval.unwrap_or(Duration::ZERO)),
            _ => None,
        }
    }
}
