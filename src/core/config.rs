//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the scheduler and the root
//! supervisor.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Roster defaults**: `SagaSpec::with_defaults(saga, &config)`
//!
//! ## Sentinel values
//! - `max_restarts = 0` → unlimited (treated as `None` by `SagaSpec::with_defaults`)
//! - `cleanup_steps = 0` → cancelled tasks are not stepped at all
//! - `report_limit = 0` → every task report is kept
//! - `dispatch_log_limit = 0` → the dispatch log is never trimmed

use std::time::Duration;

use crate::policies::{BackoffPolicy, RestartPolicy};

/// Global configuration for the sagavisor runtime.
///
/// Defines:
/// - **Shutdown behavior**: grace period for subscribers to flush
/// - **Event system**: bus capacity for event delivery
/// - **Cancellation**: how far a cancelled task may run its cleanup
/// - **Failure reporting**: the action dispatched when a detached task fails
/// - **Roster defaults**: restart policy, backoff strategy, restart cap
/// - **Retention**: how many task reports and logged actions are kept
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait, after the last task is gone, for subscribers to
    /// drain their queues.
    ///
    /// If exceeded, `Supervisor::run` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Maximum number of cleanup steps granted to a cancelled task.
    ///
    /// Each step is one `SagaBody::step` call after cancellation; `PUT`
    /// effects yielded during cleanup are dispatched.
    pub cleanup_steps: usize,

    /// Type of the action dispatched when a detached task fails.
    ///
    /// Payload: `{ "task": <id>, "name": <saga>, "error": <message> }`.
    pub failure_action: String,

    /// Default restart policy for top-level tasks.
    ///
    /// Used by `SagaSpec::with_defaults()`. Can be overridden per spec.
    pub restart: RestartPolicy,

    /// Default backoff policy between restarts.
    ///
    /// Used by `SagaSpec::with_defaults()`. Can be overridden per spec.
    pub backoff: BackoffPolicy,

    /// Default restart cap for top-level tasks.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = at most `n` restarts after failures
    pub max_restarts: u32,

    /// Number of final task reports kept by the scheduler.
    ///
    /// Oldest reports are evicted first. JOIN on an evicted task fails as an
    /// unknown task, and `Scheduler::lifecycle` returns `None` for it.
    /// - `0` = keep all
    pub report_limit: usize,

    /// Number of delivered actions kept in the store's dispatch log.
    ///
    /// The scheduler applies it to its store; oldest entries are dropped first.
    /// - `0` = keep all
    pub dispatch_log_limit: usize,
}

impl Config {
    /// Returns the default restart cap as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` restarts
    #[inline]
    pub fn restart_limit(&self) -> Option<u32> {
        if self.max_restarts == 0 {
            None
        } else {
            Some(self.max_restarts)
        }
    }

    /// Returns the report retention as an `Option` (`None` → unbounded).
    #[inline]
    pub fn report_retention(&self) -> Option<usize> {
        (self.report_limit > 0).then_some(self.report_limit)
    }

    /// Returns the dispatch log retention as an `Option` (`None` → unbounded).
    #[inline]
    pub fn dispatch_log_retention(&self) -> Option<usize> {
        (self.dispatch_log_limit > 0).then_some(self.dispatch_log_limit)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `cleanup_steps = 16`
    /// - `failure_action = "SAGA_FAILED"`
    /// - `restart = RestartPolicy::Never` (a crashed root task stays down)
    /// - `backoff = BackoffPolicy::default()` (exponential backoff)
    /// - `max_restarts = 0` (unlimited)
    /// - `report_limit = 4096`
    /// - `dispatch_log_limit = 4096`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            cleanup_steps: 16,
            failure_action: "SAGA_FAILED".to_string(),
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            max_restarts: 0,
            report_limit: 4096,
            dispatch_log_limit: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_options() {
        let mut cfg = Config::default();
        assert_eq!(cfg.restart_limit(), None);
        cfg.max_restarts = 3;
        assert_eq!(cfg.restart_limit(), Some(3));

        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);

        assert_eq!(cfg.report_retention(), Some(4096));
        cfg.report_limit = 0;
        assert_eq!(cfg.report_retention(), None);
        cfg.dispatch_log_limit = 8;
        assert_eq!(cfg.dispatch_log_retention(), Some(8));
    }
}
