//! # Runtime events emitted by the scheduler and the root supervisor.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Task lifecycle**: started, suspended, completed, failed, cancelled
//! - **Store**: action delivered
//! - **Scheduling**: stale resumption dropped, restart scheduled/exhausted
//! - **Runtime**: shutdown, subscriber overflow/panic
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when subscribers
//! process events at different speeds.
//!
//! ## Example
//! ```rust
//! use sagavisor::{EffectKind, Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskSuspended)
//!     .with_name("login")
//!     .with_effect(EffectKind::Take);
//!
//! assert_eq!(ev.kind, EventKind::TaskSuspended);
//! assert_eq!(ev.name.as_deref(), Some("login"));
//! assert_eq!(ev.effect, Some(EffectKind::Take));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::effects::EffectKind;
use crate::sagas::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// A task took its first step.
    ///
    /// Sets: `task`, `name`, `parent` (attached tasks only).
    TaskStarted,

    /// A task yielded an effect and is waiting for it.
    ///
    /// Sets: `task`, `name`, `effect`.
    TaskSuspended,

    /// A task terminated normally.
    ///
    /// Sets: `task`, `name`.
    TaskCompleted,

    /// A task terminated with an unhandled error.
    ///
    /// Sets: `task`, `name`, `reason`.
    TaskFailed,

    /// A task was cancelled.
    ///
    /// Sets: `task`, `name`.
    TaskCancelled,

    // === Store ===
    /// An action was committed to the store and offered to TAKE watchers.
    ///
    /// Sets: `action` (type), `woken` (number of TAKE watchers resumed).
    ActionDispatched,

    // === Scheduling ===
    /// A resumption event no longer matched a live pending effect.
    ///
    /// Sets: `task` (if known), `reason`.
    ResumptionDropped,

    /// The root supervisor will restart a top-level task.
    ///
    /// Sets: `name`, `attempt`, `delay_ms`, `reason` (failure, if any).
    RestartScheduled,

    /// A top-level task failed and its restart budget is spent.
    ///
    /// Sets: `name`, `attempt`.
    RestartExhausted,

    // === Runtime ===
    /// Shutdown requested (handle or OS signal).
    ShutdownRequested,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `name` (subscriber), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `name` (subscriber), `reason`.
    SubscriberPanicked,
}

impl EventKind {
    /// Short kebab-case tag used by log output.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskStarted => "started",
            EventKind::TaskSuspended => "suspended",
            EventKind::TaskCompleted => "completed",
            EventKind::TaskFailed => "failed",
            EventKind::TaskCancelled => "cancelled",
            EventKind::ActionDispatched => "dispatched",
            EventKind::ResumptionDropped => "resumption-dropped",
            EventKind::RestartScheduled => "restart-scheduled",
            EventKind::RestartExhausted => "restart-exhausted",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::SubscriberPanicked => "subscriber-panicked",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Task id, if applicable.
    pub task: Option<TaskId>,
    /// Parent task id, for attached tasks.
    pub parent: Option<TaskId>,
    /// Saga (or subscriber) name, if applicable.
    pub name: Option<Arc<str>>,
    /// Kind of the effect a task suspended on.
    pub effect: Option<EffectKind>,
    /// Type of the dispatched action.
    pub action: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Restart delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Restart attempt.
    pub attempt: Option<u32>,
    /// TAKE watchers woken by a dispatched action.
    pub woken: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            parent: None,
            name: None,
            effect: None,
            action: None,
            reason: None,
            delay_ms: None,
            attempt: None,
            woken: None,
        }
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    /// Attaches a parent task id.
    #[inline]
    pub fn with_parent(mut self, parent: Option<TaskId>) -> Self {
        self.parent = parent;
        self
    }

    /// Attaches a saga or subscriber name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches an effect kind.
    #[inline]
    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Attaches an action type.
    #[inline]
    pub fn with_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a restart attempt.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the number of TAKE watchers an action woke.
    #[inline]
    pub fn with_woken(mut self, n: usize) -> Self {
        self.woken = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// True for lifecycle events that end a task.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskCompleted | EventKind::TaskFailed | EventKind::TaskCancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::TaskStarted);
        let b = Event::new(EventKind::TaskStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
        assert!(!ev.is_terminal());
        assert!(Event::new(EventKind::TaskCancelled).is_terminal());
    }
}
