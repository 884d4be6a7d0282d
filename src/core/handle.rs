//! # Outside access to a running scheduler.
//!
//! Everything that reaches the scheduler from outside its loop goes through
//! one unbounded channel, so CALL/DELAY completions, UI dispatches and
//! cancellation requests share a single arrival order.
//!
//! ```text
//! UI ──dispatch──┐
//! service task ──┼──► mpsc<Inbound> ──► Scheduler::turn()
//! timer task ────┤
//! handle.cancel ─┘
//! ```

use tokio::sync::mpsc;

use crate::core::interpreter::{EffectId, Outcome};
use crate::effects::{Action, Snapshot};
use crate::error::RuntimeError;
use crate::sagas::TaskId;
use crate::store::Store;

/// Message delivered to the scheduler loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// An asynchronous effect (CALL, DELAY) finished.
    Resolved { effect: EffectId, outcome: Outcome },
    /// An action dispatched from outside.
    Dispatch(Action),
    /// Cancel a task and its descendants.
    Cancel(TaskId),
    /// Stop the supervisor.
    Shutdown,
}

/// Cloneable handle to a [`Scheduler`](crate::Scheduler).
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use sagavisor::{Action, Catalog, Config, Scheduler, Services, Store};
///
/// let sched = Scheduler::new(
///     Config::default(),
///     Store::new(json!({})),
///     Catalog::new(),
///     Services::new(),
/// );
/// let handle = sched.handle();
/// handle
///     .dispatch(Action::new("LOGIN_SUBMIT").with_payload(json!({"user": "a"})))
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Inbound>,
    store: Store,
}

impl SchedulerHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>, store: Store) -> Self {
        Self { tx, store }
    }

    /// Dispatches an action into the store bridge.
    pub fn dispatch(&self, action: Action) -> Result<(), RuntimeError> {
        self.send(Inbound::Dispatch(action))
    }

    /// Cancels a task and everything it forked.
    pub fn cancel(&self, task: TaskId) -> Result<(), RuntimeError> {
        self.send(Inbound::Cancel(task))
    }

    /// Asks the supervisor to cancel every task and stop.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(Inbound::Shutdown)
    }

    /// Latest committed state.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// The store behind the scheduler.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn send(&self, msg: Inbound) -> Result<(), RuntimeError> {
        self.tx.send(msg).map_err(|_| RuntimeError::SchedulerClosed)
    }
}
