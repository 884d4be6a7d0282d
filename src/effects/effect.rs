//! # Effect descriptors.
//!
//! [`Effect`] is inert data: a saga yields one and the scheduler interprets it.
//! Descriptors carry names instead of closures (`Call { service }`,
//! `Fork { saga }`), so a test can compare what a saga yields with `==`.
//!
//! ## Vocabulary
//! ```text
//! Call   { service, args }      run a named async service        → Output::Value
//! Put    (action)               enqueue an action on the store    → Output::Unit
//! Take   (pattern)              wait for the next matching action → Output::Action
//! Fork   { saga, args, detached } start a child task              → Output::Task
//! Delay  (duration)             wait at least `duration`          → Output::Unit
//! Race   ([effects])            first to settle wins              → Output::Race
//! All    ([effects])            wait for every effect             → Output::All
//! Cancel (task)                 cascading cancellation            → Output::Unit
//! Select                        read the current store snapshot   → Output::Snapshot
//! Join   (task)                 wait for a task to finish         → Output::Value
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::effects::action::{Action, Pattern};
use crate::sagas::TaskId;

/// A requested side effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    /// Invoke a registered [`Service`](crate::Service) by name.
    Call {
        /// Registered service name.
        service: String,
        /// Arguments passed to the service.
        args: Vec<Value>,
    },
    /// Dispatch an action through the store bridge.
    Put(Action),
    /// Wait for the next action matching the pattern.
    Take(Pattern),
    /// Start a new task from a catalog saga.
    Fork {
        /// Catalog name of the saga.
        saga: String,
        /// Arguments passed to the saga.
        args: Vec<Value>,
        /// Detached tasks have no parent; their failures go to the supervisor.
        detached: bool,
    },
    /// Wait at least this long.
    Delay(Duration),
    /// Resolve with the first entry that settles; cancel the others.
    Race(Vec<Effect>),
    /// Resolve once every entry resolved; fail on the first failure.
    All(Vec<Effect>),
    /// Cancel a task and all of its descendants.
    Cancel(TaskId),
    /// Read the latest committed store snapshot.
    Select,
    /// Wait until a task terminates.
    Join(TaskId),
}

impl Effect {
    /// `Call` with the given service name and arguments.
    pub fn call(service: impl Into<String>, args: Vec<Value>) -> Self {
        Effect::Call {
            service: service.into(),
            args,
        }
    }

    /// `Put` of the given action.
    pub fn put(action: Action) -> Self {
        Effect::Put(action)
    }

    /// `Take` of the given pattern (`"*"` matches everything).
    pub fn take(pattern: impl Into<Pattern>) -> Self {
        Effect::Take(pattern.into())
    }

    /// Attached `Fork`: the child belongs to the yielding task.
    pub fn fork(saga: impl Into<String>, args: Vec<Value>) -> Self {
        Effect::Fork {
            saga: saga.into(),
            args,
            detached: false,
        }
    }

    /// Detached `Fork`: the child has no parent.
    pub fn spawn(saga: impl Into<String>, args: Vec<Value>) -> Self {
        Effect::Fork {
            saga: saga.into(),
            args,
            detached: true,
        }
    }

    /// `Delay` in milliseconds.
    pub fn delay_ms(ms: u64) -> Self {
        Effect::Delay(Duration::from_millis(ms))
    }

    /// `Race` over the given effects.
    pub fn race(effects: impl IntoIterator<Item = Effect>) -> Self {
        Effect::Race(effects.into_iter().collect())
    }

    /// `All` over the given effects.
    pub fn all(effects: impl IntoIterator<Item = Effect>) -> Self {
        Effect::All(effects.into_iter().collect())
    }

    /// `Cancel` of a task.
    pub fn cancel(task: TaskId) -> Self {
        Effect::Cancel(task)
    }

    /// `Select` of the current snapshot.
    pub fn select() -> Self {
        Effect::Select
    }

    /// `Join` of a task.
    pub fn join(task: TaskId) -> Self {
        Effect::Join(task)
    }

    /// Returns the discriminant of this descriptor.
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Call { .. } => EffectKind::Call,
            Effect::Put(_) => EffectKind::Put,
            Effect::Take(_) => EffectKind::Take,
            Effect::Fork { .. } => EffectKind::Fork,
            Effect::Delay(_) => EffectKind::Delay,
            Effect::Race(_) => EffectKind::Race,
            Effect::All(_) => EffectKind::All,
            Effect::Cancel(_) => EffectKind::Cancel,
            Effect::Select => EffectKind::Select,
            Effect::Join(_) => EffectKind::Join,
        }
    }
}

/// Discriminant of an [`Effect`], used in events and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Call,
    Put,
    Take,
    Fork,
    Delay,
    Race,
    All,
    Cancel,
    Select,
    Join,
}

impl EffectKind {
    /// Upper-case name, as in the descriptor vocabulary.
    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::Call => "CALL",
            EffectKind::Put => "PUT",
            EffectKind::Take => "TAKE",
            EffectKind::Fork => "FORK",
            EffectKind::Delay => "DELAY",
            EffectKind::Race => "RACE",
            EffectKind::All => "ALL",
            EffectKind::Cancel => "CANCEL",
            EffectKind::Select => "SELECT",
            EffectKind::Join => "JOIN",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
