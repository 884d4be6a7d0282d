//! # Task registry: live task entries and final reports.
//!
//! The registry is owned by the [`Scheduler`](crate::Scheduler) and mutated
//! only from its loop, so it needs no locking.
//!
//! ```text
//! insert(name, parent, body) ─► live[id]   (Created)
//!                                  │ advance / settle
//!                                  ▼
//!                               live[id]   (Running ⇄ Suspended)
//!                                  │ retire
//!                                  ▼
//!                               reports[id] (Completed | Failed | Cancelled)
//! ```
//!
//! ## Rules
//! - Ids are monotonic, so id order is creation order.
//! - A task is either live or reported, never both.
//! - `children` only lists live attached children.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::interpreter::EffectId;
use crate::error::SagaError;
use crate::sagas::{SagaBody, TaskId};

/// Task lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Created, start queued, not stepped yet.
    Created,
    /// Its body is being stepped.
    Running,
    /// Waiting for its pending effect (or for its children).
    Suspended,
    /// Terminated normally.
    Completed,
    /// Terminated with an unhandled error.
    Failed,
    /// Terminated by cancellation.
    Cancelled,
}

impl Lifecycle {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Lifecycle::Completed | Lifecycle::Failed | Lifecycle::Cancelled
        )
    }

    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Created => "created",
            Lifecycle::Running => "running",
            Lifecycle::Suspended => "suspended",
            Lifecycle::Completed => "completed",
            Lifecycle::Failed => "failed",
            Lifecycle::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final record of a terminated task.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskReport {
    /// Task id.
    pub id: TaskId,
    /// Catalog name of its saga.
    pub name: Arc<str>,
    /// Parent, for attached tasks.
    pub parent: Option<TaskId>,
    /// True for root and detached tasks.
    pub detached: bool,
    /// Terminal lifecycle state.
    pub state: Lifecycle,
    /// Completion value (`Completed` only).
    pub result: Option<Value>,
    /// Failure (`Failed` only).
    pub error: Option<SagaError>,
}

/// How a task ended.
#[derive(Debug)]
pub(crate) enum Terminal {
    Completed(Value),
    Failed(SagaError),
    Cancelled,
}

impl Terminal {
    pub(crate) fn state(&self) -> Lifecycle {
        match self {
            Terminal::Completed(_) => Lifecycle::Completed,
            Terminal::Failed(_) => Lifecycle::Failed,
            Terminal::Cancelled => Lifecycle::Cancelled,
        }
    }
}

pub(crate) struct TaskEntry {
    pub(crate) name: Arc<str>,
    pub(crate) parent: Option<TaskId>,
    pub(crate) children: BTreeSet<TaskId>,
    pub(crate) detached: bool,
    pub(crate) state: Lifecycle,
    pub(crate) body: Box<dyn SagaBody>,
    pub(crate) pending: Option<EffectId>,
    /// Body value kept while attached children are still alive.
    pub(crate) finished: Option<Value>,
    pub(crate) cancelling: bool,
}

#[derive(Default)]
pub(crate) struct Registry {
    live: HashMap<TaskId, TaskEntry>,
    reports: BTreeMap<TaskId, TaskReport>,
    /// Reports kept at most; `None` keeps all.
    report_limit: Option<usize>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn with_report_limit(limit: Option<usize>) -> Self {
        Self {
            report_limit: limit,
            ..Self::default()
        }
    }

    pub(crate) fn insert(
        &mut self,
        name: Arc<str>,
        parent: Option<TaskId>,
        body: Box<dyn SagaBody>,
    ) -> TaskId {
        self.next_id += 1;
        let id = TaskId::new(self.next_id);
        self.live.insert(
            id,
            TaskEntry {
                name,
                parent,
                children: BTreeSet::new(),
                detached: parent.is_none(),
                state: Lifecycle::Created,
                body,
                pending: None,
                finished: None,
                cancelling: false,
            },
        );
        if let Some(parent) = parent.and_then(|p| self.live.get_mut(&p)) {
            parent.children.insert(id);
        }
        id
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskEntry> {
        self.live.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskEntry> {
        self.live.get_mut(&id)
    }

    pub(crate) fn is_live(&self, id: TaskId) -> bool {
        self.live.contains_key(&id)
    }

    /// Moves a live task to the reports; returns the removed entry and its report.
    pub(crate) fn retire(&mut self, id: TaskId, how: &Terminal) -> Option<(TaskEntry, TaskReport)> {
        let entry = self.live.remove(&id)?;
        if let Some(parent) = entry.parent.and_then(|p| self.live.get_mut(&p)) {
            parent.children.remove(&id);
        }
        let report = TaskReport {
            id,
            name: Arc::clone(&entry.name),
            parent: entry.parent,
            detached: entry.detached,
            state: how.state(),
            result: match how {
                Terminal::Completed(v) => Some(v.clone()),
                _ => None,
            },
            error: match how {
                Terminal::Failed(e) => Some(e.clone()),
                _ => None,
            },
        };
        self.reports.insert(id, report.clone());
        if let Some(limit) = self.report_limit {
            // Ids grow with creation order, so the first key is the oldest task.
            while self.reports.len() > limit {
                self.reports.pop_first();
            }
        }
        Some((entry, report))
    }

    pub(crate) fn report(&self, id: TaskId) -> Option<&TaskReport> {
        self.reports.get(&id)
    }

    pub(crate) fn reports(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.values()
    }

    pub(crate) fn lifecycle(&self, id: TaskId) -> Option<Lifecycle> {
        self.live
            .get(&id)
            .map(|e| e.state)
            .or_else(|| self.reports.get(&id).map(|r| r.state))
    }

    /// Live tasks without a parent, in creation order.
    pub(crate) fn roots(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .live
            .iter()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }
}
