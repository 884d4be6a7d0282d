//! # Effect interpreter.
//!
//! Maps every [`Effect`] a task yields to an operation, tracked by an
//! [`EffectId`]. Every pending effect owns a slot; resolving it removes the
//! slot, so an event for a missing slot is stale and dropped.
//!
//! ```text
//! Yield(effect) ─► interpret(task, id, parent=None, effect)
//!                     ├─ immediate (PUT, SELECT, FORK, CANCEL, ...) ─► route(Ok/Err)
//!                     ├─ CALL / DELAY ─► tokio task ─► Inbound::Resolved ─► settle(id)
//!                     ├─ TAKE ─► bridge.subscribe(pattern, id) ─► delivery ─► settle(id)
//!                     ├─ JOIN ─► joiners[target] ─► target finishes ─► settle(id)
//!                     └─ RACE / ALL ─► one child slot per entry, parent = (id, index)
//!
//! route(id, outcome):
//!   parent None        ─► ready.push_back(Resumption { task, effect: id, resume })
//!   parent Race(i)     ─► first to settle wins, other entries cancelled
//!   parent All(i)      ─► collect; first error cancels the rest
//! ```

use std::time::Duration;

use serde_json::Value;
use tokio::task::AbortHandle;

use crate::core::handle::Inbound;
use crate::core::scheduler::{Resumption, Scheduler};
use crate::effects::{Effect, EffectKind, Output};
use crate::error::SagaError;
use crate::events::{Event, EventKind};
use crate::sagas::{Resume, TaskId};

/// Identifier of one pending effect (or one entry of a RACE/ALL).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EffectId(u64);

impl EffectId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Result of one effect.
pub(crate) type Outcome = Result<Output, SagaError>;

pub(crate) struct EffectSlot {
    task: TaskId,
    parent: Option<(EffectId, usize)>,
    kind: SlotKind,
}

enum SlotKind {
    /// CALL or DELAY running on the tokio runtime.
    Async(AbortHandle),
    Take,
    Join(TaskId),
    Race(Vec<EffectId>),
    All {
        children: Vec<EffectId>,
        results: Vec<Option<Output>>,
        remaining: usize,
        /// Attached tasks forked by entries that already resolved.
        forked: Vec<TaskId>,
    },
}

impl Scheduler {
    /// Starts interpreting `effect` for `task` under effect id `id`.
    pub(crate) fn interpret(
        &mut self,
        task: TaskId,
        id: EffectId,
        parent: Option<(EffectId, usize)>,
        effect: Effect,
    ) {
        tracing::trace!(%task, ?id, effect = effect.kind().as_str(), "interpret");
        match effect {
            Effect::Put(action) => {
                self.bridge.dispatch(action);
                self.route(id, task, parent, Ok(Output::Unit), Vec::new());
            }
            Effect::Select => {
                let snapshot = self.bridge.snapshot();
                self.route(id, task, parent, Ok(Output::Snapshot(snapshot)), Vec::new());
            }
            Effect::Take(pattern) => {
                self.bridge.subscribe(pattern, id);
                self.insert_slot(id, task, parent, SlotKind::Take);
            }
            Effect::Call { service, args } => {
                let Some(target) = self.services.get(&service).cloned() else {
                    let err =
                        SagaError::effect(EffectKind::Call, format!("unknown service `{service}`"));
                    self.route(id, task, parent, Err(err), Vec::new());
                    return;
                };
                let tx = self.inbound_tx.clone();
                let handle = tokio::spawn(async move {
                    let outcome = target
                        .call(args)
                        .await
                        .map(Output::Value)
                        .map_err(|source| SagaError::Call { service, source });
                    let _ = tx.send(Inbound::Resolved { effect: id, outcome });
                });
                self.insert_slot(id, task, parent, SlotKind::Async(handle.abort_handle()));
            }
            Effect::Delay(duration) => {
                let handle = self.spawn_timer(id, duration);
                self.insert_slot(id, task, parent, SlotKind::Async(handle));
            }
            Effect::Fork {
                saga,
                args,
                detached,
            } => {
                let owner = if detached { None } else { Some(task) };
                match self.create_task(&saga, args, owner) {
                    Some(child) => {
                        let forked = if detached { Vec::new() } else { vec![child] };
                        self.route(id, task, parent, Ok(Output::Task(child)), forked);
                    }
                    None => {
                        let err =
                            SagaError::effect(EffectKind::Fork, format!("unknown saga `{saga}`"));
                        self.route(id, task, parent, Err(err), Vec::new());
                    }
                }
            }
            Effect::Cancel(target) => {
                self.cancel_task(target);
                // Cancelling an ancestor (or itself) takes the yielding task down too.
                if self.registry.is_live(task) {
                    self.route(id, task, parent, Ok(Output::Unit), Vec::new());
                }
            }
            Effect::Join(target) => self.interpret_join(task, id, parent, target),
            Effect::Race(entries) => self.interpret_race(task, id, parent, entries),
            Effect::All(entries) => self.interpret_all(task, id, parent, entries),
        }
    }

    fn interpret_join(
        &mut self,
        task: TaskId,
        id: EffectId,
        parent: Option<(EffectId, usize)>,
        target: TaskId,
    ) {
        if target == task {
            let err = SagaError::effect(EffectKind::Join, "a task cannot join itself");
            self.route(id, task, parent, Err(err), Vec::new());
        } else if self.registry.is_live(target) {
            self.joiners.entry(target).or_default().push(id);
            self.insert_slot(id, task, parent, SlotKind::Join(target));
        } else {
            let outcome = match self.registry.report(target) {
                Some(report) => match &report.result {
                    Some(value) => Ok(Output::Value(value.clone())),
                    None => Err(SagaError::Joined {
                        task: target,
                        reason: join_reason(report.state.as_str(), report.error.as_ref()),
                    }),
                },
                None => Err(SagaError::effect(
                    EffectKind::Join,
                    format!("unknown task {target}"),
                )),
            };
            self.route(id, task, parent, outcome, Vec::new());
        }
    }

    fn interpret_race(
        &mut self,
        task: TaskId,
        id: EffectId,
        parent: Option<(EffectId, usize)>,
        entries: Vec<Effect>,
    ) {
        if entries.is_empty() {
            let err = SagaError::effect(EffectKind::Race, "race needs at least one entry");
            self.route(id, task, parent, Err(err), Vec::new());
            return;
        }
        self.insert_slot(id, task, parent, SlotKind::Race(Vec::with_capacity(entries.len())));
        for (index, entry) in entries.into_iter().enumerate() {
            let child = self.next_effect_id();
            match self.slots.get_mut(&id).map(|s| &mut s.kind) {
                Some(SlotKind::Race(children)) => children.push(child),
                // Already settled by an earlier entry.
                _ => break,
            }
            self.interpret(task, child, Some((id, index)), entry);
        }
    }

    fn interpret_all(
        &mut self,
        task: TaskId,
        id: EffectId,
        parent: Option<(EffectId, usize)>,
        entries: Vec<Effect>,
    ) {
        if entries.is_empty() {
            self.route(id, task, parent, Ok(Output::All(Vec::new())), Vec::new());
            return;
        }
        let n = entries.len();
        self.insert_slot(
            id,
            task,
            parent,
            SlotKind::All {
                children: Vec::with_capacity(n),
                results: vec![None; n],
                remaining: n,
                forked: Vec::new(),
            },
        );
        for (index, entry) in entries.into_iter().enumerate() {
            let child = self.next_effect_id();
            match self.slots.get_mut(&id).map(|s| &mut s.kind) {
                Some(SlotKind::All { children, .. }) => children.push(child),
                // Failed fast on an earlier entry.
                _ => break,
            }
            self.interpret(task, child, Some((id, index)), entry);
        }
    }

    fn spawn_timer(&self, id: EffectId, duration: Duration) -> AbortHandle {
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(Inbound::Resolved {
                effect: id,
                outcome: Ok(Output::Unit),
            });
        })
        .abort_handle()
    }

    fn insert_slot(
        &mut self,
        id: EffectId,
        task: TaskId,
        parent: Option<(EffectId, usize)>,
        kind: SlotKind,
    ) {
        self.slots.insert(id, EffectSlot { task, parent, kind });
    }

    /// Resolves a pending effect. Unknown ids are stale and reported.
    pub(crate) fn settle(&mut self, id: EffectId, outcome: Outcome) {
        match self.slots.remove(&id) {
            Some(slot) => self.route(id, slot.task, slot.parent, outcome, Vec::new()),
            None => {
                tracing::debug!(?id, "dropping stale resumption");
                self.bus.publish(
                    Event::new(EventKind::ResumptionDropped)
                        .with_reason(format!("effect {id:?} is no longer pending")),
                );
            }
        }
    }

    /// Delivers the outcome of effect `id` to whoever waits on it.
    fn route(
        &mut self,
        id: EffectId,
        task: TaskId,
        parent: Option<(EffectId, usize)>,
        outcome: Outcome,
        forked: Vec<TaskId>,
    ) {
        let Some((composite, index)) = parent else {
            let resume = match outcome {
                Ok(output) => Resume::Value(output),
                Err(err) => Resume::Error(err),
            };
            self.ready.push_back(Resumption {
                task,
                effect: Some(id),
                resume,
            });
            return;
        };

        let Some(slot) = self.slots.get_mut(&composite) else {
            // The composite is gone; nothing owns what this entry forked.
            for child in forked {
                self.cancel_task(child);
            }
            return;
        };
        let outer = slot.parent;

        match &mut slot.kind {
            SlotKind::Race(_) => {
                if let Some(EffectSlot {
                    kind: SlotKind::Race(children),
                    ..
                }) = self.slots.remove(&composite)
                {
                    for (i, loser) in children.into_iter().enumerate() {
                        if i != index {
                            self.cancel_effect(loser);
                        }
                    }
                }
                let outcome = outcome.map(|output| Output::Race {
                    index,
                    output: Box::new(output),
                });
                self.route(composite, task, outer, outcome, forked);
            }
            SlotKind::All {
                results,
                remaining,
                forked: collected,
                ..
            } => match outcome {
                Ok(output) => {
                    results[index] = Some(output);
                    *remaining -= 1;
                    collected.extend(forked);
                    if *remaining > 0 {
                        return;
                    }
                    if let Some(EffectSlot {
                        kind: SlotKind::All { results, forked, .. },
                        ..
                    }) = self.slots.remove(&composite)
                    {
                        let outputs = results.into_iter().flatten().collect();
                        self.route(composite, task, outer, Ok(Output::All(outputs)), forked);
                    }
                }
                Err(err) => {
                    for child in forked {
                        self.cancel_task(child);
                    }
                    self.cancel_effect(composite);
                    self.route(composite, task, outer, Err(err), Vec::new());
                }
            },
            // Leaves never have entries.
            _ => {}
        }
    }

    /// Withdraws interest in a pending effect and everything below it.
    pub(crate) fn cancel_effect(&mut self, id: EffectId) {
        let Some(slot) = self.slots.remove(&id) else {
            return;
        };
        match slot.kind {
            SlotKind::Async(handle) => handle.abort(),
            SlotKind::Take => {
                self.bridge.unsubscribe(id);
            }
            SlotKind::Join(target) => {
                if let Some(waiting) = self.joiners.get_mut(&target) {
                    waiting.retain(|j| *j != id);
                }
            }
            SlotKind::Race(children) => {
                for child in children {
                    self.cancel_effect(child);
                }
            }
            SlotKind::All {
                children, forked, ..
            } => {
                for child in children {
                    self.cancel_effect(child);
                }
                for task in forked {
                    self.cancel_task(task);
                }
            }
        }
    }
}

/// Reason carried by `SagaError::Joined`.
pub(crate) fn join_reason(state: &str, error: Option<&SagaError>) -> String {
    match error {
        Some(err) => format!("{state}: {err}"),
        None => state.to_string(),
    }
}

/// Payload of the action dispatched when a detached task fails.
pub(crate) fn failure_payload(task: TaskId, name: &str, err: &SagaError) -> Value {
    serde_json::json!({
        "task": task,
        "name": name,
        "error": err.to_string(),
    })
}
