//! # Scheduler: single-threaded driver of saga tasks.
//!
//! The [`Scheduler`] owns every live task, the pending-effect slots, the
//! store bridge and the FIFO of resumption events. Only one task body runs at
//! a time; tasks suspend only at a yielded effect.
//!
//! ## Loop
//! ```text
//! run_until_idle():
//!   loop {
//!     drain inbound channel (completions, dispatches, cancels)
//!     if bridge has a queued action:
//!         commit it, publish ActionDispatched,
//!         settle every TAKE it fired (registration order)
//!     else if ready queue is non-empty:
//!         pop Resumption { task, effect, resume }
//!         drop it unless task is live, not Running, and waits on `effect`
//!         advance(task, resume)
//!     else: break
//!   }
//!
//! advance(task, resume):
//!   body.step(resume) ─► Yield(effect)   ─► Suspended, pending = new id, interpret
//!                    ─► Complete(value) ─► Completed (or wait for live children)
//!                    ─► Fail(err)       ─► cancel children, Failed
//! ```
//!
//! ## Rules
//! - Queued actions are delivered before any further task is resumed.
//! - A failed attached task resumes its parent with `SagaError::Unhandled`.
//! - A failed detached task dispatches `Config::failure_action`.
//! - Cancellation is top-down: children first, then the pending effect, then
//!   cleanup steps, then the task itself becomes `Cancelled`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::config::Config;
use crate::core::handle::{Inbound, SchedulerHandle};
use crate::core::interpreter::{EffectId, EffectSlot, Outcome, failure_payload, join_reason};
use crate::core::registry::{Lifecycle, Registry, TaskReport, Terminal};
use crate::effects::{Action, Effect, Output};
use crate::error::{RuntimeError, SagaError};
use crate::events::{Bus, Event, EventKind};
use crate::sagas::{Catalog, Resume, SagaRef, Step, TaskId};
use crate::services::Services;
use crate::store::{Bridge, Store};

/// A queued request to step a task.
#[derive(Debug)]
pub(crate) struct Resumption {
    pub(crate) task: TaskId,
    /// Effect the task must still be waiting on; `None` for the start event.
    pub(crate) effect: Option<EffectId>,
    pub(crate) resume: Resume,
}

/// Termination of a detached task, reported to the supervisor.
#[derive(Clone, Debug)]
pub(crate) struct TaskExit {
    pub(crate) id: TaskId,
    pub(crate) state: Lifecycle,
    pub(crate) error: Option<SagaError>,
}

/// Drives saga tasks against a store, a saga catalog and a service registry.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use sagavisor::{
///     Action, Catalog, Config, Effect, Lifecycle, SagaFn, Scheduler, Sequence, Services, Store,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let catalog = Catalog::new().with(SagaFn::arc("hello", |_args| {
///     Sequence::new(vec![Effect::put(Action::new("HELLO"))])
/// }));
/// let mut sched = Scheduler::new(Config::default(), Store::new(json!({})), catalog, Services::new());
///
/// let id = sched.spawn("hello", vec![]).unwrap();
/// sched.run_until_idle();
///
/// assert_eq!(sched.lifecycle(id), Some(Lifecycle::Completed));
/// assert_eq!(sched.store().dispatch_log()[0].kind, "HELLO");
/// # }
/// ```
pub struct Scheduler {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) bridge: Bridge<EffectId>,
    pub(crate) catalog: Catalog,
    pub(crate) services: Services,
    pub(crate) registry: Registry,
    pub(crate) slots: HashMap<EffectId, EffectSlot>,
    pub(crate) joiners: HashMap<TaskId, Vec<EffectId>>,
    pub(crate) ready: VecDeque<Resumption>,
    pub(crate) inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    next_effect: u64,
    exits: Vec<TaskExit>,
    shutdown: bool,
}

impl Scheduler {
    /// Creates a scheduler with its own event bus.
    pub fn new(cfg: Config, store: Store, catalog: Catalog, services: Services) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::with_bus(cfg, store, catalog, services, bus)
    }

    /// Creates a scheduler publishing on an existing bus.
    pub fn with_bus(
        cfg: Config,
        store: Store,
        catalog: Catalog,
        services: Services,
        bus: Bus,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        store.set_log_limit(cfg.dispatch_log_retention());
        let registry = Registry::with_report_limit(cfg.report_retention());
        Self {
            cfg,
            bus,
            bridge: Bridge::new(store),
            catalog,
            services,
            registry,
            slots: HashMap::new(),
            joiners: HashMap::new(),
            ready: VecDeque::new(),
            inbound_tx,
            inbound_rx,
            next_effect: 0,
            exits: Vec::new(),
            shutdown: false,
        }
    }

    /// Returns a cloneable handle for dispatching, cancelling and shutdown.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(self.inbound_tx.clone(), self.bridge.store().clone())
    }

    /// The event bus this scheduler publishes on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The store behind the bridge.
    pub fn store(&self) -> &Store {
        self.bridge.store()
    }

    /// Adds (or replaces) a saga definition in the catalog.
    pub fn register(&mut self, saga: SagaRef) {
        self.catalog.register(saga);
    }

    /// Starts a detached top-level task. It takes its first step on the next drain.
    pub fn spawn(&mut self, saga: &str, args: Vec<Value>) -> Result<TaskId, RuntimeError> {
        self.create_task(saga, args, None)
            .ok_or_else(|| RuntimeError::UnknownSaga {
                name: saga.to_string(),
            })
    }

    /// Enqueues an action on the store bridge.
    pub fn dispatch(&mut self, action: Action) {
        self.bridge.dispatch(action);
    }

    /// Cancels a task and its descendants. Unknown or terminated ids are ignored.
    pub fn cancel(&mut self, task: TaskId) {
        self.cancel_task(task);
    }

    /// Cancels every live task, top-down, in creation order.
    pub fn cancel_all(&mut self) {
        for root in self.registry.roots() {
            self.cancel_task(root);
        }
    }

    /// Processes everything that is ready without waiting.
    pub fn run_until_idle(&mut self) {
        loop {
            while let Ok(msg) = self.inbound_rx.try_recv() {
                self.handle_inbound(msg);
            }
            if !self.step_once() {
                break;
            }
        }
    }

    /// Waits for one inbound message, then drains.
    ///
    /// Cancel-safe: no message is lost if the future is dropped while waiting.
    pub async fn turn(&mut self) {
        // The scheduler owns a sender, so the channel never closes.
        if let Some(msg) = self.inbound_rx.recv().await {
            self.handle_inbound(msg);
        }
        self.run_until_idle();
    }

    /// Runs until no task is live or shutdown is requested.
    ///
    /// On shutdown every remaining task is cancelled.
    pub async fn run(&mut self) {
        loop {
            self.run_until_idle();
            if self.shutdown {
                self.cancel_all();
                self.run_until_idle();
                return;
            }
            if self.registry.live_count() == 0 {
                return;
            }
            self.turn().await;
        }
    }

    /// Current or final lifecycle state of a task.
    pub fn lifecycle(&self, task: TaskId) -> Option<Lifecycle> {
        self.registry.lifecycle(task)
    }

    /// Final report of a terminated task.
    pub fn report(&self, task: TaskId) -> Option<&TaskReport> {
        self.registry.report(task)
    }

    /// Reports of every terminated task, in creation order.
    pub fn reports(&self) -> Vec<TaskReport> {
        self.registry.reports().cloned().collect()
    }

    /// Number of tasks that have not terminated.
    pub fn live_tasks(&self) -> usize {
        self.registry.live_count()
    }

    /// Number of TAKE effects waiting for an action.
    pub fn take_watchers(&self) -> usize {
        self.bridge.subscriptions()
    }

    /// True when no action is queued and no task is ready to run.
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.bridge.queued() == 0
    }

    /// True once `SchedulerHandle::shutdown` has been received.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    pub(crate) fn drain_exits(&mut self) -> Vec<TaskExit> {
        std::mem::take(&mut self.exits)
    }

    pub(crate) fn next_effect_id(&mut self) -> EffectId {
        self.next_effect += 1;
        EffectId::new(self.next_effect)
    }

    /// Creates a task and queues its start; `None` if the saga is unknown.
    pub(crate) fn create_task(
        &mut self,
        saga: &str,
        args: Vec<Value>,
        parent: Option<TaskId>,
    ) -> Option<TaskId> {
        let def = self.catalog.get(saga)?;
        let name: Arc<str> = Arc::from(def.name());
        let body = def.start(args);
        let id = self.registry.insert(name, parent, body);
        tracing::debug!(task = %id, saga, parent = ?parent, "task created");
        self.ready.push_back(Resumption {
            task: id,
            effect: None,
            resume: Resume::Start,
        });
        Some(id)
    }

    fn handle_inbound(&mut self, msg: Inbound) {
        match msg {
            Inbound::Resolved { effect, outcome } => self.settle(effect, outcome),
            Inbound::Dispatch(action) => self.bridge.dispatch(action),
            Inbound::Cancel(task) => self.cancel_task(task),
            Inbound::Shutdown => {
                if !self.shutdown {
                    self.shutdown = true;
                    self.bus.publish(
                        Event::new(EventKind::ShutdownRequested).with_reason("handle"),
                    );
                }
            }
        }
    }

    fn step_once(&mut self) -> bool {
        if let Some((action, fired)) = self.bridge.deliver_next() {
            tracing::trace!(action = %action.kind, woken = fired.len(), "action delivered");
            self.bus.publish(
                Event::new(EventKind::ActionDispatched)
                    .with_action(action.kind.as_str())
                    .with_woken(fired.len()),
            );
            for key in fired {
                self.settle(key, Ok(Output::Action(action.clone())));
            }
            return true;
        }
        let Some(next) = self.ready.pop_front() else {
            return false;
        };
        self.resume(next);
        true
    }

    fn resume(&mut self, next: Resumption) {
        let Resumption {
            task,
            effect,
            resume,
        } = next;
        let stale = match self.registry.get(task) {
            None => Some("task is not live"),
            Some(entry) if entry.cancelling => Some("task is being cancelled"),
            Some(entry) if entry.state == Lifecycle::Running => Some("task is already running"),
            Some(entry) => match effect {
                None if entry.state == Lifecycle::Created => None,
                None => Some("task already started"),
                Some(id) if entry.pending == Some(id) => None,
                Some(_) => Some("effect superseded"),
            },
        };
        if let Some(reason) = stale {
            tracing::debug!(%task, reason, "dropping resumption");
            self.bus.publish(
                Event::new(EventKind::ResumptionDropped)
                    .with_task(task)
                    .with_reason(reason),
            );
            return;
        }
        self.advance(task, resume);
    }

    /// Steps a task once and acts on what it returns.
    fn advance(&mut self, task: TaskId, resume: Resume) {
        let Some(entry) = self.registry.get_mut(task) else {
            return;
        };
        if entry.state == Lifecycle::Created {
            self.bus.publish(
                Event::new(EventKind::TaskStarted)
                    .with_task(task)
                    .with_parent(entry.parent)
                    .with_name(Arc::clone(&entry.name)),
            );
        }
        entry.state = Lifecycle::Running;
        entry.pending = None;

        match entry.body.step(resume) {
            Step::Yield(effect) => self.suspend(task, effect),
            Step::Complete(value) => {
                if entry.children.is_empty() {
                    self.finish(task, Terminal::Completed(value));
                } else {
                    tracing::trace!(%task, children = entry.children.len(), "waiting for children");
                    entry.finished = Some(value);
                    entry.state = Lifecycle::Suspended;
                }
            }
            Step::Fail(err) => {
                self.cancel_children(task);
                self.finish(task, Terminal::Failed(err));
            }
        }
    }

    fn suspend(&mut self, task: TaskId, effect: Effect) {
        let id = self.next_effect_id();
        let Some(entry) = self.registry.get_mut(task) else {
            return;
        };
        entry.state = Lifecycle::Suspended;
        entry.pending = Some(id);
        self.bus.publish(
            Event::new(EventKind::TaskSuspended)
                .with_task(task)
                .with_name(Arc::clone(&entry.name))
                .with_effect(effect.kind()),
        );
        self.interpret(task, id, None, effect);
    }

    /// Cascading cancellation of `task`.
    pub(crate) fn cancel_task(&mut self, task: TaskId) {
        let Some(entry) = self.registry.get_mut(task) else {
            return;
        };
        if entry.cancelling {
            return;
        }
        entry.cancelling = true;
        // A body that already returned is never stepped again.
        let returned = entry.finished.take().is_some();
        let started = entry.state != Lifecycle::Created && !returned;
        let pending = entry.pending.take();
        tracing::debug!(%task, name = %entry.name, "cancelling");

        self.cancel_children(task);
        if let Some(effect) = pending {
            self.cancel_effect(effect);
        }
        if started {
            self.cleanup(task);
        }
        self.finish(task, Terminal::Cancelled);
    }

    fn cancel_children(&mut self, task: TaskId) {
        let children: Vec<TaskId> = match self.registry.get(task) {
            Some(entry) => entry.children.iter().copied().collect(),
            None => return,
        };
        for child in children {
            self.cancel_task(child);
        }
    }

    /// Lets a cancelled body run its cleanup; only PUT is honored.
    fn cleanup(&mut self, task: TaskId) {
        let mut resume = Resume::Error(SagaError::Cancelled);
        for _ in 0..self.cfg.cleanup_steps {
            let Some(entry) = self.registry.get_mut(task) else {
                return;
            };
            match entry.body.step(resume) {
                Step::Yield(Effect::Put(action)) => {
                    tracing::trace!(%task, action = %action.kind, "cleanup put");
                    self.bridge.dispatch(action);
                    resume = Resume::Value(Output::Unit);
                }
                Step::Yield(other) => {
                    tracing::trace!(%task, effect = other.kind().as_str(), "refused during cleanup");
                    resume = Resume::Error(SagaError::Cancelled);
                }
                Step::Complete(_) | Step::Fail(_) => return,
            }
        }
        tracing::warn!(%task, steps = self.cfg.cleanup_steps, "cleanup step budget spent");
    }

    /// Moves a task to its terminal state and notifies joiners, parent and supervisor.
    fn finish(&mut self, task: TaskId, how: Terminal) {
        let Some((entry, report)) = self.registry.retire(task, &how) else {
            return;
        };

        let ev = match &how {
            Terminal::Completed(_) => Event::new(EventKind::TaskCompleted),
            Terminal::Failed(err) => {
                tracing::warn!(%task, name = %entry.name, error = %err, "task failed");
                Event::new(EventKind::TaskFailed).with_reason(err.to_string())
            }
            Terminal::Cancelled => Event::new(EventKind::TaskCancelled),
        };
        self.bus.publish(
            ev.with_task(task)
                .with_parent(entry.parent)
                .with_name(Arc::clone(&entry.name)),
        );

        if let Some(waiting) = self.joiners.remove(&task) {
            for join in waiting {
                let outcome: Outcome = match &how {
                    Terminal::Completed(value) => Ok(Output::Value(value.clone())),
                    Terminal::Failed(err) => Err(SagaError::Joined {
                        task,
                        reason: join_reason(report.state.as_str(), Some(err)),
                    }),
                    Terminal::Cancelled => Err(SagaError::Joined {
                        task,
                        reason: join_reason(report.state.as_str(), None),
                    }),
                };
                self.settle(join, outcome);
            }
        }

        match entry.parent {
            Some(parent) => match how {
                Terminal::Failed(err) => self.propagate_failure(parent, task, &entry.name, err),
                _ => self.check_parent_finished(parent),
            },
            None => {
                if let Terminal::Failed(err) = &how {
                    self.bridge.dispatch(
                        Action::new(self.cfg.failure_action.as_str())
                            .with_payload(failure_payload(task, &entry.name, err)),
                    );
                }
                self.exits.push(TaskExit {
                    id: task,
                    state: report.state,
                    error: report.error,
                });
            }
        }
    }

    /// Delivers a child's failure to its parent at the current suspension point.
    fn propagate_failure(&mut self, parent: TaskId, child: TaskId, name: &str, err: SagaError) {
        let unhandled = SagaError::Unhandled {
            task: child,
            name: name.to_string(),
            reason: err.to_string(),
        };
        let Some(entry) = self.registry.get_mut(parent) else {
            return;
        };
        if entry.cancelling {
            return;
        }
        if entry.finished.take().is_some() {
            // Body already returned; nothing left to catch the error.
            self.cancel_children(parent);
            self.finish(parent, Terminal::Failed(unhandled));
            return;
        }

        let superseded = entry.pending.take();
        if let Some(effect) = superseded {
            self.cancel_effect(effect);
        }
        let id = self.next_effect_id();
        if let Some(entry) = self.registry.get_mut(parent) {
            entry.pending = Some(id);
        }
        self.ready.push_back(Resumption {
            task: parent,
            effect: Some(id),
            resume: Resume::Error(unhandled),
        });
    }

    /// Completes a parent whose body returned once its last child is gone.
    fn check_parent_finished(&mut self, parent: TaskId) {
        let Some(entry) = self.registry.get_mut(parent) else {
            return;
        };
        if !entry.children.is_empty() {
            return;
        }
        if let Some(value) = entry.finished.take() {
            self.finish(parent, Terminal::Completed(value));
        }
    }
}
