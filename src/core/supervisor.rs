//! # Supervisor: starts the root roster and applies the restart policy.
//!
//! The [`Supervisor`] owns a [`Scheduler`], the subscribers and the global
//! [`Config`]. It starts every [`SagaSpec`] as a detached top-level task,
//! watches them terminate, restarts them per policy, and stops on request.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<SagaSpec>  ──►  Supervisor::run(roster)
//!
//! Preparation:
//!   - listener: Bus.subscribe() ─► SubscriberSet::emit(Event)   (fire-and-forget)
//!   - catalog.register(spec.saga) for each spec
//!   - sched.spawn(spec.name, spec.args)  → root TaskId per spec
//!
//! Main loop:
//!   sched.run_until_idle()
//!   for each root exit:
//!       Failed    + restarts_failed   → attempt < max ? schedule(backoff.next(attempt))
//!                                                     : RestartExhausted
//!       Completed + Always{interval}  → schedule(interval), attempt reset
//!       otherwise                     → stays terminated
//!   start due restarts
//!   stop when: no live task and no pending restart
//!   select! { sched.turn() | next restart timer | OS signal }
//!
//! Shutdown path (handle.shutdown() or OS signal):
//!   sched.cancel_all()       → children first, cleanup PUTs dispatched
//!   sched.run_until_idle()   → deliver cleanup actions
//!   listener drains within cfg.grace, else RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use sagavisor::{Action, Config, Effect, SagaFn, SagaRef, SagaSpec, Sequence, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), sagavisor::RuntimeError> {
//!     let basic: SagaRef = SagaFn::arc("basic", |_args| {
//!         Sequence::new(vec![Effect::put(Action::new("BOOTSTRAPPED"))])
//!     });
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_os_signals(false)
//!         .build();
//!     let store = sup.store().clone();
//!
//!     let report = sup.run(vec![SagaSpec::new(basic)]).await?;
//!     assert!(!report.shutdown);
//!     assert_eq!(store.dispatch_log()[0].kind, "BOOTSTRAPPED");
//!     assert_eq!(*store.snapshot(), json!({}));
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::Config;
use crate::core::handle::SchedulerHandle;
use crate::core::registry::{Lifecycle, TaskReport};
use crate::core::scheduler::{Scheduler, TaskExit};
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::sagas::{SagaSpec, TaskId};
use crate::store::Store;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Outcome of [`Supervisor::run`].
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Every task that terminated, in creation order (restarts included).
    pub tasks: Vec<TaskReport>,
    /// True when the run ended through a shutdown request or signal.
    pub shutdown: bool,
}

impl RunReport {
    /// Latest report for the given saga name.
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().rev().find(|r| &*r.name == name)
    }

    /// How many tasks ran the given saga (first start plus restarts, for roots).
    pub fn runs(&self, name: &str) -> usize {
        self.tasks.iter().filter(|r| &*r.name == name).count()
    }

    /// Number of tasks that ended in `state`.
    pub fn count(&self, state: Lifecycle) -> usize {
        self.tasks.iter().filter(|r| r.state == state).count()
    }
}

#[derive(Clone, Copy, Debug)]
struct Root {
    spec: usize,
    /// Restarts after failure so far.
    attempt: u32,
}

#[derive(Clone, Copy, Debug)]
struct PendingRestart {
    at: Instant,
    root: Root,
}

enum Wake {
    Inbound,
    Timer,
    Signal(Result<&'static str, RuntimeError>),
}

/// Runs a roster of top-level sagas on one scheduler.
pub struct Supervisor {
    cfg: Config,
    sched: Scheduler,
    subscribers: Vec<Arc<dyn Subscribe>>,
    os_signals: bool,
}

impl Supervisor {
    /// Returns a builder.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        sched: Scheduler,
        subscribers: Vec<Arc<dyn Subscribe>>,
        os_signals: bool,
    ) -> Self {
        Self {
            cfg,
            sched,
            subscribers,
            os_signals,
        }
    }

    /// Handle for dispatching actions, cancelling tasks and shutdown.
    pub fn handle(&self) -> SchedulerHandle {
        self.sched.handle()
    }

    /// The store the sagas run against.
    pub fn store(&self) -> &Store {
        self.sched.store()
    }

    /// The runtime event bus.
    pub fn bus(&self) -> &Bus {
        self.sched.bus()
    }

    /// Runs the roster until every task is terminal with no restart pending,
    /// or until shutdown.
    pub async fn run(self, roster: Vec<SagaSpec>) -> Result<RunReport, RuntimeError> {
        let Supervisor {
            cfg,
            mut sched,
            subscribers,
            os_signals,
        } = self;

        let names: Vec<&'static str> = subscribers.iter().map(|s| s.name()).collect();
        let token = CancellationToken::new();
        let set = SubscriberSet::new(subscribers, sched.bus().clone());
        let listener = spawn_listener(sched.bus(), set, token.clone());

        let mut roots: HashMap<TaskId, Root> = HashMap::new();
        for (index, spec) in roster.iter().enumerate() {
            sched.register(spec.saga().clone());
            let id = sched.spawn(spec.name(), spec.args().to_vec())?;
            roots.insert(
                id,
                Root {
                    spec: index,
                    attempt: 0,
                },
            );
        }

        let mut restarts: Vec<PendingRestart> = Vec::new();
        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);
        let mut signals_armed = os_signals;

        let stopped = loop {
            sched.run_until_idle();
            for exit in sched.drain_exits() {
                if let Some(root) = roots.remove(&exit.id) {
                    restarts.extend(plan_restart(&roster[root.spec], root, &exit, sched.bus()));
                }
            }
            if sched.shutdown_requested() {
                break true;
            }

            let now = Instant::now();
            let (due, later): (Vec<_>, Vec<_>) =
                std::mem::take(&mut restarts).into_iter().partition(|r| r.at <= now);
            restarts = later;
            if !due.is_empty() {
                for pending in due {
                    let spec = &roster[pending.root.spec];
                    let id = sched.spawn(spec.name(), spec.args().to_vec())?;
                    tracing::info!(task = %id, name = spec.name(), attempt = pending.root.attempt, "restarted");
                    roots.insert(id, pending.root);
                }
                // Zero-interval restarts would otherwise never give the runtime a turn.
                tokio::task::yield_now().await;
                continue;
            }

            if sched.live_tasks() == 0 && restarts.is_empty() && sched.is_idle() {
                break false;
            }

            let next = restarts.iter().map(|r| r.at).min();
            let wake = tokio::select! {
                _ = sched.turn() => Wake::Inbound,
                _ = tokio::time::sleep_until(next.unwrap_or(now)), if next.is_some() => Wake::Timer,
                res = &mut signal, if signals_armed => Wake::Signal(res),
            };
            match wake {
                Wake::Inbound | Wake::Timer => {}
                Wake::Signal(Ok(name)) => {
                    sched.bus().publish(
                        Event::new(EventKind::ShutdownRequested).with_reason(name),
                    );
                    break true;
                }
                Wake::Signal(Err(err)) => {
                    tracing::warn!(error = %err, "OS signals unavailable; continuing without them");
                    signals_armed = false;
                }
            }
        };

        if stopped {
            tracing::info!(live = sched.live_tasks(), "shutting down");
            sched.cancel_all();
            sched.run_until_idle();
        }
        let report = RunReport {
            tasks: sched.reports(),
            shutdown: stopped,
        };

        token.cancel();
        match tokio::time::timeout(cfg.grace, listener).await {
            Ok(_) => Ok(report),
            Err(_) => Err(RuntimeError::GraceExceeded {
                grace: cfg.grace,
                stuck: names,
            }),
        }
    }
}

/// Decides whether a root task that just exited runs again.
fn plan_restart(spec: &SagaSpec, root: Root, exit: &TaskExit, bus: &Bus) -> Option<PendingRestart> {
    let (delay, attempt) = match exit.state {
        Lifecycle::Failed if spec.restart().restarts_failed() => {
            if spec.max_restarts().is_some_and(|max| root.attempt >= max) {
                tracing::warn!(name = spec.name(), attempts = root.attempt, "restart budget spent");
                bus.publish(
                    Event::new(EventKind::RestartExhausted)
                        .with_name(spec.name())
                        .with_attempt(root.attempt),
                );
                return None;
            }
            (spec.backoff().next(root.attempt), root.attempt + 1)
        }
        Lifecycle::Completed => (spec.restart().after_completion()?, 0),
        _ => {
            tracing::debug!(name = spec.name(), state = %exit.state, "root task stays terminated");
            return None;
        }
    };

    let mut ev = Event::new(EventKind::RestartScheduled)
        .with_name(spec.name())
        .with_attempt(attempt)
        .with_delay(delay);
    if let Some(err) = &exit.error {
        ev = ev.with_reason(err.to_string());
    }
    bus.publish(ev);

    Some(PendingRestart {
        at: Instant::now() + delay,
        root: Root {
            spec: root.spec,
            attempt,
        },
    })
}

/// Forwards bus events to the subscriber set until `token` is cancelled,
/// then drains what is left and waits for the subscribers.
fn spawn_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit(ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        set.shutdown().await;
    })
}
