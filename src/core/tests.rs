use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use crate::core::{Config, Lifecycle, Scheduler, Supervisor};
use crate::effects::{Action, Effect, Output};
use crate::error::{RuntimeError, SagaError, ServiceError};
use crate::events::{Event, EventKind};
use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
use crate::sagas::{Catalog, Resume, SagaBody, SagaFn, SagaRef, SagaSpec, Sequence, Step, TaskId, from_fn};
use crate::services::{ServiceFn, Services};
use crate::store::Store;

/// Body that passes a zero-based stage counter to `f` on every step.
fn scripted<F>(mut f: F) -> impl SagaBody
where
    F: FnMut(usize, Resume) -> Step + Send + 'static,
{
    let mut stage = 0;
    from_fn(move |resume: Resume| {
        let step = f(stage, resume);
        stage += 1;
        step
    })
}

fn seq(name: &'static str, effects: Vec<Effect>) -> SagaRef {
    SagaFn::arc(name, move |_args| Sequence::new(effects.clone()))
}

fn idle(name: &'static str) -> SagaRef {
    seq(name, vec![Effect::take("NEVER")])
}

fn crashy() -> SagaRef {
    seq("crashy", vec![Effect::call("missing", vec![])])
}

fn scheduler(catalog: Catalog, services: Services) -> Scheduler {
    Scheduler::new(Config::default(), Store::new(json!({})), catalog, services)
}

fn kinds(store: &Store) -> Vec<String> {
    store.dispatch_log().into_iter().map(|a| a.kind).collect()
}

fn report_of(sched: &Scheduler, name: &str) -> crate::core::TaskReport {
    sched
        .reports()
        .into_iter()
        .find(|r| &*r.name == name)
        .unwrap_or_else(|| panic!("no report for {name}"))
}

/// Drives the scheduler until `task` terminates.
async fn until_done(sched: &mut Scheduler, task: TaskId) -> Lifecycle {
    sched.run_until_idle();
    while !sched.lifecycle(task).is_some_and(Lifecycle::is_terminal) {
        tokio::time::timeout(Duration::from_secs(600), sched.turn())
            .await
            .expect("scheduler stalled");
    }
    sched.lifecycle(task).unwrap()
}

fn login_saga() -> SagaRef {
    SagaFn::arc("login", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, Resume::Start) => Step::Yield(Effect::put(Action::new("LOGIN_READY"))),
            (1, Resume::Value(_)) => Step::Yield(Effect::take("LOGIN_SUBMIT")),
            (2, Resume::Value(Output::Action(submit))) => Step::Yield(Effect::call(
                "authenticate",
                vec![submit.payload["user"].clone(), submit.payload["password"].clone()],
            )),
            (3, Resume::Value(Output::Value(session))) => {
                Step::Yield(Effect::put(Action::new("LOGIN_SUCCESS").with_payload(session)))
            }
            (4, Resume::Value(_)) => Step::done(),
            (_, Resume::Error(err)) => Step::Fail(err),
            _ => Step::Fail(SagaError::failed("unexpected resume")),
        })
    })
}

fn login_services() -> Services {
    Services::new()
        .with(ServiceFn::arc("authenticate", |args: Vec<Value>| async move {
            match (args[0].as_str(), args[1].as_str()) {
                (Some("a"), Some("b")) => Ok(json!({ "token": "t1" })),
                _ => Err(ServiceError::new("bad credentials")),
            }
        }))
        .with(ServiceFn::arc("sync", |_args: Vec<Value>| async move {
            Ok(json!({ "synced": true }))
        }))
}

#[tokio::test]
async fn login_flow_completes_with_token() {
    let catalog = Catalog::new()
        .with(seq("basic", vec![Effect::put(Action::new("BOOTSTRAPPED"))]))
        .with(seq("connectordb", vec![Effect::call("sync", vec![])]))
        .with(login_saga());
    let mut sched = scheduler(catalog, login_services());
    let handle = sched.handle();

    let basic = sched.spawn("basic", vec![]).unwrap();
    let sync = sched.spawn("connectordb", vec![]).unwrap();
    let login = sched.spawn("login", vec![]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.lifecycle(basic), Some(Lifecycle::Completed));
    assert_eq!(sched.lifecycle(login), Some(Lifecycle::Suspended));
    assert_eq!(sched.take_watchers(), 1);

    handle
        .dispatch(Action::new("LOGIN_SUBMIT").with_payload(json!({ "user": "a", "password": "b" })))
        .unwrap();
    assert_eq!(until_done(&mut sched, login).await, Lifecycle::Completed);
    assert_eq!(until_done(&mut sched, sync).await, Lifecycle::Completed);

    let log = sched.store().dispatch_log();
    let last = log.last().unwrap();
    assert_eq!(last.kind, "LOGIN_SUCCESS");
    assert_eq!(last.payload, json!({ "token": "t1" }));
    assert_eq!(report_of(&sched, "connectordb").result, Some(json!([{ "synced": true }])));
}

#[tokio::test]
async fn login_failure_reaches_failure_action() {
    let mut sched = scheduler(Catalog::new().with(login_saga()), login_services());
    let login = sched.spawn("login", vec![]).unwrap();
    sched.run_until_idle();
    sched.dispatch(Action::new("LOGIN_SUBMIT").with_payload(json!({ "user": "a", "password": "x" })));

    assert_eq!(until_done(&mut sched, login).await, Lifecycle::Failed);
    sched.run_until_idle();

    let failure = sched.store().dispatch_log().pop().unwrap();
    assert_eq!(failure.kind, "SAGA_FAILED");
    assert_eq!(failure.payload["name"], json!("login"));
    assert_eq!(failure.payload["task"], json!(login.get()));
    assert_eq!(
        failure.payload["error"],
        json!("call to `authenticate` failed: bad credentials")
    );
}

#[tokio::test(start_paused = true)]
async fn race_loser_never_resumes_its_task() {
    let racer = SagaFn::arc("racer", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::race([Effect::take("STOP"), Effect::delay_ms(10)])),
            (1, Resume::Value(out)) => {
                let (index, _) = out.race_winner().expect("race output");
                Step::Yield(Effect::put(Action::new("WINNER").with_payload(json!(index))))
            }
            (2, _) => Step::Yield(Effect::take("AFTER")),
            (3, Resume::Value(Output::Action(_))) => Step::done(),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(racer), Services::new());
    let mut events = sched.bus().subscribe();
    let id = sched.spawn("racer", vec![]).unwrap();

    sched.run_until_idle();
    assert_eq!(sched.take_watchers(), 1);
    sched.turn().await;

    // The losing TAKE is withdrawn; only the task's own TAKE remains.
    assert_eq!(sched.take_watchers(), 1);
    sched.dispatch(Action::new("STOP"));
    sched.run_until_idle();
    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Suspended));

    sched.dispatch(Action::new("AFTER"));
    assert_eq!(until_done(&mut sched, id).await, Lifecycle::Completed);
    assert_eq!(kinds(sched.store()), vec!["WINNER", "STOP", "AFTER"]);
    assert_eq!(sched.store().dispatch_log()[0].payload, json!(1));

    let mut stop_woke = None;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::ActionDispatched && ev.action.as_deref() == Some("STOP") {
            stop_woke = ev.woken;
        }
    }
    assert_eq!(stop_woke, Some(0));
}

#[tokio::test(start_paused = true)]
async fn all_fails_fast_and_cancels_in_flight_sibling() {
    let slow_done = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&slow_done);
    let services = Services::new()
        .with(ServiceFn::arc("slow", move |_args: Vec<Value>| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
        }))
        .with(ServiceFn::arc("boom", |_args: Vec<Value>| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(ServiceError::new("boom"))
        }));

    let both = SagaFn::arc("both", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::all([
                Effect::fork("idle", vec![]),
                Effect::call("slow", vec![]),
                Effect::call("boom", vec![]),
            ])),
            (1, Resume::Error(err)) => {
                Step::Yield(Effect::put(Action::new("ALL_FAILED").with_payload(json!(err.to_string()))))
            }
            (2, _) => Step::done(),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(both).with(idle("idle")), services);
    let id = sched.spawn("both", vec![]).unwrap();

    assert_eq!(until_done(&mut sched, id).await, Lifecycle::Completed);
    assert_eq!(kinds(sched.store()), vec!["ALL_FAILED"]);
    assert_eq!(report_of(&sched, "idle").state, Lifecycle::Cancelled);

    tokio::time::sleep(Duration::from_millis(500)).await;
    sched.run_until_idle();
    assert_eq!(slow_done.load(Ordering::SeqCst), 0);
    assert_eq!(sched.take_watchers(), 0);
}

#[tokio::test]
async fn cancelling_parent_cancels_children_first() {
    let parent = seq(
        "parent",
        vec![
            Effect::fork("idle", vec![]),
            Effect::fork("idle", vec![]),
            Effect::take("NEVER"),
        ],
    );
    let mut sched = scheduler(Catalog::new().with(parent).with(idle("idle")), Services::new());
    let mut events = sched.bus().subscribe();
    let root = sched.spawn("parent", vec![]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.live_tasks(), 3);
    assert_eq!(sched.take_watchers(), 3);

    sched.handle().cancel(root).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.live_tasks(), 0);
    assert_eq!(sched.take_watchers(), 0);
    assert!(sched.reports().iter().all(|r| r.state == Lifecycle::Cancelled));

    let cancelled: Vec<TaskId> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|ev: &Event| ev.kind == EventKind::TaskCancelled)
        .filter_map(|ev| ev.task)
        .collect();
    assert_eq!(cancelled.len(), 3);
    assert_eq!(cancelled.last(), Some(&root));

    sched.dispatch(Action::new("NEVER"));
    sched.run_until_idle();
    assert_eq!(sched.reports().len(), 3);
}

#[tokio::test]
async fn take_only_sees_later_actions() {
    let echo = seq(
        "echo",
        vec![Effect::put(Action::new("PING")), Effect::take("PING")],
    );
    let mut sched = scheduler(Catalog::new().with(echo), Services::new());
    let id = sched.spawn("echo", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Suspended));
    assert_eq!(kinds(sched.store()), vec!["PING"]);

    sched.dispatch(Action::new("PING").with_payload(json!(2)));
    sched.run_until_idle();
    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Completed));
    assert_eq!(
        sched.report(id).unwrap().result,
        Some(json!([null, { "type": "PING", "payload": 2 }]))
    );
}

fn ping_pong_run() -> Vec<String> {
    let pinger = SagaFn::arc("pinger", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::fork("ponger", vec![])),
            (1, _) => Step::Yield(Effect::put(Action::new("PING"))),
            (2, _) => Step::Yield(Effect::race([Effect::take("PONG"), Effect::take("QUIT")])),
            (3, Resume::Value(out)) => match out.race_winner() {
                Some((0, _)) => Step::Yield(Effect::put(Action::new("GOT_PONG"))),
                _ => Step::Yield(Effect::put(Action::new("GOT_QUIT"))),
            },
            (_, Resume::Error(err)) => Step::Fail(err),
            _ => Step::done(),
        })
    });
    let ponger = seq(
        "ponger",
        vec![
            Effect::take("PING"),
            Effect::all([Effect::take("GO"), Effect::take("GO")]),
            Effect::put(Action::new("PONG")),
        ],
    );
    let mut sched = scheduler(Catalog::new().with(pinger).with(ponger), Services::new());
    sched.spawn("pinger", vec![]).unwrap();
    sched.run_until_idle();
    for action in ["NOISE", "GO", "QUIT", "GO"] {
        sched.dispatch(Action::new(action));
        sched.run_until_idle();
    }
    kinds(sched.store())
}

#[tokio::test]
async fn same_event_order_replays_same_actions() {
    let first = ping_pong_run();
    assert_eq!(first, ping_pong_run());
    // The ponger started before the PING was delivered, so it saw it.
    assert_eq!(
        first,
        vec!["PING", "NOISE", "GO", "PONG", "GOT_PONG", "QUIT", "GO"]
    );
}

#[tokio::test]
async fn child_failure_is_catchable_by_parent() {
    let guardian = SagaFn::arc("guardian", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::fork("crashy", vec![])),
            (1, Resume::Value(Output::Task(_))) => Step::Yield(Effect::take("NEVER")),
            (2, Resume::Error(SagaError::Unhandled { name, reason, .. })) => Step::Yield(
                Effect::put(
                    Action::new("CHILD_FAILED").with_payload(json!({ "name": name, "reason": reason })),
                ),
            ),
            (3, _) => Step::done(),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(guardian).with(crashy()), Services::new());
    let id = sched.spawn("guardian", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Completed));
    assert_eq!(report_of(&sched, "crashy").state, Lifecycle::Failed);
    assert_eq!(sched.take_watchers(), 0);
    let log = sched.store().dispatch_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, "CHILD_FAILED");
    assert_eq!(log[0].payload["name"], json!("crashy"));
    assert_eq!(
        log[0].payload["reason"],
        json!("CALL effect failed: unknown service `missing`")
    );
}

#[tokio::test]
async fn uncaught_child_failure_fails_the_parent() {
    let parent = seq(
        "parent",
        vec![Effect::fork("crashy", vec![]), Effect::take("NEVER")],
    );
    let mut sched = scheduler(Catalog::new().with(parent).with(crashy()), Services::new());
    let id = sched.spawn("parent", vec![]).unwrap();
    sched.run_until_idle();

    let report = sched.report(id).unwrap();
    assert_eq!(report.state, Lifecycle::Failed);
    assert!(matches!(report.error, Some(SagaError::Unhandled { .. })));
    assert_eq!(kinds(sched.store()), vec!["SAGA_FAILED"]);
}

#[tokio::test]
async fn detached_failure_spares_siblings() {
    let mut sched = scheduler(
        Catalog::new().with(crashy()).with(idle("steady")),
        Services::new(),
    );
    let bad = sched.spawn("crashy", vec![]).unwrap();
    let steady = sched.spawn("steady", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(bad), Some(Lifecycle::Failed));
    assert_eq!(sched.lifecycle(steady), Some(Lifecycle::Suspended));
    let log = sched.store().dispatch_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, "SAGA_FAILED");
    assert_eq!(log[0].payload["task"], json!(bad.get()));
}

#[tokio::test]
async fn cancelled_task_can_put_during_cleanup() {
    let tidy = SagaFn::arc("tidy", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::take("NEVER")),
            (1, Resume::Error(SagaError::Cancelled)) => {
                Step::Yield(Effect::put(Action::new("CLEANED_UP")))
            }
            _ => Step::done(),
        })
    });
    let stubborn = SagaFn::arc("stubborn", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::take("NEVER")),
            (1, Resume::Error(SagaError::Cancelled)) => Step::Yield(Effect::delay_ms(5)),
            (2, Resume::Error(SagaError::Cancelled)) => {
                Step::Yield(Effect::put(Action::new("GAVE_UP")))
            }
            _ => Step::done(),
        })
    });
    let mut sched = scheduler(Catalog::new().with(tidy).with(stubborn), Services::new());
    let a = sched.spawn("tidy", vec![]).unwrap();
    let b = sched.spawn("stubborn", vec![]).unwrap();
    sched.run_until_idle();

    sched.cancel(a);
    sched.cancel(b);
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(a), Some(Lifecycle::Cancelled));
    assert_eq!(sched.lifecycle(b), Some(Lifecycle::Cancelled));
    assert_eq!(kinds(sched.store()), vec!["CLEANED_UP", "GAVE_UP"]);
}

#[tokio::test]
async fn cleanup_is_bounded_by_step_budget() {
    let chatty = SagaFn::arc("chatty", |_args| {
        from_fn(|resume: Resume| match resume {
            Resume::Start => Step::Yield(Effect::take("NEVER")),
            _ => Step::Yield(Effect::put(Action::new("STILL_HERE"))),
        })
    });
    let cfg = Config {
        cleanup_steps: 3,
        ..Config::default()
    };
    let mut sched = Scheduler::new(cfg, Store::new(json!({})), Catalog::new().with(chatty), Services::new());
    let id = sched.spawn("chatty", vec![]).unwrap();
    sched.run_until_idle();
    sched.cancel(id);
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Cancelled));
    assert_eq!(kinds(sched.store()).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn join_waits_for_result_and_reports_cancellation() {
    let joiner = SagaFn::arc("joiner", |_args| {
        let mut worker = None;
        scripted(move |stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::fork("worker", vec![])),
            (1, Resume::Value(Output::Task(id))) => {
                worker = Some(id);
                Step::Yield(Effect::join(id))
            }
            (2, Resume::Value(Output::Value(v))) => {
                Step::Yield(Effect::put(Action::new("JOINED").with_payload(v)))
            }
            (3, _) => Step::Yield(Effect::fork("idle", vec![])),
            (4, Resume::Value(Output::Task(id))) => Step::Yield(Effect::all([
                Effect::join(id),
                Effect::cancel(id),
            ])),
            (5, Resume::Error(SagaError::Joined { reason, .. })) => {
                Step::Yield(Effect::put(Action::new("JOIN_FAILED").with_payload(json!(reason))))
            }
            (6, _) => Step::Yield(Effect::join(worker.expect("worker id"))),
            (7, Resume::Value(Output::Value(v))) => Step::Complete(v),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let worker = seq("worker", vec![Effect::delay_ms(10), Effect::select()]);
    let mut sched = scheduler(
        Catalog::new().with(joiner).with(worker).with(idle("idle")),
        Services::new(),
    );
    let id = sched.spawn("joiner", vec![]).unwrap();

    assert_eq!(until_done(&mut sched, id).await, Lifecycle::Completed);
    assert_eq!(kinds(sched.store()), vec!["JOINED", "JOIN_FAILED"]);
    let log = sched.store().dispatch_log();
    assert_eq!(log[0].payload, json!([null, {}]));
    assert_eq!(log[1].payload, json!("cancelled"));
    // Joining a terminated task resolves from its report.
    assert_eq!(sched.report(id).unwrap().result, Some(json!([null, {}])));
}

#[tokio::test(start_paused = true)]
async fn parent_completes_after_its_children() {
    let parent = seq("parent", vec![Effect::fork("worker", vec![])]);
    let worker = seq("worker", vec![Effect::delay_ms(50)]);
    let mut sched = scheduler(Catalog::new().with(parent).with(worker), Services::new());
    let id = sched.spawn("parent", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Suspended));
    assert_eq!(until_done(&mut sched, id).await, Lifecycle::Completed);
    assert_eq!(report_of(&sched, "worker").state, Lifecycle::Completed);
}

#[tokio::test]
async fn cancelling_a_returned_parent_never_steps_its_body_again() {
    let parent = SagaFn::arc("parent", |_args| {
        scripted(|stage, _resume| match stage {
            0 => Step::Yield(Effect::fork("idle", vec![])),
            1 => Step::done(),
            _ => Step::Yield(Effect::put(Action::new("STEPPED_AFTER_RETURN"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(parent).with(idle("idle")), Services::new());
    let id = sched.spawn("parent", vec![]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Suspended));

    sched.cancel(id);
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Cancelled));
    assert_eq!(report_of(&sched, "idle").state, Lifecycle::Cancelled);
    assert!(kinds(sched.store()).is_empty());
}

#[tokio::test]
async fn edge_effects_resolve_or_fail_immediately() {
    let edges = SagaFn::arc("edges", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::race([])),
            (1, Resume::Error(SagaError::Effect { .. })) => Step::Yield(Effect::all([])),
            (2, Resume::Value(Output::All(items))) if items.is_empty() => Step::Yield(Effect::fork("nope", vec![])),
            (3, Resume::Error(SagaError::Effect { .. })) => Step::Yield(Effect::cancel(TaskId::new(999))),
            (4, Resume::Value(Output::Unit)) => Step::Yield(Effect::select()),
            (5, Resume::Value(Output::Snapshot(state))) => Step::Complete(Value::clone(&state)),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let counter = |state: &Value, action: &Action| {
        let n = state["seen"].as_u64().unwrap_or(0);
        json!({ "seen": n + 1, "last": action.kind })
    };
    let mut sched = Scheduler::new(
        Config::default(),
        Store::with_reducer(json!({}), counter),
        Catalog::new().with(edges),
        Services::new(),
    );
    sched.dispatch(Action::new("HELLO"));
    let id = sched.spawn("edges", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(
        sched.report(id).unwrap().result,
        Some(json!({ "seen": 1, "last": "HELLO" }))
    );
}

#[tokio::test]
async fn spawned_task_failure_is_reported_without_touching_the_spawner() {
    let spawner = SagaFn::arc("spawner", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::spawn("crashy", vec![])),
            (1, Resume::Value(out)) => {
                let child = out.task().map(TaskId::get);
                Step::Yield(Effect::put(Action::new("SPAWNED").with_payload(json!(child))))
            }
            (2, _) => Step::Yield(Effect::take("NEVER")),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(spawner).with(crashy()), Services::new());
    let id = sched.spawn("spawner", vec![]).unwrap();
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Suspended));
    assert_eq!(sched.take_watchers(), 1);

    let crash = report_of(&sched, "crashy");
    assert_eq!(crash.state, Lifecycle::Failed);
    assert!(crash.detached);
    assert_eq!(crash.parent, None);

    let log = sched.store().dispatch_log();
    assert_eq!(kinds(sched.store()), vec!["SPAWNED", "SAGA_FAILED"]);
    assert_eq!(log[1].payload["task"], log[0].payload);
    assert_eq!(log[1].payload["name"], json!("crashy"));
}

fn assassin() -> SagaRef {
    SagaFn::arc("assassin", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::take("TARGET")),
            (1, Resume::Value(Output::Action(target))) => {
                match serde_json::from_value::<TaskId>(target.payload) {
                    Ok(id) => Step::Yield(Effect::cancel(id)),
                    Err(err) => Step::Fail(SagaError::failed(err.to_string())),
                }
            }
            (2, resume) if resume.is_cancelled() => {
                Step::Yield(Effect::put(Action::new("ASSASSIN_CLEANUP")))
            }
            (3, _) => Step::done(),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    })
}

#[tokio::test]
async fn cancelling_an_ancestor_takes_the_canceller_down_too() {
    let host = seq(
        "host",
        vec![Effect::fork("assassin", vec![]), Effect::take("NEVER")],
    );
    let mut sched = scheduler(Catalog::new().with(host).with(assassin()), Services::new());
    let mut events = sched.bus().subscribe();
    let root = sched.spawn("host", vec![]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.take_watchers(), 2);

    sched.dispatch(Action::new("TARGET").with_payload(json!(root.get())));
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(root), Some(Lifecycle::Cancelled));
    assert_eq!(report_of(&sched, "assassin").state, Lifecycle::Cancelled);
    assert_eq!(sched.live_tasks(), 0);
    assert_eq!(sched.take_watchers(), 0);
    assert_eq!(kinds(sched.store()), vec!["TARGET", "ASSASSIN_CLEANUP"]);

    let dropped = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|ev: &Event| ev.kind == EventKind::ResumptionDropped)
        .count();
    assert_eq!(dropped, 0);
}

#[tokio::test]
async fn a_task_can_cancel_itself() {
    let mut sched = scheduler(Catalog::new().with(assassin()), Services::new());
    let id = sched.spawn("assassin", vec![]).unwrap();
    sched.run_until_idle();

    sched.dispatch(Action::new("TARGET").with_payload(json!(id.get())));
    sched.run_until_idle();

    assert_eq!(sched.lifecycle(id), Some(Lifecycle::Cancelled));
    assert_eq!(kinds(sched.store()), vec!["TARGET", "ASSASSIN_CLEANUP"]);
}

#[tokio::test(start_paused = true)]
async fn race_cancels_tasks_forked_by_a_losing_all() {
    let racer = SagaFn::arc("racer", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::race([
                Effect::all([Effect::fork("idle", vec![]), Effect::take("NEVER")]),
                Effect::delay_ms(10),
            ])),
            (1, Resume::Value(out)) if out.race_winner().map(|(i, _)| i) == Some(1) => Step::done(),
            (_, resume) => Step::Fail(SagaError::failed(format!("unexpected {resume:?}"))),
        })
    });
    let mut sched = scheduler(Catalog::new().with(racer).with(idle("idle")), Services::new());
    let id = sched.spawn("racer", vec![]).unwrap();
    sched.run_until_idle();
    assert_eq!(sched.live_tasks(), 2);
    assert_eq!(sched.take_watchers(), 2);

    assert_eq!(until_done(&mut sched, id).await, Lifecycle::Completed);
    assert_eq!(report_of(&sched, "idle").state, Lifecycle::Cancelled);
    assert_eq!(sched.live_tasks(), 0);
    assert_eq!(sched.take_watchers(), 0);
}

#[tokio::test]
async fn retention_limits_bound_reports_and_dispatch_log() {
    let looper = SagaFn::arc("looper", |_args| {
        from_fn(|resume: Resume| match resume {
            Resume::Value(Output::Action(_)) => Step::Yield(Effect::fork("worker", vec![])),
            Resume::Error(err) => Step::Fail(err),
            _ => Step::Yield(Effect::take("TICK")),
        })
    });
    let cfg = Config {
        report_limit: 5,
        dispatch_log_limit: 3,
        ..Config::default()
    };
    let catalog = Catalog::new().with(looper).with(seq("worker", vec![]));
    let mut sched = Scheduler::new(cfg, Store::new(json!({})), catalog, Services::new());
    sched.spawn("looper", vec![]).unwrap();
    sched.run_until_idle();

    for _ in 0..100 {
        sched.dispatch(Action::new("TICK"));
        sched.run_until_idle();
    }

    assert_eq!(sched.live_tasks(), 1);
    assert_eq!(sched.take_watchers(), 1);
    assert_eq!(sched.reports().len(), 5);
    assert!(sched.reports().iter().all(|r| &*r.name == "worker"));
    assert_eq!(sched.store().dispatch_log().len(), 3);
}

#[tokio::test]
async fn unknown_root_saga_is_rejected() {
    let mut sched = scheduler(Catalog::new(), Services::new());
    let err = sched.spawn("ghost", vec![]).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownSaga { ref name } if name == "ghost"));
}

#[tokio::test(start_paused = true)]
async fn supervisor_restarts_until_budget_is_spent() {
    let backoff = BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_secs(1),
        factor: 2.0,
        jitter: JitterPolicy::None,
    };
    let flaky = SagaSpec::new(crashy())
        .with_restart(RestartPolicy::OnFailure)
        .with_backoff(backoff)
        .with_max_restarts(Some(2));
    let steady = SagaSpec::new(seq("basic", vec![Effect::put(Action::new("BOOTSTRAPPED"))]))
        .with_restart(RestartPolicy::OnFailure);

    let sup = Supervisor::builder(Config::default())
        .with_os_signals(false)
        .build();
    let store = sup.store().clone();
    let mut events = sup.bus().subscribe();
    let started = tokio::time::Instant::now();

    let report = sup.run(vec![flaky, steady]).await.unwrap();

    assert!(!report.shutdown);
    assert_eq!(report.runs("crashy"), 3);
    assert_eq!(report.runs("basic"), 1);
    assert_eq!(report.count(Lifecycle::Failed), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));

    let failures = kinds(&store).iter().filter(|k| *k == "SAGA_FAILED").count();
    assert_eq!(failures, 3);

    let mut scheduled = Vec::new();
    let mut exhausted = 0;
    while let Ok(ev) = events.try_recv() {
        match ev.kind {
            EventKind::RestartScheduled => scheduled.push(ev.delay_ms),
            EventKind::RestartExhausted => exhausted += 1,
            _ => {}
        }
    }
    assert_eq!(scheduled, vec![Some(100), Some(200)]);
    assert_eq!(exhausted, 1);
}

#[tokio::test]
async fn supervisor_shutdown_cancels_roots_with_cleanup() {
    let tidy = SagaFn::arc("tidy", |_args| {
        scripted(|stage, resume| match (stage, resume) {
            (0, _) => Step::Yield(Effect::take("NEVER")),
            (1, Resume::Error(SagaError::Cancelled)) => {
                Step::Yield(Effect::put(Action::new("LOGGED_OUT")))
            }
            _ => Step::done(),
        })
    });
    let sup = Supervisor::builder(Config::default())
        .with_os_signals(false)
        .build();
    let store = sup.store().clone();
    sup.handle().shutdown().unwrap();

    let report = sup
        .run(vec![SagaSpec::new(tidy), SagaSpec::new(idle("steady"))])
        .await
        .unwrap();

    assert!(report.shutdown);
    assert_eq!(report.count(Lifecycle::Cancelled), 2);
    assert_eq!(kinds(&store), vec!["LOGGED_OUT"]);
}

#[tokio::test]
async fn supervisor_login_roster_end_to_end() {
    let sup = Supervisor::builder(Config::default())
        .with_services(login_services())
        .with_os_signals(false)
        .build();
    let handle = sup.handle();
    let mut watch = sup.store().watch();

    let roster = vec![
        SagaSpec::new(seq("basic", vec![Effect::put(Action::new("BOOTSTRAPPED"))])),
        SagaSpec::new(seq("connectordb", vec![Effect::call("sync", vec![])])),
        SagaSpec::new(login_saga()),
    ];
    let run = tokio::spawn(sup.run(roster));

    loop {
        let action = watch.recv().await.unwrap();
        if action.kind == "LOGIN_READY" {
            break;
        }
    }
    handle
        .dispatch(Action::new("LOGIN_SUBMIT").with_payload(json!({ "user": "a", "password": "b" })))
        .unwrap();

    let report = run.await.unwrap().unwrap();
    assert!(!report.shutdown);
    assert_eq!(report.count(Lifecycle::Completed), 3);
    assert_eq!(report.task("login").unwrap().state, Lifecycle::Completed);

    let log = handle.store().dispatch_log();
    assert_eq!(log.last().unwrap().kind, "LOGIN_SUCCESS");
    assert_eq!(log.last().unwrap().payload, json!({ "token": "t1" }));
}

#[tokio::test]
async fn supervisor_always_restarts_until_shutdown() {
    let tick = SagaSpec::new(seq("tick", vec![])).with_restart(RestartPolicy::Always { interval: None });
    let sup = Supervisor::builder(Config::default())
        .with_os_signals(false)
        .build();
    let handle = sup.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown().unwrap();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), sup.run(vec![tick]))
        .await
        .expect("supervisor must yield between immediate restarts")
        .unwrap();

    assert!(report.shutdown);
    assert!(report.runs("tick") > 1);
    assert_eq!(report.count(Lifecycle::Failed), 0);
}
