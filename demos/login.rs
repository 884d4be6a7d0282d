//! # Example: Login roster
//!
//! Runs the three root sagas of a small client:
//! - `basic`: bootstraps the store once;
//! - `connectordb`: syncs with a backend service, restarted on failure;
//! - `login`: waits for the UI to submit credentials and authenticates.
//!
//! The "UI" is a plain tokio task that watches the store and dispatches
//! `LOGIN_SUBMIT` through the scheduler handle once `LOGIN_READY` shows up.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example login --features logging
//! ```

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use sagavisor::{
    Action, BackoffPolicy, Config, Effect, LogWriter, Output, RestartPolicy, Resume, SagaFn,
    SagaRef, SagaSpec, Sequence, ServiceError, ServiceFn, Services, Step, Store, Subscribe,
    Supervisor, from_fn,
};

fn reduce(state: &Value, action: &Action) -> Value {
    let mut next = state.clone();
    match action.kind.as_str() {
        "BOOTSTRAPPED" => next["ready"] = json!(true),
        "LOGIN_SUCCESS" => next["session"] = action.payload.clone(),
        "SYNCED" => next["synced"] = action.payload.clone(),
        _ => {}
    }
    next
}

fn basic() -> SagaRef {
    SagaFn::arc("basic", |_args| {
        Sequence::new(vec![Effect::put(Action::new("BOOTSTRAPPED"))])
    })
}

fn connectordb() -> SagaRef {
    SagaFn::arc("connectordb", |_args| {
        let mut stage = 0;
        from_fn(move |resume: Resume| {
            stage += 1;
            let out = match resume.into_result() {
                Ok(out) => out,
                Err(err) => return Step::Fail(err),
            };
            match (stage, out.as_value()) {
                (1, _) => Step::Yield(Effect::call("sync", vec![])),
                (2, Some(rows)) => {
                    Step::Yield(Effect::put(Action::new("SYNCED").with_payload(rows.clone())))
                }
                _ => Step::done(),
            }
        })
    })
}

fn login() -> SagaRef {
    SagaFn::arc("login", |_args| {
        let mut stage = 0;
        from_fn(move |resume: Resume| {
            stage += 1;
            match (stage, resume) {
                (1, _) => Step::Yield(Effect::put(Action::new("LOGIN_READY"))),
                (2, _) => Step::Yield(Effect::race([
                    Effect::take("LOGIN_SUBMIT"),
                    Effect::delay_ms(5_000),
                ])),
                (3, Resume::Value(out)) => match out.race_winner() {
                    Some((0, winner)) => match winner.as_action() {
                        Some(submit) => Step::Yield(Effect::call(
                            "authenticate",
                            vec![
                                submit.payload["user"].clone(),
                                submit.payload["password"].clone(),
                            ],
                        )),
                        None => Step::done(),
                    },
                    _ => Step::Yield(Effect::put(Action::new("LOGIN_TIMEOUT"))),
                },
                (4, Resume::Value(Output::Value(session))) => {
                    Step::Yield(Effect::put(Action::new("LOGIN_SUCCESS").with_payload(session)))
                }
                (_, Resume::Error(err)) => Step::Fail(err),
                _ => Step::done(),
            }
        })
    })
}

fn services() -> Services {
    Services::new()
        .with(ServiceFn::arc("sync", |_args: Vec<Value>| async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(json!({ "rows": 42 }))
        }))
        .with(ServiceFn::arc("authenticate", |args: Vec<Value>| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            match (args[0].as_str(), args[1].as_str()) {
                (Some(user), Some("secret")) => Ok(json!({ "user": user, "token": "t-1" })),
                _ => Err(ServiceError::new("bad credentials")),
            }
        }))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config::default();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let sup = Supervisor::builder(cfg.clone())
        .with_subscribers(subs)
        .with_services(services())
        .with_store(Store::with_reducer(json!({}), reduce))
        .build();

    let handle = sup.handle();
    let mut watch = sup.store().watch();
    let store = sup.store().clone();

    // Simulated UI: submit credentials as soon as the form is ready.
    let ui = tokio::spawn(async move {
        while let Ok(action) = watch.recv().await {
            if action.kind == "LOGIN_READY" {
                let submit = Action::new("LOGIN_SUBMIT")
                    .with_payload(json!({ "user": "ada", "password": "secret" }));
                if let Err(e) = handle.dispatch(submit) {
                    eprintln!("[ui] dispatch failed: {e}");
                }
                break;
            }
        }
    });

    let roster = vec![
        SagaSpec::new(basic()),
        SagaSpec::new(connectordb())
            .with_restart(RestartPolicy::OnFailure)
            .with_backoff(BackoffPolicy {
                first: Duration::from_millis(200),
                ..BackoffPolicy::default()
            })
            .with_max_restarts(Some(3)),
        SagaSpec::new(login()),
    ];

    let report = sup.run(roster).await?;
    ui.abort();

    for task in &report.tasks {
        println!("[report] {} {} -> {}", task.name, task.id, task.state);
    }
    println!("[state] {}", store.snapshot());
    Ok(())
}
