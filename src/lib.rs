//! # sagavisor
//!
//! **Sagavisor** is a saga coordination core: cooperative tasks that describe
//! side effects as data, a single-threaded scheduler that interprets them
//! against a store and injected services, and a root supervisor that starts a
//! fixed roster of top-level sagas.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   SagaSpec   │   │   SagaSpec   │   │   SagaSpec   │
//!     │   (basic)    │   │ (connectordb)│   │   (login)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (root roster, restart policy, shutdown)               │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                        │
//! │  - Registry   (live tasks, parent/children, final reports)        │
//! │  - ready FIFO (Resumption { task, effect id, resume })            │
//! │  - Interpreter (effect slots; RACE / ALL composition)             │
//! │  - Bridge     (action queue, once-only TAKE subscriptions)        │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ CALL             │ DELAY            │ PUT / commit  │ publish
//!        ▼                  ▼                  ▼               ▼
//!   Service (tokio)    tokio timer          Store          Bus ──► SubscriberSet
//!        │                  │              (reducer,              ├─► LogWriter
//!        └── Inbound::Resolved ──┐          log, watch)           └─► custom
//!                                ▼
//!                      mpsc<Inbound> ◄── SchedulerHandle (UI dispatch, cancel, shutdown)
//! ```
//!
//! ### Task lifecycle
//! ```text
//! Created ──► Running ──► Suspended ⇄ Running ──► Completed | Failed | Cancelled
//!
//! Step::Yield(effect)  → Suspended on exactly one pending effect
//! Step::Complete(v)    → Completed (after attached children terminate)
//! Step::Fail(e)        → Failed; parent resumed with SagaError::Unhandled,
//!                        or Config::failure_action dispatched for roots
//! cancel               → children first, then cleanup (PUT only), Cancelled
//! ```
//!
//! ## Features
//! | Area           | Description                                                   | Key types / traits                              |
//! |----------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Effects**    | Closed vocabulary of side-effect descriptors.                 | [`Effect`], [`Action`], [`Pattern`], [`Output`] |
//! | **Sagas**      | State machines stepped by the scheduler.                      | [`Saga`], [`SagaBody`], [`SagaFn`], [`Sequence`]|
//! | **Scheduling** | Single-flight resumption, cascading cancellation.             | [`Scheduler`], [`SchedulerHandle`]              |
//! | **Store**      | Reducer, dispatch log, snapshots.                             | [`Store`], [`Reducer`]                          |
//! | **Services**   | Async CALL targets.                                           | [`Service`], [`ServiceFn`], [`Services`]        |
//! | **Supervision**| Root roster with restart/backoff policies.                    | [`Supervisor`], [`SagaSpec`], [`RestartPolicy`] |
//! | **Events**     | Runtime events and subscribers.                               | [`Event`], [`Subscribe`]                        |
//! | **Errors**     | Typed errors for sagas, services and the runtime.             | [`SagaError`], [`ServiceError`], [`RuntimeError`]|
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (renders events through `tracing`).
//!
//! ## Example
//! ```rust
//! use serde_json::{Value, json};
//! use sagavisor::{
//!     Action, Config, Effect, Output, Resume, SagaFn, SagaSpec, ServiceFn, Services, Step,
//!     Supervisor, from_fn,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let services = Services::new().with(ServiceFn::arc("authenticate", |args: Vec<Value>| async move {
//!         Ok(json!({ "token": format!("t-{}", args[0].as_str().unwrap_or_default()) }))
//!     }));
//!
//!     let login = SagaFn::arc("login", |_args| {
//!         let mut stage = 0;
//!         from_fn(move |resume: Resume| {
//!             stage += 1;
//!             match (stage, resume) {
//!                 (1, _) => Step::Yield(Effect::call("authenticate", vec![json!("ada")])),
//!                 (2, Resume::Value(Output::Value(token))) => {
//!                     Step::Yield(Effect::put(Action::new("LOGIN_SUCCESS").with_payload(token)))
//!                 }
//!                 (_, Resume::Error(err)) => Step::Fail(err),
//!                 _ => Step::done(),
//!             }
//!         })
//!     });
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_services(services)
//!         .with_os_signals(false)
//!         .build();
//!     let store = sup.store().clone();
//!     sup.run(vec![SagaSpec::new(login)]).await?;
//!
//!     assert_eq!(store.dispatch_log()[0].payload, json!({ "token": "t-ada" }));
//!     Ok(())
//! }
//! ```

mod core;
mod effects;
mod error;
mod events;
mod policies;
mod sagas;
mod services;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    Config, Lifecycle, RunReport, Scheduler, SchedulerHandle, Supervisor, SupervisorBuilder,
    TaskReport,
};
pub use effects::{Action, Effect, EffectKind, Output, Pattern, Snapshot};
pub use error::{RuntimeError, SagaError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use sagas::{
    Catalog, FnBody, Resume, Saga, SagaBody, SagaFn, SagaRef, SagaSpec, Sequence, Step, TaskId,
    from_fn,
};
pub use services::{Service, ServiceFn, ServiceRef, Services};
pub use store::{Reducer, Store};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
