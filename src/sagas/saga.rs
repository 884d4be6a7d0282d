//! # Saga abstraction: definitions and running bodies.
//!
//! A [`Saga`] is a named definition that can start any number of tasks.
//! Each start produces a fresh [`SagaBody`]: an explicit state machine the
//! scheduler drives one suspension point at a time.
//!
//! ## Step protocol
//! ```text
//! scheduler                        body
//!   step(Resume::Start)      ──►   Step::Yield(effect)      (suspend)
//!   step(Resume::Value(out)) ──►   Step::Yield(effect)      (suspend again)
//!   step(Resume::Error(err)) ──►   Step::Yield / Fail / Complete
//!   ...                      ──►   Step::Complete(value)    (terminal)
//! ```
//!
//! ## Rules
//! - A body is never stepped twice without yielding in between.
//! - Errors arrive as `Resume::Error`; returning `Step::Fail` leaves them unhandled.
//! - `Resume::Error(SagaError::Cancelled)` means the task is being torn down;
//!   only `Effect::Put` is honored from then on (cleanup dispatch).

use serde_json::Value;

use crate::effects::{Effect, Output};
use crate::error::SagaError;

/// What the scheduler hands to a body at a suspension point.
#[derive(Clone, Debug, PartialEq)]
pub enum Resume {
    /// First step of a freshly started task.
    Start,
    /// The pending effect resolved.
    Value(Output),
    /// The pending effect failed, a child failed, or the task is cancelled.
    Error(SagaError),
}

impl Resume {
    /// Converts to a `Result`; `Start` maps to `Ok(Output::Unit)`.
    pub fn into_result(self) -> Result<Output, SagaError> {
        match self {
            Resume::Start => Ok(Output::Unit),
            Resume::Value(out) => Ok(out),
            Resume::Error(err) => Err(err),
        }
    }

    /// True when the task is being torn down.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Resume::Error(SagaError::Cancelled))
    }
}

/// What a body returns from one step.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Suspend on this effect.
    Yield(Effect),
    /// Terminate normally with a value.
    Complete(Value),
    /// Terminate with an unhandled error.
    Fail(SagaError),
}

impl Step {
    /// `Complete(null)`.
    pub fn done() -> Self {
        Step::Complete(Value::Null)
    }
}

/// A running task's state machine.
pub trait SagaBody: Send + 'static {
    /// Advances the body to its next suspension point or to termination.
    fn step(&mut self, resume: Resume) -> Step;
}

/// # Named saga definition.
///
/// # Example
/// ```
/// use serde_json::Value;
/// use sagavisor::{Effect, Resume, Saga, SagaBody, Step};
///
/// struct Ping;
///
/// impl Saga for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     fn start(&self, _args: Vec<Value>) -> Box<dyn SagaBody> {
///         let mut sent = false;
///         Box::new(sagavisor::from_fn(move |_resume: Resume| {
///             if sent {
///                 return Step::done();
///             }
///             sent = true;
///             Step::Yield(Effect::put(sagavisor::Action::new("PING")))
///         }))
///     }
/// }
/// ```
pub trait Saga: Send + Sync + 'static {
    /// Returns a stable name; FORK descriptors refer to sagas by this name.
    fn name(&self) -> &str;

    /// Creates a fresh body for a new task.
    fn start(&self, args: Vec<Value>) -> Box<dyn SagaBody>;
}
