//! # Ready-made saga bodies.
//!
//! - [`FnBody`] / [`from_fn`]: a body from an `FnMut(Resume) -> Step` closure.
//! - [`Sequence`]: yields a fixed list of effects, failing on the first error.

use std::collections::VecDeque;

use serde_json::Value;

use crate::effects::Effect;
use crate::sagas::saga::{Resume, SagaBody, Step};

/// Body driven by a closure.
pub struct FnBody<F>(F);

/// Wraps a closure as a [`SagaBody`].
///
/// ## Example
/// ```rust
/// use sagavisor::{Effect, Output, Resume, SagaBody, Step, from_fn};
///
/// let mut stage = 0;
/// let mut body = from_fn(move |resume: Resume| {
///     stage += 1;
///     match (stage, resume) {
///         (1, Resume::Start) => Step::Yield(Effect::take("LOGIN_SUBMIT")),
///         (_, Resume::Error(e)) => Step::Fail(e),
///         _ => Step::done(),
///     }
/// });
/// assert_eq!(body.step(Resume::Start), Step::Yield(Effect::take("LOGIN_SUBMIT")));
/// assert_eq!(body.step(Resume::Value(Output::Unit)), Step::done());
/// ```
pub fn from_fn<F>(f: F) -> FnBody<F>
where
    F: FnMut(Resume) -> Step + Send + 'static,
{
    FnBody(f)
}

impl<F> SagaBody for FnBody<F>
where
    F: FnMut(Resume) -> Step + Send + 'static,
{
    fn step(&mut self, resume: Resume) -> Step {
        (self.0)(resume)
    }
}

/// Yields its effects in order and completes with the JSON of their outputs.
///
/// Any error (including cancellation) ends the sequence as a failure.
#[derive(Debug, Clone)]
pub struct Sequence {
    effects: VecDeque<Effect>,
    outputs: Vec<Value>,
}

impl Sequence {
    /// Creates a sequence over the given effects.
    pub fn new(effects: Vec<Effect>) -> Self {
        Self {
            effects: effects.into(),
            outputs: Vec::new(),
        }
    }
}

impl SagaBody for Sequence {
    fn step(&mut self, resume: Resume) -> Step {
        match resume {
            Resume::Start => {}
            Resume::Value(out) => self.outputs.push(out.to_json()),
            Resume::Error(err) => return Step::Fail(err),
        }
        match self.effects.pop_front() {
            Some(effect) => Step::Yield(effect),
            None => Step::Complete(Value::Array(std::mem::take(&mut self.outputs))),
        }
    }
}
