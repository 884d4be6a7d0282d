//! # Function-backed saga (`SagaFn`)
//!
//! [`SagaFn`] wraps a closure `F: Fn(Vec<Value>) -> B`, producing a fresh body
//! per start. Bodies never share state across restarts; share explicitly
//! through `Arc<...>` captured by the closure if needed.
//!
//! ## Example
//! ```rust
//! use sagavisor::{Effect, SagaFn, SagaRef, Sequence};
//!
//! let boot: SagaRef = SagaFn::arc("basic", |_args| {
//!     Sequence::new(vec![Effect::put(sagavisor::Action::new("APP_READY"))])
//! });
//! assert_eq!(boot.name(), "basic");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;

use crate::sagas::saga::{Saga, SagaBody};

/// Shared handle to a saga definition.
pub type SagaRef = Arc<dyn Saga>;

/// Function-backed saga definition.
#[derive(Debug)]
pub struct SagaFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SagaFn<F> {
    /// Creates a new function-backed saga.
    ///
    /// Prefer [`SagaFn::arc`] when you immediately need a [`SagaRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the saga and returns it as a shared handle.
    pub fn arc<B>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(Vec<Value>) -> B + Send + Sync + 'static,
        B: SagaBody,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<F, B> Saga for SagaFn<F>
where
    F: Fn(Vec<Value>) -> B + Send + Sync + 'static,
    B: SagaBody,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, args: Vec<Value>) -> Box<dyn SagaBody> {
        Box::new((self.f)(args))
    }
}
