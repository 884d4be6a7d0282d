//! # CALL targets.
//!
//! A [`Service`] is an external async collaborator invoked by
//! `Effect::Call { service, args }`. The core treats it as opaque: it runs on
//! the tokio runtime and its result comes back to the scheduler as a
//! resumption event. Services must be idempotent or safe to retry; the core
//! itself never retries.
//!
//! ## Example
//! ```rust
//! use serde_json::{Value, json};
//! use sagavisor::{ServiceError, ServiceFn, Services};
//!
//! let services = Services::new().with(ServiceFn::arc("authenticate", |args: Vec<Value>| async move {
//!     match args.as_slice() {
//!         [user, _pass] => Ok(json!({"token": format!("t-{user}")})),
//!         _ => Err(ServiceError::new("expected user and password")),
//!     }
//! }));
//! assert!(services.get("authenticate").is_some());
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

/// Contract for CALL targets.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Stable name; CALL descriptors refer to services by it.
    fn name(&self) -> &str;

    /// Performs the call.
    async fn call(&self, args: Vec<Value>) -> Result<Value, ServiceError>;
}

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;

/// Function-backed service: wraps `F: Fn(Vec<Value>) -> Fut`.
#[derive(Debug)]
pub struct ServiceFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ServiceFn<F> {
    /// Creates a new function-backed service.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, ServiceError> {
        (self.f)(args).await
    }
}

/// Name → service registry handed to the scheduler.
#[derive(Clone, Default)]
pub struct Services {
    services: HashMap<String, ServiceRef>,
}

impl Services {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service under its own name, replacing any previous entry.
    pub fn register(&mut self, service: ServiceRef) -> &mut Self {
        self.services.insert(service.name().to_string(), service);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, service: ServiceRef) -> Self {
        self.register(service);
        self
    }

    /// Looks up a service by name.
    pub fn get(&self, name: &str) -> Option<&ServiceRef> {
        self.services.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn service_fn_forwards_args_and_errors() {
        let echo = ServiceFn::arc("echo", |args: Vec<Value>| async move {
            args.into_iter()
                .next()
                .ok_or_else(|| ServiceError::new("no args"))
        });
        assert_eq!(echo.call(vec![json!(1)]).await, Ok(json!(1)));
        assert_eq!(echo.call(vec![]).await, Err(ServiceError::new("no args")));
    }
}
