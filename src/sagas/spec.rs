//! # Root roster entry.
//!
//! Defines [`SagaSpec`]: which saga a top-level task runs, with which
//! arguments, and how the root supervisor reacts when it ends.
//!
//! A spec can be created:
//! - **Explicitly** with [`SagaSpec::new`] (never restarted)
//! - **From config** with [`SagaSpec::with_defaults`] (inherit restart/backoff)
//!
//! ## Example
//! ```rust
//! use sagavisor::{BackoffPolicy, Config, RestartPolicy, SagaFn, SagaRef, SagaSpec, Sequence};
//!
//! let sync: SagaRef = SagaFn::arc("connectordb", |_args| Sequence::new(vec![]));
//!
//! let spec = SagaSpec::new(sync.clone());
//! assert!(matches!(spec.restart(), RestartPolicy::Never));
//!
//! let supervised = SagaSpec::new(sync)
//!     .with_restart(RestartPolicy::OnFailure)
//!     .with_backoff(BackoffPolicy::default())
//!     .with_max_restarts(Some(3));
//! assert_eq!(supervised.max_restarts(), Some(3));
//! ```

use serde_json::Value;

use crate::{
    core::Config,
    policies::{BackoffPolicy, RestartPolicy},
    sagas::saga_fn::SagaRef,
};

/// Specification of one top-level task.
#[derive(Clone)]
pub struct SagaSpec {
    saga: SagaRef,
    args: Vec<Value>,
    restart: RestartPolicy,
    backoff: BackoffPolicy,
    max_restarts: Option<u32>,
}

impl SagaSpec {
    /// Creates a spec that runs once (`RestartPolicy::Never`).
    pub fn new(saga: SagaRef) -> Self {
        Self {
            saga,
            args: Vec::new(),
            restart: RestartPolicy::Never,
            backoff: BackoffPolicy::default(),
            max_restarts: None,
        }
    }

    /// Creates a spec inheriting restart/backoff/max-restarts from `cfg`.
    pub fn with_defaults(saga: SagaRef, cfg: &Config) -> Self {
        Self {
            saga,
            args: Vec::new(),
            restart: cfg.restart,
            backoff: cfg.backoff,
            max_restarts: cfg.restart_limit(),
        }
    }

    /// Returns the saga definition.
    pub fn saga(&self) -> &SagaRef {
        &self.saga
    }

    /// Convenience: returns the saga name.
    pub fn name(&self) -> &str {
        self.saga.name()
    }

    /// Returns the start arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the restart policy.
    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }

    /// Returns the backoff policy.
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Returns the restart cap (`None` = unlimited).
    pub fn max_restarts(&self) -> Option<u32> {
        self.max_restarts
    }

    /// Returns a new spec with the given start arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Returns a new spec with updated restart policy.
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    /// Returns a new spec with updated backoff.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns a new spec with updated restart cap.
    pub fn with_max_restarts(mut self, max: Option<u32>) -> Self {
        self.max_restarts = max;
        self
    }
}
