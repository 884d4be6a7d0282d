//! Error types used by the sagavisor runtime, services and saga bodies.
//!
//! This module defines three error enums:
//!
//! - [`SagaError`]: errors delivered to a saga at its suspension point.
//! - [`ServiceError`]: errors returned by CALL targets ([`Service`](crate::Service)).
//! - [`RuntimeError`]: errors raised by the supervisor/handle layer itself.
//!
//! All of them provide `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` helpers.

use std::time::Duration;

use thiserror::Error;

use crate::effects::EffectKind;
use crate::sagas::TaskId;

/// # Errors delivered to a saga body.
///
/// A saga may catch any of these at its suspension point and continue.
/// Errors it does not catch terminate the task and travel to its parent
/// as [`SagaError::Unhandled`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SagaError {
    /// The effect could not be interpreted (unknown service or saga, empty race, ...).
    #[error("{effect} effect failed: {message}")]
    Effect {
        /// Kind of the effect that failed.
        effect: EffectKind,
        /// Reason given by the interpreter.
        message: String,
    },

    /// A CALL target returned an error; carried verbatim.
    #[error("call to `{service}` failed: {source}")]
    Call {
        /// Name of the called service.
        service: String,
        /// The error returned by the service.
        source: ServiceError,
    },

    /// The task is being torn down.
    ///
    /// Delivered during cancellation cleanup so the body can tell it apart
    /// from real failures.
    #[error("task cancelled")]
    Cancelled,

    /// A child task terminated with an error it did not handle.
    #[error("task {task} ({name}) failed: {reason}")]
    Unhandled {
        /// Id of the failed child.
        task: TaskId,
        /// Saga name of the failed child.
        name: String,
        /// Rendered error of the child.
        reason: String,
    },

    /// A joined task failed or was cancelled.
    #[error("joined task {task} did not complete: {reason}")]
    Joined {
        /// Id of the joined task.
        task: TaskId,
        /// Why the joined task ended.
        reason: String,
    },

    /// Raised by a saga body itself.
    #[error("{reason}")]
    Failed {
        /// Free-form reason.
        reason: String,
    },
}

impl SagaError {
    /// Convenience constructor for [`SagaError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        SagaError::Failed {
            reason: reason.into(),
        }
    }

    pub(crate) fn effect(effect: EffectKind, message: impl Into<String>) -> Self {
        SagaError::Effect {
            effect,
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sagavisor::SagaError;
    ///
    /// assert_eq!(SagaError::Cancelled.as_label(), "saga_cancelled");
    /// assert_eq!(SagaError::failed("boom").as_label(), "saga_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SagaError::Effect { .. } => "saga_effect_error",
            SagaError::Call { .. } => "saga_call_error",
            SagaError::Cancelled => "saga_cancelled",
            SagaError::Unhandled { .. } => "saga_unhandled",
            SagaError::Joined { .. } => "saga_joined",
            SagaError::Failed { .. } => "saga_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SagaError::Effect { effect, message } => format!("effect={effect} error: {message}"),
            SagaError::Call { service, source } => format!("service={service} error: {source}"),
            SagaError::Cancelled => "cancelled".to_string(),
            SagaError::Unhandled { task, name, reason } => {
                format!("child={task} name={name} error: {reason}")
            }
            SagaError::Joined { task, reason } => format!("joined={task} error: {reason}"),
            SagaError::Failed { reason } => format!("error: {reason}"),
        }
    }

    /// True for the synthetic cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SagaError::Cancelled)
    }
}

/// # Error returned by a CALL target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    /// Description of the failure.
    pub message: String,
}

impl ServiceError {
    /// Creates a new service error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "service_error"
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        format!("service error: {}", self.message)
    }
}

/// # Errors produced by the sagavisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The scheduler behind a handle has stopped.
    #[error("scheduler is no longer running")]
    SchedulerClosed,

    /// A root task names a saga missing from the catalog.
    #[error("unknown saga `{name}`")]
    UnknownSaga {
        /// The requested saga name.
        name: String,
    },

    /// Subscribers did not flush within the configured grace period.
    #[error("shutdown grace {grace:?} exceeded; still flushing: {stuck:?}")]
    GraceExceeded {
        /// The grace period that was exceeded.
        grace: Duration,
        /// Names of the subscribers still busy.
        stuck: Vec<&'static str>,
    },

    /// Registering OS signal listeners failed.
    #[error("shutdown signal listener failed: {reason}")]
    Signal {
        /// The underlying I/O error message.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sagavisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::SchedulerClosed.as_label(), "runtime_scheduler_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::SchedulerClosed => "runtime_scheduler_closed",
            RuntimeError::UnknownSaga { .. } => "runtime_unknown_saga",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal { .. } => "runtime_signal_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::SchedulerClosed => "scheduler closed".to_string(),
            RuntimeError::UnknownSaga { name } => format!("saga `{name}` is not registered"),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; {} subscriber(s) still busy", stuck.len())
            }
            RuntimeError::Signal { reason } => format!("signal listener failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_error_keeps_service_message() {
        let err = SagaError::Call {
            service: "authenticate".into(),
            source: ServiceError::new("bad credentials"),
        };
        assert_eq!(
            err.to_string(),
            "call to `authenticate` failed: bad credentials"
        );
        assert_eq!(err.as_label(), "saga_call_error");
    }

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(SagaError::Cancelled.is_cancelled());
        assert!(!SagaError::failed("x").is_cancelled());
    }
}
