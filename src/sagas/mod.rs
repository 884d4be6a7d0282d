//! # Saga abstractions and specifications.
//!
//! This module provides the saga-related types:
//! - [`Saga`] - named definition that starts bodies
//! - [`SagaBody`], [`Resume`], [`Step`] - the per-task state machine protocol
//! - [`SagaFn`], [`SagaRef`] - function-backed definition and shared handle
//! - [`FnBody`], [`Sequence`] - ready-made bodies
//! - [`SagaSpec`] - root roster entry bundling a saga with restart policy
//! - [`Catalog`] - name lookup used by FORK
//! - [`TaskId`] - task identity

mod body;
mod catalog;
mod id;
mod saga;
mod saga_fn;
mod spec;

pub use body::{FnBody, Sequence, from_fn};
pub use catalog::Catalog;
pub use id::TaskId;
pub use saga::{Resume, Saga, SagaBody, Step};
pub use saga_fn::{SagaFn, SagaRef};
pub use spec::SagaSpec;
