//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` (task lifecycle, dispatch, dropped resumptions),
//!   `Supervisor` (restarts, shutdown), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Supervisor` listener (fans out to `SubscriberSet`), tests.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
