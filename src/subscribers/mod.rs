//! # Event subscribers for the sagavisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out and built-in implementations for runtime events broadcast
//! through the [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//! Scheduler / Supervisor ── publish(Event) ──► Bus
//!                                               │
//!                                         supervisor listener
//!                                               │
//!                                               ▼
//!                                         SubscriberSet::emit
//!                                               │
//!                          ┌────────────────────┼──────────────┐
//!                          ▼                    ▼              ▼
//!                      LogWriter            Metrics         Custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use sagavisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct RestartAlerts;
//!
//! #[async_trait]
//! impl Subscribe for RestartAlerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::RestartExhausted {
//!             // page someone
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
