//! State container and the scheduler's bridge to it.
//!
//! ## Contents
//! - [`Store`], [`Reducer`] shared, thread-safe state plus dispatch log
//! - `Bridge` (crate-private) serialized dispatch queue and TAKE subscriptions
//!
//! ```text
//! UI ── SchedulerHandle::dispatch ──┐
//!                                   ▼
//! Task ── PUT ──────────────► Bridge queue ──► Store::commit ──► subscriptions (TAKE)
//!                                                   │
//!                                                   └──► Store::watch() (UI observers)
//! ```

mod bridge;
#[allow(clippy::module_inception)]
mod store;

pub(crate) use bridge::Bridge;
pub use store::{Reducer, Store};
