//! Effect vocabulary: descriptors, actions and resolved values.
//!
//! ## Contents
//! - [`Effect`], [`EffectKind`] the closed set of requestable side effects
//! - [`Action`], [`Pattern`] store actions and the selector used by TAKE
//! - [`Output`], [`Snapshot`] values delivered back to a saga
//!
//! Everything here is plain data. Interpretation lives in `core::interpreter`.

mod action;
mod effect;
mod output;

pub use action::{Action, Pattern};
pub use effect::{Effect, EffectKind};
pub use output::{Output, Snapshot};
