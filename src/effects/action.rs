//! # Actions and action patterns.
//!
//! An [`Action`] is the only unit exchanged with the store: `{type, payload}`.
//! A [`Pattern`] selects actions by type and is what a TAKE effect waits on.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use sagavisor::{Action, Pattern};
//!
//! let submit = Action::new("LOGIN_SUBMIT").with_payload(json!({"user": "a"}));
//! assert!(Pattern::from("LOGIN_SUBMIT").matches(&submit));
//! assert!(Pattern::from("*").matches(&submit));
//! assert!(!Pattern::from("LOGOUT").matches(&submit));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque `{type, payload}` value dispatched to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary payload (`null` when absent).
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Creates an action with a `null` payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Attaches a payload.
    #[inline]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the action type.
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// True if the action has the given type.
    #[inline]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Selects actions by type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// Any action.
    Any,
    /// Actions of exactly this type.
    Type(String),
    /// Actions whose type is one of these.
    OneOf(Vec<String>),
}

impl Pattern {
    /// True if `action` is selected by this pattern.
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Type(kind) => action.is(kind),
            Pattern::OneOf(kinds) => kinds.iter().any(|k| action.is(k)),
        }
    }
}

/// `"*"` maps to [`Pattern::Any`], anything else to [`Pattern::Type`].
impl From<&str> for Pattern {
    fn from(kind: &str) -> Self {
        if kind == "*" {
            Pattern::Any
        } else {
            Pattern::Type(kind.to_string())
        }
    }
}

impl From<String> for Pattern {
    fn from(kind: String) -> Self {
        Pattern::from(kind.as_str())
    }
}

impl From<&[&str]> for Pattern {
    fn from(kinds: &[&str]) -> Self {
        Pattern::OneOf(kinds.iter().map(|k| (*k).to_string()).collect())
    }
}
