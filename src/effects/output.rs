//! # Resolved effect values.
//!
//! [`Output`] is what a saga receives when its pending effect resolves.
//! Each [`Effect`](crate::Effect) kind resolves to one variant; composite
//! effects nest outputs (`Race` records the winning slot, `All` keeps list order).

use std::sync::Arc;

use serde_json::{Value, json};

use crate::effects::action::Action;
use crate::sagas::TaskId;

/// Immutable view of the store state at one serialization point.
pub type Snapshot = Arc<Value>;

/// Value delivered to a saga when its effect resolves.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    /// PUT, DELAY, CANCEL.
    Unit,
    /// CALL result or JOIN completion value.
    Value(Value),
    /// TAKE: the matched action.
    Action(Action),
    /// FORK: id of the new task.
    Task(TaskId),
    /// SELECT: the committed state.
    Snapshot(Snapshot),
    /// RACE: the winning slot and its output.
    Race {
        /// Position of the winner in the race list.
        index: usize,
        /// Output of the winner.
        output: Box<Output>,
    },
    /// ALL: outputs in list order.
    All(Vec<Output>),
}

impl Output {
    /// Returns the JSON value for `Value`, `None` otherwise.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Output::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the action for `Action`, `None` otherwise.
    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Output::Action(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the task id for `Task`, `None` otherwise.
    pub fn task(&self) -> Option<TaskId> {
        match self {
            Output::Task(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the winning slot and its output for `Race`, `None` otherwise.
    pub fn race_winner(&self) -> Option<(usize, &Output)> {
        match self {
            Output::Race { index, output } => Some((*index, output)),
            _ => None,
        }
    }

    /// Renders the output as plain JSON.
    ///
    /// Tasks render as their numeric id, races as `{"index", "output"}`.
    pub fn to_json(&self) -> Value {
        match self {
            Output::Unit => Value::Null,
            Output::Value(v) => v.clone(),
            Output::Action(a) => json!({ "type": a.kind, "payload": a.payload }),
            Output::Task(id) => json!(id.get()),
            Output::Snapshot(s) => Value::clone(s),
            Output::Race { index, output } => json!({ "index": index, "output": output.to_json() }),
            Output::All(items) => Value::Array(items.iter().map(Output::to_json).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_outputs_render_in_order() {
        let out = Output::All(vec![
            Output::Unit,
            Output::Race {
                index: 1,
                output: Box::new(Output::Value(json!(7))),
            },
            Output::Action(Action::new("A")),
        ]);
        assert_eq!(
            out.to_json(),
            json!([null, {"index": 1, "output": 7}, {"type": "A", "payload": null}])
        );
    }
}
