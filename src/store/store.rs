//! # Shared state container.
//!
//! [`Store`] holds the committed state, the dispatch log and a broadcast
//! channel for outside observers (the UI). It is cheap to clone and safe to
//! read from any thread. Mutation happens only through
//! [`Store::commit`], which the scheduler's bridge calls once per delivered
//! action, in dispatch order.
//!
//! ## Commit path
//! ```text
//! Bridge::deliver_next()
//!     └─► Store::commit(action)
//!            ├─► state = reducer(state, action)   (new Arc snapshot)
//!            ├─► log.push(action)                  (oldest dropped past the limit)
//!            └─► watch channel send (fire-and-forget)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::effects::{Action, Snapshot};

/// Capacity of the outside-observer channel.
const WATCH_CAPACITY: usize = 256;

/// Computes the next state from the current one and an action.
///
/// Implemented for any `Fn(&Value, &Action) -> Value`.
pub trait Reducer: Send + Sync + 'static {
    /// Returns the state after `action`.
    fn reduce(&self, state: &Value, action: &Action) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
{
    fn reduce(&self, state: &Value, action: &Action) -> Value {
        self(state, action)
    }
}

/// Delivered actions, oldest first.
#[derive(Default)]
struct Log {
    entries: VecDeque<Action>,
    limit: Option<usize>,
}

impl Log {
    fn trim(&mut self) {
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }
}

struct Inner {
    state: RwLock<Snapshot>,
    log: Mutex<Log>,
    reducer: Box<dyn Reducer>,
    watch: broadcast::Sender<Action>,
}

/// Handle to the global state container.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Creates a store whose state never changes (actions are only logged).
    pub fn new(initial: Value) -> Self {
        Self::with_reducer(initial, |state: &Value, _: &Action| state.clone())
    }

    /// Creates a store with the given reducer.
    pub fn with_reducer(initial: Value, reducer: impl Reducer) -> Self {
        let (watch, _rx) = broadcast::channel(WATCH_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Arc::new(initial)),
                log: Mutex::new(Log::default()),
                reducer: Box::new(reducer),
                watch,
            }),
        }
    }

    /// Returns the latest committed state.
    pub fn snapshot(&self) -> Snapshot {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state)
    }

    /// Returns the retained delivered actions, in delivery order.
    ///
    /// Unbounded by default; a scheduler applies `Config::dispatch_log_limit`.
    pub fn dispatch_log(&self) -> Vec<Action> {
        let log = self.inner.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.entries.iter().cloned().collect()
    }

    /// Keeps at most `limit` actions in the dispatch log (`None` keeps all).
    pub fn set_log_limit(&self, limit: Option<usize>) {
        let mut log = self.inner.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.limit = limit;
        log.trim();
    }

    /// Creates a receiver for actions delivered from now on.
    ///
    /// Slow receivers observe `RecvError::Lagged` and skip old actions.
    pub fn watch(&self) -> broadcast::Receiver<Action> {
        self.inner.watch.subscribe()
    }

    /// Reduces and commits one action, then notifies outside observers.
    pub(crate) fn commit(&self, action: &Action) {
        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let next = self.inner.reducer.reduce(&state, action);
            *state = Arc::new(next);
        }
        {
            let mut log = self.inner.log.lock().unwrap_or_else(PoisonError::into_inner);
            log.entries.push_back(action.clone());
            log.trim();
        }
        let _ = self.inner.watch.send(action.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter(state: &Value, action: &Action) -> Value {
        let n = state["count"].as_i64().unwrap_or(0);
        match action.kind() {
            "INC" => json!({ "count": n + 1 }),
            _ => state.clone(),
        }
    }

    #[test]
    fn commit_reduces_and_logs() {
        let store = Store::with_reducer(json!({"count": 0}), counter);
        let before = store.snapshot();

        store.commit(&Action::new("INC"));
        store.commit(&Action::new("NOOP"));

        assert_eq!(*before, json!({"count": 0}), "old snapshots never change");
        assert_eq!(*store.snapshot(), json!({"count": 1}));
        let kinds: Vec<String> = store.dispatch_log().into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["INC", "NOOP"]);
    }

    #[test]
    fn dispatch_log_keeps_the_newest_actions() {
        let store = Store::new(Value::Null);
        store.commit(&Action::new("A"));
        store.set_log_limit(Some(2));
        for kind in ["B", "C", "D"] {
            store.commit(&Action::new(kind));
        }

        let kinds: Vec<String> = store.dispatch_log().into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["C", "D"]);

        store.set_log_limit(Some(1));
        assert_eq!(store.dispatch_log().len(), 1);
    }

    #[tokio::test]
    async fn watchers_see_committed_actions() {
        let store = Store::new(Value::Null);
        let mut rx = store.watch();
        store.commit(&Action::new("PING"));
        assert_eq!(rx.recv().await.unwrap(), Action::new("PING"));
    }
}
