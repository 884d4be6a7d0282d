//! # Store bridge: serialized dispatch and once-only subscriptions.
//!
//! The bridge is owned by the scheduler and is the only path by which actions
//! reach the [`Store`] and TAKE watchers.
//!
//! ## Rules
//! - **Serialized**: `dispatch` only enqueues; `deliver_next` delivers in
//!   exactly the order `dispatch` was called.
//! - **Commit first**: an action is reduced into the store before any
//!   subscription fires, so a woken task reads a snapshot that includes it.
//! - **Once-only**: a subscription fires at most once and is removed when it
//!   fires; subscriptions fire in registration order.
//! - **No buffering**: a subscription only sees actions delivered after it
//!   was registered.

use std::collections::VecDeque;

use crate::effects::{Action, Pattern, Snapshot};
use crate::store::Store;

struct Subscription<K> {
    key: K,
    pattern: Pattern,
}

/// Scheduler-side channel to the store.
pub(crate) struct Bridge<K> {
    store: Store,
    queue: VecDeque<Action>,
    subscriptions: Vec<Subscription<K>>,
}

impl<K: Copy + Eq> Bridge<K> {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            queue: VecDeque::new(),
            subscriptions: Vec::new(),
        }
    }

    /// Enqueues an action for delivery.
    pub(crate) fn dispatch(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    /// Latest committed state.
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Registers a once-only interest in the next action matching `pattern`.
    pub(crate) fn subscribe(&mut self, pattern: Pattern, key: K) {
        self.subscriptions.push(Subscription { key, pattern });
    }

    /// Removes a subscription; returns whether it was still registered.
    pub(crate) fn unsubscribe(&mut self, key: K) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.key != key);
        before != self.subscriptions.len()
    }

    /// Delivers the oldest queued action.
    ///
    /// Returns the action together with the keys of the subscriptions it
    /// fired, in registration order.
    pub(crate) fn deliver_next(&mut self) -> Option<(Action, Vec<K>)> {
        let action = self.queue.pop_front()?;
        self.store.commit(&action);

        let mut fired = Vec::new();
        self.subscriptions.retain(|s| {
            if s.pattern.matches(&action) {
                fired.push(s.key);
                false
            } else {
                true
            }
        });
        Some((action, fired))
    }

    /// Number of actions waiting for delivery.
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of live subscriptions.
    pub(crate) fn subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}
