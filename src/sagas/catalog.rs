//! # Saga catalog.
//!
//! Maps saga names to definitions so that FORK descriptors can stay plain
//! data (`Effect::fork("sync", args)`).

use std::collections::HashMap;

use crate::sagas::saga_fn::SagaRef;

/// Name → definition lookup used by FORK and by the root supervisor.
#[derive(Clone, Default)]
pub struct Catalog {
    sagas: HashMap<String, SagaRef>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a saga under its own name, replacing any previous entry.
    pub fn register(&mut self, saga: SagaRef) -> &mut Self {
        self.sagas.insert(saga.name().to_string(), saga);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, saga: SagaRef) -> Self {
        self.register(saga);
        self
    }

    /// Looks up a saga by name.
    pub fn get(&self, name: &str) -> Option<&SagaRef> {
        self.sagas.get(name)
    }

    /// Returns sorted list of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sagas.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sagas::{SagaFn, Sequence};

    #[test]
    fn later_registration_replaces_earlier() {
        let mut catalog = Catalog::new();
        catalog
            .register(SagaFn::arc("login", |_| Sequence::new(vec![])))
            .register(SagaFn::arc("basic", |_| Sequence::new(vec![])))
            .register(SagaFn::arc("login", |_| Sequence::new(vec![])));
        assert_eq!(catalog.names(), vec!["basic".to_string(), "login".to_string()]);
        assert!(catalog.get("login").is_some());
        assert!(catalog.get("missing").is_none());
    }
}
