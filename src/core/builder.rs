use std::sync::Arc;

use serde_json::json;

use crate::{
    core::{Config, scheduler::Scheduler},
    events::Bus,
    sagas::Catalog,
    services::Services,
    store::Store,
    subscribers::Subscribe,
};
use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    catalog: Catalog,
    services: Services,
    store: Option<Store>,
    os_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            catalog: Catalog::new(),
            services: Services::new(),
            store: None,
            os_signals: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (task lifecycle, failures, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sagas that FORK effects may start by name.
    ///
    /// Roster sagas are added automatically by `Supervisor::run`.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Services that CALL effects may invoke by name.
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// The store the sagas run against (default: an empty object, no reducer).
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether termination signals trigger a shutdown (default `true`).
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// This consumes the builder and initializes:
    /// - Event bus for broadcasting
    /// - Scheduler over the store, catalog and services
    ///
    /// Subscriber workers start with `Supervisor::run`.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let store = self.store.unwrap_or_else(|| Store::new(json!({})));
        let sched = Scheduler::with_bus(self.cfg.clone(), store, self.catalog, self.services, bus);
        Supervisor::new_internal(self.cfg, sched, self.subscribers, self.os_signals)
    }
}
