// ABOUTME: Composition root owning the live registries, watchers, store and event bus.
// ABOUTME: Components that fail to register are skipped and reported through Diagnostics.

use crate::config::{Config, RegistriesConfig};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::Result;
use crate::event::EventBus;
use crate::model::ContainerReport;
use crate::registry::{Registry, RegistryClient, RegistrySet, create_registry};
use crate::store::{ContainerStore, MemoryStore};
use crate::watcher::{Watcher, WatcherConfig};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Anonymous providers available unless their kind is configured explicitly.
pub const DEFAULT_REGISTRY_KINDS: &[&str] = &["ecr", "gcr", "ghcr", "hub", "quay"];
pub const DEFAULT_REGISTRY_NAME: &str = "public";

pub struct Components {
    events: EventBus,
    store: Arc<dyn ContainerStore>,
    registries: Arc<RegistrySet>,
    client: RegistryClient,
    watchers: RwLock<BTreeMap<String, Arc<Watcher>>>,
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Components")
            .field("registries", &self.registries)
            .field("watchers", &self.watcher_ids())
            .finish_non_exhaustive()
    }
}

impl Components {
    pub fn new(events: EventBus, store: Arc<dyn ContainerStore>, client: RegistryClient) -> Self {
        Self {
            events,
            store,
            registries: Arc::new(RegistrySet::new()),
            client,
            watchers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Components backed by an in-memory store and a reqwest registry client.
    pub fn in_memory() -> Result<Self> {
        let events = EventBus::new();
        let store = Arc::new(MemoryStore::new(events.clone()));
        Ok(Self::new(events, store, RegistryClient::reqwest()?))
    }

    /// Register every registry and watcher declared in `config`.
    pub fn register(&self, config: &Config) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        self.register_registries(&config.registries, &mut diagnostics);
        self.register_watchers(&config.watchers(), &mut diagnostics);
        diagnostics
    }

    pub fn register_registries(&self, config: &RegistriesConfig, diagnostics: &mut Diagnostics) {
        for (kind, instances) in config {
            for (name, value) in instances {
                self.register_registry(kind, name, value, diagnostics);
            }
        }

        let null = serde_yaml::Value::Null;
        for kind in DEFAULT_REGISTRY_KINDS {
            if !config.keys().any(|k| k.eq_ignore_ascii_case(kind)) {
                self.register_registry(kind, DEFAULT_REGISTRY_NAME, &null, diagnostics);
            }
        }
    }

    fn register_registry(
        &self,
        kind: &str,
        name: &str,
        value: &serde_yaml::Value,
        diagnostics: &mut Diagnostics,
    ) {
        match create_registry(kind, name, value, self.client.clone()) {
            Ok(registry) => self.registries.register(registry),
            Err(e) => diagnostics.skip(
                WarningKind::Registry,
                format!("{}.{name}", kind.to_ascii_lowercase()),
                e,
            ),
        }
    }

    pub fn register_watchers(
        &self,
        watchers: &BTreeMap<String, WatcherConfig>,
        diagnostics: &mut Diagnostics,
    ) {
        for (name, config) in watchers {
            match Watcher::connect(
                name,
                config.clone(),
                Arc::clone(&self.registries),
                Arc::clone(&self.store),
                self.events.clone(),
            ) {
                Ok(watcher) => {
                    self.register_watcher(watcher);
                }
                Err(e) => diagnostics.skip(
                    WarningKind::Watcher,
                    format!("{}.{name}", crate::watcher::WATCHER_KIND),
                    e,
                ),
            }
        }
    }

    /// Add a watcher, replacing and deregistering any watcher with the same id.
    pub fn register_watcher(&self, watcher: Watcher) -> Arc<Watcher> {
        let watcher = Arc::new(watcher);
        tracing::info!(watcher = %watcher.id(), "registering watcher");
        if let Some(previous) = self
            .watchers
            .write()
            .insert(watcher.id(), Arc::clone(&watcher))
        {
            previous.deregister();
        }
        watcher
    }

    /// Start the schedules of every registered watcher.
    pub fn start(&self) {
        for watcher in self.watchers() {
            watcher.start();
        }
    }

    /// One scan of every watcher, concurrently; reports keyed by watcher id.
    pub async fn watch_all(&self) -> BTreeMap<String, Vec<ContainerReport>> {
        let watchers = self.watchers();
        let reports = join_all(watchers.iter().map(|w| w.watch())).await;
        watchers
            .iter()
            .map(|w| w.id())
            .zip(reports)
            .collect()
    }

    /// Stop every watcher and drop every component.
    pub fn deregister_all(&self) {
        let watchers = std::mem::take(&mut *self.watchers.write());
        for watcher in watchers.values() {
            watcher.deregister();
        }
        self.registries.clear();
        tracing::info!("all components deregistered");
    }

    pub fn watcher(&self, id: &str) -> Option<Arc<Watcher>> {
        self.watchers.read().get(id).cloned()
    }

    pub fn watchers(&self) -> Vec<Arc<Watcher>> {
        self.watchers.read().values().cloned().collect()
    }

    pub fn watcher_ids(&self) -> Vec<String> {
        self.watchers.read().keys().cloned().collect()
    }

    pub fn registry(&self, id: &str) -> Option<Arc<dyn Registry>> {
        self.registries.get(id)
    }

    pub fn registries(&self) -> &Arc<RegistrySet> {
        &self.registries
    }

    pub fn store(&self) -> &Arc<dyn ContainerStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
