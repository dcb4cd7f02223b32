// ABOUTME: The set of registered providers and image-to-provider resolution.
// ABOUTME: Providers are kept in match-priority order so the first match wins deterministically.

use super::Registry;
use super::factory::priority;
use crate::model::{Image, UNKNOWN_REGISTRY};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
pub struct RegistrySet {
    registries: RwLock<Vec<Arc<dyn Registry>>>,
}

impl std::fmt::Debug for RegistrySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl RegistrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `registry`, replacing any provider with the same id.
    pub fn register(&self, registry: Arc<dyn Registry>) {
        let id = registry.id();
        tracing::info!(registry = %id, configuration = %registry.masked_configuration(), "registering registry");
        let mut registries = self.registries.write();
        registries.retain(|r| r.id() != id);
        registries.push(registry);
        registries.sort_by(|a, b| {
            priority(a.kind())
                .cmp(&priority(b.kind()))
                .then_with(|| a.name().cmp(b.name()))
        });
    }

    /// Drop every provider of `kind`; returns how many were removed.
    pub fn remove_kind(&self, kind: &str) -> usize {
        let mut registries = self.registries.write();
        let before = registries.len();
        registries.retain(|r| r.kind() != kind);
        before - registries.len()
    }

    pub fn clear(&self) {
        self.registries.write().clear();
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Registry>> {
        self.registries.read().iter().find(|r| r.id() == id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Registry>> {
        self.registries.read().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.registries.read().iter().map(|r| r.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.read().is_empty()
    }

    /// First provider claiming `image`.
    pub fn find_for(&self, image: &Image) -> Option<Arc<dyn Registry>> {
        let registries = self.registries.read();
        let mut matching = registries.iter().filter(|r| r.matches(image));
        let first = matching.next().cloned()?;
        let others: Vec<String> = matching.map(|r| r.id()).collect();
        if !others.is_empty() {
            tracing::warn!(
                image = %image.name,
                registry_url = %image.registry.url,
                chosen = %first.id(),
                ignored = ?others,
                "several registries match image"
            );
        }
        Some(first)
    }

    /// Rewrite `image` for its provider and record the provider id on it.
    ///
    /// Unclaimed images keep their URL and get the `unknown` registry name.
    pub fn normalize(&self, image: Image) -> Image {
        match self.find_for(&image) {
            Some(registry) => {
                let mut normalized = registry.normalize_image(image);
                normalized.registry.name = registry.id();
                normalized
            }
            None => {
                let mut image = image;
                image.registry.name = UNKNOWN_REGISTRY.to_string();
                image
            }
        }
    }
}
