// ABOUTME: Container record storage consumed by watchers.
// ABOUTME: Records are validated on write; every write is announced on the event bus.

mod memory;

pub use memory::MemoryStore;

use crate::model::{Container, ValidationError, flatten, flatten_key};
use crate::types::ContainerId;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid container {id}: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ValidationError,
    },

    #[error("container {0} is already in the store")]
    Duplicate(String),
}

/// Equality filter over flattened container fields.
///
/// Keys may be given as flattened keys (`image_registry_name`) or dotted
/// paths (`image.registry.name`); both address the same field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerQuery {
    fields: BTreeMap<String, String>,
}

impl ContainerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Containers owned by `watcher`.
    pub fn watcher(name: &str) -> Self {
        Self::new().field("watcher", name)
    }

    pub fn field(mut self, path: &str, value: impl Into<String>) -> Self {
        self.fields.insert(flatten_key(path), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, container: &Container) -> bool {
        if self.fields.is_empty() {
            return true;
        }
        let flat = flatten(container);
        self.fields
            .iter()
            .all(|(key, value)| flat.get(key) == Some(value))
    }
}

/// Persistence for container records.
pub trait ContainerStore: Send + Sync {
    fn get_container(&self, id: &ContainerId) -> Option<Container>;

    /// Matching containers ordered by watcher, name, then tag.
    fn get_containers(&self, query: &ContainerQuery) -> Vec<Container>;

    fn insert_container(&self, container: Container) -> Result<Container, StoreError>;

    /// Replace the record with the same id, inserting it if absent.
    fn update_container(&self, container: Container) -> Result<Container, StoreError>;

    /// Remove a record; returns it when it existed.
    fn delete_container(&self, id: &ContainerId) -> Option<Container>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::container;

    #[test]
    fn query_accepts_dotted_and_flat_keys() {
        let c = container("c1", "1.0.0");
        assert!(ContainerQuery::new().matches(&c));
        assert!(ContainerQuery::watcher("local").matches(&c));
        assert!(!ContainerQuery::watcher("remote").matches(&c));
        assert!(
            ContainerQuery::new()
                .field("image.registry.name", "hub.public")
                .matches(&c)
        );
        assert!(
            ContainerQuery::new()
                .field("image_tag_is_semver", "true")
                .matches(&c)
        );
        assert!(
            !ContainerQuery::new()
                .field("image.tag.isSemver", "true")
                .field("watcher", "other")
                .matches(&c)
        );
    }
}
