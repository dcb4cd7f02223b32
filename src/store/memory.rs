// ABOUTME: In-process container store keyed by container id.

use super::{ContainerQuery, ContainerStore, StoreError};
use crate::event::EventBus;
use crate::model::Container;
use crate::types::ContainerId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Container records held in memory; lost on restart.
#[derive(Debug)]
pub struct MemoryStore {
    containers: RwLock<HashMap<ContainerId, Container>>,
    events: EventBus,
}

impl MemoryStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }
}

fn validate(container: Container) -> Result<Container, StoreError> {
    let id = container.id.to_string();
    container
        .validate()
        .map_err(|source| StoreError::Invalid { id, source })
}

impl ContainerStore for MemoryStore {
    fn get_container(&self, id: &ContainerId) -> Option<Container> {
        self.containers.read().get(id).cloned()
    }

    fn get_containers(&self, query: &ContainerQuery) -> Vec<Container> {
        let mut containers: Vec<Container> = self
            .containers
            .read()
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        containers.sort_by(|a, b| {
            a.watcher
                .cmp(&b.watcher)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.image.tag.value.cmp(&b.image.tag.value))
        });
        containers
    }

    fn insert_container(&self, container: Container) -> Result<Container, StoreError> {
        let container = validate(container)?;
        {
            let mut containers = self.containers.write();
            if containers.contains_key(&container.id) {
                return Err(StoreError::Duplicate(container.id.to_string()));
            }
            containers.insert(container.id.clone(), container.clone());
        }
        self.events.container_added(&container);
        Ok(container)
    }

    fn update_container(&self, container: Container) -> Result<Container, StoreError> {
        let container = validate(container)?;
        self.containers
            .write()
            .insert(container.id.clone(), container.clone());
        self.events.container_updated(&container);
        Ok(container)
    }

    fn delete_container(&self, id: &ContainerId) -> Option<Container> {
        let removed = self.containers.write().remove(id);
        if let Some(ref container) = removed {
            self.events.container_removed(container);
        }
        removed
    }
}
