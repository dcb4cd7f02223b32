// ABOUTME: In-memory runtime for unit tests of the watcher.
// ABOUTME: Containers, images and events are scripted by the test.

use super::traits::sealed::Sealed;
use super::traits::{
    ContainerDetails, ContainerError, ContainerEvent, ContainerFilters, ContainerOps,
    ContainerSummary, DaemonError, DaemonOps, DaemonVersion, EventError, EventOps, EventStream,
    ImageDetails, ImageError, ImageOps,
};
use crate::types::ContainerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<Vec<ContainerSummary>>,
    pub images: Mutex<HashMap<String, ImageDetails>>,
    pub fail_listing: Mutex<bool>,
    events: Mutex<Option<mpsc::UnboundedReceiver<ContainerEvent>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running container using `image` and register the image metadata.
    pub fn add_container(&self, id: &str, name: &str, image: &str, labels: &[(&str, &str)]) {
        self.containers.lock().push(ContainerSummary {
            id: ContainerId::new(id),
            name: name.to_string(),
            image: image.to_string(),
            state: "running".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    pub fn add_image(&self, reference: &str, details: ImageDetails) {
        self.images.lock().insert(reference.to_string(), details);
    }

    pub fn remove_container(&self, id: &str) {
        self.containers.lock().retain(|c| c.id.as_str() != id);
    }

    pub fn set_state(&self, id: &str, state: &str) {
        for container in self.containers.lock().iter_mut() {
            if container.id.as_str() == id {
                container.state = state.to_string();
            }
        }
    }

    /// Sender feeding the next `container_events` subscription.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ContainerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(rx);
        tx
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl DaemonOps for FakeRuntime {
    async fn version(&self) -> Result<DaemonVersion, DaemonError> {
        if *self.fail_listing.lock() {
            return Err(DaemonError::Unreachable("daemon unavailable".to_string()));
        }
        Ok(DaemonVersion {
            version: "fake".to_string(),
            api_version: "1.45".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), DaemonError> {
        self.version().await.map(|_| ())
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        if *self.fail_listing.lock() {
            return Err(ContainerError::Runtime("daemon unavailable".to_string()));
        }
        Ok(self
            .containers
            .lock()
            .iter()
            .filter(|c| filters.all || c.state == "running")
            .cloned()
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, ContainerError> {
        self.containers
            .lock()
            .iter()
            .find(|c| &c.id == id)
            .map(|c| ContainerDetails {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                status: c.state.clone(),
                labels: c.labels.clone(),
            })
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError> {
        self.images
            .lock()
            .get(reference)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))
    }
}

#[async_trait]
impl EventOps for FakeRuntime {
    async fn container_events(&self) -> Result<EventStream, EventError> {
        let rx = self
            .events
            .lock()
            .take()
            .ok_or_else(|| EventError::Subscribe("no event source".to_string()))?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (Ok(event), rx))
        });
        Ok(Box::pin(stream))
    }
}
