// ABOUTME: Container read operations for container runtimes.
// ABOUTME: List and inspect containers; a watcher never mutates them.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Container inspection operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Include stopped containers.
    pub all: bool,
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Name without the leading slash.
    pub name: String,
    /// Image reference the container was created from; may be a bare `sha256:` id.
    pub image: String,
    /// Lowercase state, e.g. `running`.
    pub state: String,
    pub labels: HashMap<String, String>,
}

/// Inspected container.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    /// Lowercase state status, e.g. `exited`.
    pub status: String,
    pub labels: HashMap<String, String>,
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
