// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to Docker (or any Docker-compatible API) over a unix socket, plain TCP or TLS.

use super::error::{ClientSnafu, RuntimeError};
use super::traits::sealed::Sealed;
use super::traits::{
    ContainerDetails, ContainerError, ContainerEvent, ContainerFilters, ContainerOps,
    ContainerSummary, DaemonError, DaemonOps, DaemonVersion, EventError, EventOps, EventStream,
    ImageDetails, ImageError, ImageOps, WATCHED_ACTIONS,
};
use super::types::RuntimeEndpoint;
use crate::types::ContainerId;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{EventsOptions, InspectContainerOptions, ListContainersOptions};
use futures::StreamExt;
use snafu::ResultExt;
use std::collections::HashMap;

/// Seconds before a runtime API call times out.
const CLIENT_TIMEOUT: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_daemon_error(e: bollard::errors::Error) -> DaemonError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => DaemonError::Rejected(format!("HTTP {status_code}: {message}")),
        other => DaemonError::Unreachable(other.to_string()),
    }
}

fn map_image_inspect_error(e: bollard::errors::Error, reference: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(reference.to_string())
        }
        _ => ImageError::Runtime(format!("failed to inspect {}: {}", reference, e)),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
pub struct BollardRuntime {
    client: Docker,
    endpoint: RuntimeEndpoint,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, endpoint: RuntimeEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// Build a client for `endpoint`. Does not contact the daemon.
    pub fn connect(endpoint: &RuntimeEndpoint) -> Result<Self, RuntimeError> {
        let client = match endpoint {
            RuntimeEndpoint::Socket(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                CLIENT_TIMEOUT,
                bollard::API_DEFAULT_VERSION,
            ),
            RuntimeEndpoint::Tcp {
                host,
                port,
                tls: None,
            } => Docker::connect_with_http(
                &format!("tcp://{host}:{port}"),
                CLIENT_TIMEOUT,
                bollard::API_DEFAULT_VERSION,
            ),
            RuntimeEndpoint::Tcp {
                host,
                port,
                tls: Some(tls),
            } => Docker::connect_with_ssl(
                &format!("tcp://{host}:{port}"),
                &tls.key,
                &tls.cert,
                &tls.ca,
                CLIENT_TIMEOUT,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .context(ClientSnafu {
            endpoint: endpoint.to_string(),
        })?;
        Ok(Self::new(client, endpoint.clone()))
    }

    /// The endpoint this runtime was built for.
    pub fn endpoint(&self) -> &RuntimeEndpoint {
        &self.endpoint
    }
}

// Implement Sealed trait to allow runtime trait implementations
impl Sealed for BollardRuntime {}

#[async_trait]
impl DaemonOps for BollardRuntime {
    async fn version(&self) -> Result<DaemonVersion, DaemonError> {
        let version = self.client.version().await.map_err(map_daemon_error)?;
        Ok(DaemonVersion {
            version: version.version.unwrap_or_default(),
            api_version: version
                .api_version
                .unwrap_or_else(|| bollard::API_DEFAULT_VERSION.to_string()),
            os: version.os.unwrap_or_default(),
            arch: version.arch.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), DaemonError> {
        self.client.ping().await.map_err(map_daemon_error)?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError> {
        let image = self
            .client
            .inspect_image(reference)
            .await
            .map_err(|e| map_image_inspect_error(e, reference))?;

        Ok(ImageDetails {
            id: image.id.unwrap_or_default(),
            repo_tags: image.repo_tags.unwrap_or_default(),
            repo_digests: image.repo_digests.unwrap_or_default(),
            architecture: image.architecture.unwrap_or_default(),
            os: image.os.unwrap_or_default(),
            variant: image.variant.filter(|v| !v.is_empty()),
            created: image.created.map(|dt| dt.to_string()),
        })
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let status = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| format!("{:?}", s).to_lowercase())
            .unwrap_or_default();

        Ok(ContainerDetails {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            status,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        // Add label filters
        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl EventOps for BollardRuntime {
    async fn container_events(&self) -> Result<EventStream, EventError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        filters.insert(
            "event".to_string(),
            WATCHED_ACTIONS.iter().map(|a| a.to_string()).collect(),
        );

        let opts = EventsOptions {
            filters: Some(filters),
            ..Default::default()
        };

        let stream = self.client.events(Some(opts)).filter_map(|result| async move {
            match result {
                Ok(message) => {
                    let action = message.action?;
                    let id = message.actor.and_then(|actor| actor.id)?;
                    Some(Ok(ContainerEvent {
                        action,
                        container_id: ContainerId::new(id),
                    }))
                }
                Err(e) => Some(Err(EventError::Stream(e.to_string()))),
            }
        });

        Ok(Box::pin(stream))
    }
}
