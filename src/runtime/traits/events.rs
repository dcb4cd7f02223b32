// ABOUTME: Container lifecycle event subscription for container runtimes.
// ABOUTME: Streams create/destroy and state-transition events for containers.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Container actions a watcher subscribes to.
pub const WATCHED_ACTIONS: &[&str] = &[
    "create", "destroy", "start", "stop", "pause", "unpause", "die", "update",
];

/// Stream of container lifecycle events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ContainerEvent, EventError>> + Send>>;

/// Lifecycle event subscription.
#[async_trait]
pub trait EventOps: Sealed + Send + Sync {
    /// Subscribe to [`WATCHED_ACTIONS`] on containers.
    async fn container_events(&self) -> Result<EventStream, EventError>;
}

/// One container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    pub action: String,
    pub container_id: ContainerId,
}

impl ContainerEvent {
    /// Whether the event changes the set of containers rather than one container's state.
    pub fn is_structural(&self) -> bool {
        matches!(self.action.as_str(), "create" | "destroy")
    }
}

/// Errors from event subscription.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("cannot subscribe to events: {0}")]
    Subscribe(String),

    #[error("event stream error: {0}")]
    Stream(String),
}
