// ABOUTME: Event bus connecting watchers and the store to downstream consumers.
// ABOUTME: Every subscriber receives every event published after it subscribed, in publish order.

use crate::model::{Container, ContainerReport};
use crate::types::ContainerId;
use tokio::sync::broadcast;

/// Events buffered per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// Engine events.
#[derive(Debug, Clone)]
pub enum Event {
    /// A container was stored for the first time.
    ContainerAdded(Container),
    /// A stored container was replaced.
    ContainerUpdated(Container),
    /// A container left the store.
    ContainerRemoved(Container),
    /// Outcome of one container in a scan.
    ContainerReport(ContainerReport),
    /// All outcomes of one scan.
    ContainerReports(Vec<ContainerReport>),
    /// A watcher started a scan.
    WatcherStart { watcher: String },
    /// A watcher finished a scan.
    WatcherStop { watcher: String },
}

impl Event {
    /// Short event name, e.g. `container-added`.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ContainerAdded(_) => "container-added",
            Event::ContainerUpdated(_) => "container-updated",
            Event::ContainerRemoved(_) => "container-removed",
            Event::ContainerReport(_) => "container-report",
            Event::ContainerReports(_) => "container-reports",
            Event::WatcherStart { .. } => "watcher-start",
            Event::WatcherStop { .. } => "watcher-stop",
        }
    }

    /// Id of the container the event is about, if any.
    pub fn container_id(&self) -> Option<&ContainerId> {
        match self {
            Event::ContainerAdded(c) | Event::ContainerUpdated(c) | Event::ContainerRemoved(c) => {
                Some(&c.id)
            }
            Event::ContainerReport(report) => Some(&report.container.id),
            _ => None,
        }
    }
}

/// Publish/subscribe fan-out for [`Event`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event; returns how many subscribers will see it.
    pub fn publish(&self, event: Event) -> usize {
        tracing::trace!(event = event.name(), "publishing event");
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn container_added(&self, container: &Container) {
        self.publish(Event::ContainerAdded(container.clone()));
    }

    pub fn container_updated(&self, container: &Container) {
        self.publish(Event::ContainerUpdated(container.clone()));
    }

    pub fn container_removed(&self, container: &Container) {
        self.publish(Event::ContainerRemoved(container.clone()));
    }

    pub fn container_report(&self, report: &ContainerReport) {
        self.publish(Event::ContainerReport(report.clone()));
    }

    pub fn container_reports(&self, reports: &[ContainerReport]) {
        self.publish(Event::ContainerReports(reports.to_vec()));
    }

    pub fn watcher_start(&self, watcher: &str) {
        self.publish(Event::WatcherStart {
            watcher: watcher.to_string(),
        });
    }

    pub fn watcher_stop(&self, watcher: &str) {
        self.publish(Event::WatcherStop {
            watcher: watcher.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
