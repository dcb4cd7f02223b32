// ABOUTME: Container runtime access for watchers: listing, inspection and lifecycle events.
// ABOUTME: Capability traits are sealed; BollardRuntime is the production implementation.

mod bollard;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::{
    ContainerDetails, ContainerError, ContainerEvent, ContainerFilters, ContainerOps,
    ContainerSummary, DaemonError, DaemonOps, DaemonVersion, EventError, EventOps, EventStream,
    ImageDetails, ImageError, ImageOps, WATCHED_ACTIONS,
};
pub use types::{DOCKER_PORT, DOCKER_SOCKET, RuntimeEndpoint, TlsFiles};

/// Everything a watcher needs from a runtime.
pub trait WatchRuntime: ContainerOps + ImageOps + EventOps + DaemonOps {}

impl<T: ContainerOps + ImageOps + EventOps + DaemonOps> WatchRuntime for T {}
