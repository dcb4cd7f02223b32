// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, ImageOps, EventOps and DaemonOps.

mod container;
mod daemon;
mod events;
mod image;
pub(crate) mod sealed;

pub use container::{ContainerDetails, ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use daemon::{DaemonError, DaemonOps, DaemonVersion};
pub use events::{ContainerEvent, EventError, EventOps, EventStream, WATCHED_ACTIONS};
pub use image::{ImageDetails, ImageError, ImageOps};
