// ABOUTME: Value types flowing through update detection: images, containers, results, reports.
// ABOUTME: Derived fields (update availability, kind, links) are computed on read, never stored.

mod container;
mod report;
mod update;

pub use container::{
    Container, ContainerResult, DEFAULT_DISPLAY_ICON, DEFAULT_STATUS, ErrorDetail, Image,
    ImageDigest, ImageRegistry, ImageTag, UNKNOWN_REGISTRY, ValidationError,
};
#[cfg(test)]
pub(crate) use container::fixtures;
pub use report::{ContainerReport, flatten, flatten_key, view};
pub use update::{
    UpdateKind, UpdateKindType, link, result_link, update_available, update_kind,
};
