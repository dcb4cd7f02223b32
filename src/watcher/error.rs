// ABOUTME: Errors raised while configuring a watcher or processing one container.
// ABOUTME: Per-container errors are rendered into `container.error.message`.

use crate::registry::RegistryError;
use crate::runtime::{ContainerError, EventError, ImageError, RuntimeError};
use crate::store::StoreError;
use crate::types::ParseImageReferenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("invalid cron expression {expression:?}: {message}")]
    InvalidCron { expression: String, message: String },

    #[error("invalid watcher configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid tag filter {pattern:?}: {source}")]
    InvalidTagFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot parse image reference {reference:?}: {source}")]
    ImageReference {
        reference: String,
        #[source]
        source: ParseImageReferenceError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Events(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
