// ABOUTME: Image inspection trait for container runtimes.
// ABOUTME: Exposes the metadata a watcher needs to describe a container's image.

use super::sealed::Sealed;
use async_trait::async_trait;

/// Image operations.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Inspect an image by id or reference.
    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails, ImageError>;
}

/// Inspected image metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub id: String,
    pub repo_tags: Vec<String>,
    /// `name@sha256:...` entries.
    pub repo_digests: Vec<String>,
    pub architecture: String,
    pub os: String,
    pub variant: Option<String>,
    /// RFC 3339 creation date as reported by the runtime.
    pub created: Option<String>,
}

impl ImageDetails {
    /// Digest part of the first repo digest.
    pub fn repo_digest(&self) -> Option<&str> {
        self.repo_digests
            .first()
            .and_then(|full| full.split_once('@'))
            .map(|(_, digest)| digest)
    }
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
