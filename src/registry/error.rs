// ABOUTME: Error type shared by registry providers, the HTTP transport and the manifest resolver.
// ABOUTME: Messages end up on container records, so they name the failing request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid {provider} registry configuration: {message}")]
    InvalidConfiguration { provider: String, message: String },

    #[error("unknown registry provider type: {0}")]
    UnknownProvider(String),

    #[error("Unsupported Registry {0}")]
    Unsupported(String),

    #[error("cannot build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("cannot decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("authentication with {registry} failed: {message}")]
    Authentication { registry: String, message: String },

    #[error("response from {url} has no {header} header")]
    MissingHeader { url: String, header: &'static str },

    #[error("Unexpected error; no manifest found")]
    ManifestNotFound,
}

impl RegistryError {
    pub(crate) fn invalid(provider: &str, message: impl Into<String>) -> Self {
        RegistryError::InvalidConfiguration {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Whether the registry answered with a status code rather than failing to connect.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
