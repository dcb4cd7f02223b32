// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Covers building a client for an endpoint and probing the daemon behind it.

use snafu::Snafu;

use super::traits::DaemonError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("cannot create runtime client for {endpoint}: {source}"))]
    Client {
        endpoint: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("runtime at {endpoint} did not answer the probe: {source}"))]
    Probe {
        endpoint: String,
        source: DaemonError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Bad address or unreadable TLS files.
    InvalidEndpoint,
    Unreachable,
    /// The daemon is up but refused the request.
    Rejected,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Client { .. } => RuntimeErrorKind::InvalidEndpoint,
            RuntimeError::Probe {
                source: DaemonError::Unreachable(_),
                ..
            } => RuntimeErrorKind::Unreachable,
            RuntimeError::Probe {
                source: DaemonError::Rejected(_),
                ..
            } => RuntimeErrorKind::Rejected,
        }
    }
}
