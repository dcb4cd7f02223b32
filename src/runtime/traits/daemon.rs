// ABOUTME: Daemon identity queries: reachability and the engine version a watcher talks to.
// ABOUTME: Watchers probe once when started so a dead endpoint shows up before the first scan.

use super::sealed::Sealed;
use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub trait DaemonOps: Sealed + Send + Sync {
    async fn version(&self) -> Result<DaemonVersion, DaemonError>;

    async fn ping(&self) -> Result<(), DaemonError>;
}

/// Engine version as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonVersion {
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}

impl fmt::Display for DaemonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (API {}, {}/{})",
            self.version, self.api_version, self.os, self.arch
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Nothing answered, or the connection broke mid-request.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered with an error status.
    #[error("daemon rejected the request: {0}")]
    Rejected(String),
}
