// ABOUTME: Where a runtime lives: a local socket or a TCP host with optional TLS material.
// ABOUTME: Watchers build one endpoint each from their configuration.

use std::fmt;
use std::path::PathBuf;

/// Default Docker socket path.
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Default Docker TCP port.
pub const DOCKER_PORT: u16 = 2375;

/// Client certificate material for a TLS-protected daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// A container runtime connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEndpoint {
    Socket(PathBuf),
    Tcp {
        host: String,
        port: u16,
        tls: Option<TlsFiles>,
    },
}

impl Default for RuntimeEndpoint {
    fn default() -> Self {
        RuntimeEndpoint::Socket(PathBuf::from(DOCKER_SOCKET))
    }
}

impl fmt::Display for RuntimeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEndpoint::Socket(path) => write!(f, "unix://{}", path.display()),
            RuntimeEndpoint::Tcp { host, port, tls: None } => write!(f, "tcp://{host}:{port}"),
            RuntimeEndpoint::Tcp { host, port, tls: Some(_) } => write!(f, "tcp+tls://{host}:{port}"),
        }
    }
}
