// ABOUTME: Per-watcher configuration: runtime endpoint, scan schedule and watching defaults.
// ABOUTME: Durations accept humantime strings such as `5s` or `1m`.

use super::WatcherError;
use crate::runtime::{DOCKER_PORT, DOCKER_SOCKET, RuntimeEndpoint, TlsFiles};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CRON: &str = "0 * * * *";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// Unix socket of the runtime; ignored when `host` is set.
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cafile: Option<PathBuf>,

    #[serde(default)]
    pub certfile: Option<PathBuf>,

    #[serde(default)]
    pub keyfile: Option<PathBuf>,

    #[serde(default = "default_cron")]
    pub cron: String,

    #[serde(default = "default_true")]
    pub watchbydefault: bool,

    #[serde(default)]
    pub watchall: bool,

    #[serde(default = "default_true")]
    pub watchevents: bool,

    #[serde(default = "default_true")]
    pub watchatstart: bool,

    /// Quiet period after a create/destroy event before rescanning.
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,

    /// Delay before the startup scan.
    #[serde(default = "default_start_delay", with = "humantime_serde")]
    pub startdelay: Duration,
}

fn default_socket() -> PathBuf {
    PathBuf::from(DOCKER_SOCKET)
}

fn default_port() -> u16 {
    DOCKER_PORT
}

fn default_cron() -> String {
    DEFAULT_CRON.to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce() -> Duration {
    Duration::from_secs(5)
}

fn default_start_delay() -> Duration {
    Duration::from_secs(1)
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            host: None,
            port: DOCKER_PORT,
            cafile: None,
            certfile: None,
            keyfile: None,
            cron: default_cron(),
            watchbydefault: true,
            watchall: false,
            watchevents: true,
            watchatstart: true,
            debounce: default_debounce(),
            startdelay: default_start_delay(),
        }
    }
}

impl WatcherConfig {
    /// Where to reach the runtime.
    ///
    /// TLS is used only when all three of `cafile`, `certfile` and `keyfile`
    /// are given; a partial set is an error.
    pub fn endpoint(&self) -> Result<RuntimeEndpoint, WatcherError> {
        let Some(ref host) = self.host else {
            return Ok(RuntimeEndpoint::Socket(self.socket.clone()));
        };
        let tls = match (&self.cafile, &self.certfile, &self.keyfile) {
            (None, None, None) => None,
            (Some(ca), Some(cert), Some(key)) => Some(TlsFiles {
                ca: ca.clone(),
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => {
                return Err(WatcherError::InvalidConfiguration(
                    "cafile, certfile and keyfile must be set together".to_string(),
                ));
            }
        };
        Ok(RuntimeEndpoint::Tcp {
            host: host.clone(),
            port: self.port,
            tls,
        })
    }
}
