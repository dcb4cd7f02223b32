// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates a commented tagwatch.yml template.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

/// Write the template configuration into `dir`; refuses to overwrite unless `force`.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, template())?;
    Ok(config_path)
}

pub fn template() -> &'static str {
    r#"log:
  level: info
  # update_message: "${container.displayName}: ${container.updateKind.localValue} -> ${container.updateKind.remoteValue}"

watchers:
  local:
    socket: /var/run/docker.sock
    cron: "0 * * * *"
    watchbydefault: true
    watchall: false
    watchevents: true
    watchatstart: true
  # remote:
  #   host: 10.0.0.2
  #   port: 2376
  #   cafile: /certs/ca.pem
  #   certfile: /certs/cert.pem
  #   keyfile: /certs/key.pem

registries:
  hub:
    public: ""
  # custom:
  #   lan:
  #     url: https://registry.lan
  #     login: me
  #     password:
  #       env: REGISTRY_PASSWORD
"#
}
