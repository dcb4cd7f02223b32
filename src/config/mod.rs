// ABOUTME: Configuration types and parsing for tagwatch.yml.
// ABOUTME: Declares logging, watchers and registry providers; secrets may come from env or files.

mod init;
mod value;

pub use init::{init_config, template};
pub use value::ConfigValue;

use crate::error::{Error, Result};
use crate::model::Container;
use crate::template::{self, CONTAINER_PLACEHOLDERS, Template};
use crate::watcher::WatcherConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "tagwatch.yml";
pub const CONFIG_FILENAME_ALT: &str = "tagwatch.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".tagwatch/config.yml";

/// Watcher registered when the configuration declares none.
pub const DEFAULT_WATCHER: &str = "local";

/// Provider configurations by kind, then instance name.
pub type RegistriesConfig = BTreeMap<String, BTreeMap<String, serde_yaml::Value>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub watchers: BTreeMap<String, WatcherConfig>,

    #[serde(default)]
    pub registries: RegistriesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line logged by `run` for each new update, with `${container.*}` placeholders.
    #[serde(default)]
    pub update_message: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            update_message: None,
        }
    }
}

impl LogConfig {
    /// The configured update message rendered for `container`, if any.
    pub fn render_update(&self, container: &Container) -> Option<String> {
        let source = self.update_message.as_deref()?;
        match template::render_container(source, container) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("cannot render log.update_message: {e}");
                None
            }
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults configuration.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First configuration file present in `dir`.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Configured watchers, or the default `local` one.
    pub fn watchers(&self) -> BTreeMap<String, WatcherConfig> {
        if self.watchers.is_empty() {
            BTreeMap::from([(DEFAULT_WATCHER.to_string(), WatcherConfig::default())])
        } else {
            self.watchers.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref message) = self.log.update_message {
            Template::parse(message, CONTAINER_PLACEHOLDERS)
                .map_err(|e| Error::InvalidConfig(format!("log.update_message: {e}")))?;
        }
        for name in self.watchers.keys() {
            validate_name("watcher", name)?;
        }
        for (kind, instances) in &self.registries {
            validate_name("registry type", kind)?;
            for name in instances.keys() {
                validate_name("registry", name)?;
            }
        }
        Ok(())
    }
}

/// Component names end up in ids such as `hub.public`, so dots are not allowed.
fn validate_name(what: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{what} name {name:?} may only contain letters, digits, '-' and '_'"
        )))
    }
}
