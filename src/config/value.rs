// ABOUTME: Configuration values that may be literals or references to the environment or a file.
// ABOUTME: Registry credentials use these so secrets stay out of the config file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
    FromFile {
        file: PathBuf,
    },
}

impl ConfigValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            ConfigValue::Literal(s) => Ok(s.clone()),
            ConfigValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
            // Secret files usually end with a newline.
            ConfigValue::FromFile { file } => std::fs::read_to_string(file)
                .map(|content| content.trim_end_matches(['\r', '\n']).to_string())
                .map_err(|source| Error::SecretFile {
                    path: file.clone(),
                    source,
                }),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Literal(value.to_string())
    }
}
