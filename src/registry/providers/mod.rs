// ABOUTME: Registry provider implementations and the helpers they share.
// ABOUTME: Config parsing, secret resolution, masking and endpoint normalization live here.

mod acr;
mod custom;
mod ecr;
mod gcr;
mod ghcr;
mod gitea;
mod gitlab;
mod hub;
mod quay;

pub use acr::Acr;
pub use custom::{BasicCredentials, Custom};
pub use ecr::Ecr;
pub use gcr::Gcr;
pub use ghcr::{Ghcr, GhcrFlavor};
pub use gitea::{Gitea, GiteaFlavor};
pub use gitlab::Gitlab;
pub use hub::Hub;
pub use quay::Quay;

use super::RegistryError;
use crate::config::ConfigValue;
use crate::model::Image;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;

/// Deserialize a provider configuration; `null` and `""` mean anonymous.
pub(crate) fn parse_config<T: DeserializeOwned + Default>(
    kind: &str,
    value: &serde_yaml::Value,
) -> Result<T, RegistryError> {
    match value {
        serde_yaml::Value::Null => Ok(T::default()),
        serde_yaml::Value::String(s) if s.is_empty() => Ok(T::default()),
        other => serde_yaml::from_value(other.clone())
            .map_err(|e| RegistryError::invalid(kind, e.to_string())),
    }
}

/// Resolve an optional secret; empty values count as unset.
pub(crate) fn resolve(kind: &str, value: &Option<ConfigValue>) -> Result<Option<String>, RegistryError> {
    match value {
        None => Ok(None),
        Some(value) => value
            .resolve()
            .map(|resolved| Some(resolved).filter(|v| !v.is_empty()))
            .map_err(|e| RegistryError::invalid(kind, e.to_string())),
    }
}

pub(crate) fn require(kind: &str, field: &str, value: Option<String>) -> Result<String, RegistryError> {
    value.ok_or_else(|| RegistryError::invalid(kind, format!("`{field}` is required")))
}

/// Keep the first and last character, star the rest.
pub fn mask(value: Option<&str>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 2 {
        return Some("*".repeat(chars.len()));
    }
    let mut masked = String::with_capacity(value.len());
    masked.push(chars[0]);
    masked.push_str(&"*".repeat(chars.len() - 2));
    masked.push(chars[chars.len() - 1]);
    Some(masked)
}

/// `base64(login:password)`.
pub fn base64_credentials(login: &str, password: &str) -> String {
    STANDARD.encode(format!("{login}:{password}"))
}

pub(crate) fn is_base64(value: &str) -> bool {
    STANDARD.decode(value).is_ok()
}

/// Rewrite a bare registry host to `https://<host>/v2`.
pub(crate) fn https_v2(mut image: Image) -> Image {
    if !image.registry.url.starts_with("https://") {
        image.registry.url = format!("https://{}/v2", image.registry.url);
    }
    image
}

pub(crate) fn host_ends_with(image: &Image, suffix: &str) -> bool {
    image.registry.url.ends_with(suffix)
}

pub(crate) fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}
