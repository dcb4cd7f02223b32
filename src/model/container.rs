// ABOUTME: Container and image records as produced by a watcher scan.
// ABOUTME: Validation fills presentation defaults and rejects records missing required fields.

use crate::types::{ContainerId, ImageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Registry name given to images no provider claimed.
pub const UNKNOWN_REGISTRY: &str = "unknown";
pub const DEFAULT_DISPLAY_ICON: &str = "mdi:docker";
pub const DEFAULT_STATUS: &str = "unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("container field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("container field `{field}` is not an RFC 3339 date: {value}")]
    InvalidDate { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistry {
    /// Id of the provider that claimed the image, or `unknown`.
    pub name: String,
    /// Registry endpoint; `https://host/v2` once normalized.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTag {
    pub value: String,
    pub is_semver: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigest {
    pub watch_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_digest: Option<String>,
}

/// Registry-qualified description of a container's image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: ImageId,
    pub registry: ImageRegistry,
    /// Repository path, e.g. `library/nginx`.
    pub name: String,
    pub tag: ImageTag,
    pub digest: ImageDigest,
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Newest version found remotely for a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// One watched container instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub display_icon: String,
    #[serde(default)]
    pub status: String,
    /// Name of the watcher that owns this container.
    pub watcher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_exclude: Option<String>,
    pub image: Image,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ContainerResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Container {
    /// Business id: `<watcher>_<name>`.
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.watcher, self.name)
    }

    /// True when `previous` is absent or carries a different result.
    pub fn result_changed(&self, previous: Option<&Container>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        let current = self.result.as_ref();
        let before = previous.result.as_ref();
        current.and_then(|r| r.tag.as_deref()) != before.and_then(|r| r.tag.as_deref())
            || current.and_then(|r| r.digest.as_deref()) != before.and_then(|r| r.digest.as_deref())
            || current.and_then(|r| r.created_at.as_deref())
                != before.and_then(|r| r.created_at.as_deref())
    }

    pub fn update_available(&self) -> bool {
        super::update_available(self)
    }

    pub fn update_kind(&self) -> super::UpdateKind {
        super::update_kind(self)
    }

    /// Check required fields and fill presentation defaults.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        require(self.id.as_str(), "id")?;
        require(&self.name, "name")?;
        require(&self.watcher, "watcher")?;
        require(self.image.id.as_str(), "image.id")?;
        require(&self.image.registry.name, "image.registry.name")?;
        require(&self.image.name, "image.name")?;
        require(&self.image.tag.value, "image.tag.value")?;
        require(&self.image.architecture, "image.architecture")?;
        require(&self.image.os, "image.os")?;
        require_date(self.image.created_at.as_deref(), "image.createdAt")?;

        if let Some(ref result) = self.result {
            if let Some(ref tag) = result.tag {
                require(tag, "result.tag")?;
            }
            require_date(result.created_at.as_deref(), "result.createdAt")?;
        }
        if let Some(ref error) = self.error {
            require(&error.message, "error.message")?;
        }

        if self.display_name.is_empty() {
            self.display_name = self.name.clone();
        }
        if self.display_icon.is_empty() {
            self.display_icon = DEFAULT_DISPLAY_ICON.to_string();
        }
        if self.status.is_empty() {
            self.status = DEFAULT_STATUS.to_string();
        }
        Ok(self)
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

fn require_date(value: Option<&str>, field: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(v) if chrono::DateTime::parse_from_rfc3339(v).is_err() => {
            Err(ValidationError::InvalidDate {
                field,
                value: v.to_string(),
            })
        }
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::container;
    use super::*;

    #[test]
    fn validate_fills_defaults() {
        let c = container("c1", "1.0.0").validate().unwrap();
        assert_eq!(c.display_name, "name-c1");
        assert_eq!(c.display_icon, DEFAULT_DISPLAY_ICON);
        assert_eq!(c.status, "running");
    }

    #[test]
    fn validate_rejects_missing_platform() {
        let mut c = container("c1", "1.0.0");
        c.image.architecture.clear();
        assert_eq!(
            c.validate(),
            Err(ValidationError::EmptyField("image.architecture"))
        );
    }

    #[test]
    fn validate_rejects_bad_dates() {
        let mut c = container("c1", "1.0.0");
        c.image.created_at = Some("yesterday".to_string());
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidDate { field: "image.createdAt", .. })
        ));
    }

    #[test]
    fn full_name_joins_watcher_and_name() {
        assert_eq!(container("c1", "1.0.0").full_name(), "local_name-c1");
    }

    #[test]
    fn result_changed_compares_tag_digest_and_date() {
        let mut previous = container("c1", "1.0.0");
        previous.result = Some(ContainerResult {
            tag: Some("1.1.0".to_string()),
            ..Default::default()
        });
        let mut current = previous.clone();
        assert!(!current.result_changed(Some(&previous)));
        assert!(current.result_changed(None));

        current.result = Some(ContainerResult {
            tag: Some("1.1.0".to_string()),
            digest: Some("sha256:new".to_string()),
            created_at: None,
        });
        assert!(current.result_changed(Some(&previous)));
    }
}
