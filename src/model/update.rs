// ABOUTME: Derived container fields: update availability, update kind and rendered links.
// ABOUTME: Pure functions over a container record, recomputed on every read.

use super::Container;
use crate::tag::{self, SemverDiff};
use crate::template::{LINK_PLACEHOLDERS, Template, TemplateVars};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKindType {
    Tag,
    Digest,
    Unknown,
}

impl fmt::Display for UpdateKindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateKindType::Tag => "tag",
            UpdateKindType::Digest => "digest",
            UpdateKindType::Unknown => "unknown",
        })
    }
}

/// What kind of update separates the running image from the remote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKind {
    pub kind: UpdateKindType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver_diff: Option<SemverDiff>,
}

impl UpdateKind {
    pub fn unknown() -> Self {
        Self {
            kind: UpdateKindType::Unknown,
            local_value: None,
            remote_value: None,
            semver_diff: None,
        }
    }
}

/// Whether the remote result differs from what is running.
///
/// Digests are compared when digest watching is on and both are known.
/// Otherwise transformed tags are compared, and differing creation dates
/// (legacy v1 manifests) also count as an update.
pub fn update_available(container: &Container) -> bool {
    let Some(ref result) = container.result else {
        return false;
    };
    let image = &container.image;

    if image.digest.watch_enabled
        && let (Some(local), Some(remote)) = (&image.digest.value, &result.digest)
    {
        return local != remote;
    }

    let formula = container.transform_tags.as_deref();
    let local_tag = tag::transform(formula, &image.tag.value);
    let remote_tag = result.tag.as_deref().map(|t| tag::transform(formula, t));
    let mut available = remote_tag.as_deref() != Some(local_tag.as_str());

    if let (Some(local), Some(remote)) = (&image.created_at, &result.created_at) {
        available = available || !same_instant(local, remote);
    }
    available
}

fn same_instant(a: &str, b: &str) -> bool {
    match (
        chrono::DateTime::parse_from_rfc3339(a),
        chrono::DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Classify the available update; `unknown` when there is none.
pub fn update_kind(container: &Container) -> UpdateKind {
    let Some(ref result) = container.result else {
        return UpdateKind::unknown();
    };
    if !update_available(container) {
        return UpdateKind::unknown();
    }
    let image = &container.image;

    if result.tag.as_deref() != Some(image.tag.value.as_str()) {
        let semver_diff = if image.tag.is_semver {
            let formula = container.transform_tags.as_deref();
            let remote = result.tag.as_deref().unwrap_or_default();
            tag::diff(
                &tag::transform(formula, &image.tag.value),
                &tag::transform(formula, remote),
            )
            .unwrap_or(SemverDiff::Unknown)
        } else {
            SemverDiff::Unknown
        };
        return UpdateKind {
            kind: UpdateKindType::Tag,
            local_value: Some(image.tag.value.clone()),
            remote_value: result.tag.clone(),
            semver_diff: Some(semver_diff),
        };
    }

    if image.digest.value != result.digest {
        return UpdateKind {
            kind: UpdateKindType::Digest,
            local_value: image.digest.value.clone(),
            remote_value: result.digest.clone(),
            semver_diff: None,
        };
    }
    UpdateKind::unknown()
}

/// Link rendered for the running tag.
pub fn link(container: &Container) -> Option<String> {
    render_link(container, &container.image.tag.value)
}

/// Link rendered for the remote result tag.
pub fn result_link(container: &Container) -> Option<String> {
    let result = container.result.as_ref()?;
    render_link(container, result.tag.as_deref().unwrap_or_default())
}

fn render_link(container: &Container, original: &str) -> Option<String> {
    let source = container.link_template.as_deref()?;
    let template = match Template::parse(source, LINK_PLACEHOLDERS) {
        Ok(template) => template,
        Err(e) => {
            tracing::debug!(container = %container.full_name(), "invalid link template: {e}");
            return None;
        }
    };

    let transformed = tag::transform(container.transform_tags.as_deref(), original);
    let mut vars = TemplateVars::default();
    vars.set("original", original)
        .set("raw", original)
        .set("transformed", transformed.as_str());
    if container.image.tag.is_semver
        && let Some(version) = tag::parse(&transformed)
    {
        let prerelease = version
            .pre
            .as_str()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        vars.set("major", version.major.to_string())
            .set("minor", version.minor.to_string())
            .set("patch", version.patch.to_string())
            .set("prerelease", prerelease);
    }
    Some(template.render(&vars))
}
