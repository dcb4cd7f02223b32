// ABOUTME: Placeholder-only template rendering for links, titles and bodies.
// ABOUTME: Substitutes `${name}` from a fixed set of names; there is no expression evaluation.

use crate::model::{Container, link, result_link};
use std::collections::BTreeMap;
use thiserror::Error;

/// Names available to container link templates.
pub const LINK_PLACEHOLDERS: &[&str] = &[
    "original",
    "raw",
    "transformed",
    "major",
    "minor",
    "patch",
    "prerelease",
];

/// Names available to templates rendered against a whole container.
pub const CONTAINER_PLACEHOLDERS: &[&str] = &[
    "container.id",
    "container.name",
    "container.displayName",
    "container.watcher",
    "container.status",
    "container.link",
    "container.image.name",
    "container.image.registry.name",
    "container.image.tag.value",
    "container.image.digest.value",
    "container.result.tag",
    "container.result.digest",
    "container.result.link",
    "container.error.message",
    "container.updateAvailable",
    "container.updateKind.kind",
    "container.updateKind.localValue",
    "container.updateKind.remoteValue",
    "container.updateKind.semverDiff",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(&'static str),
}

/// A parsed template whose placeholders were checked against an allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str, allowed: &[&'static str]) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let name = after[..end].trim();
            let known = allowed
                .iter()
                .copied()
                .find(|candidate| *candidate == name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(known));
            let consumed = start + 2 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Render with `vars`; placeholders without a value render empty.
    pub fn render(&self, vars: &TemplateVars) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(name) => vars.get(name).unwrap_or(""),
            })
            .collect()
    }
}

/// Values bound to placeholder names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    values: BTreeMap<&'static str, String>,
}

impl TemplateVars {
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn set_opt(&mut self, name: &'static str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.values.insert(name, value.into());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Bind every [`CONTAINER_PLACEHOLDERS`] name that has a value for `container`.
fn container_vars(container: &Container) -> TemplateVars {
    let kind = container.update_kind();
    let result = container.result.as_ref();
    let mut vars = TemplateVars::default();
    vars.set("container.id", container.id.as_str())
        .set("container.name", container.name.as_str())
        .set("container.displayName", container.display_name.as_str())
        .set("container.watcher", container.watcher.as_str())
        .set("container.status", container.status.as_str())
        .set_opt("container.link", link(container))
        .set("container.image.name", container.image.name.as_str())
        .set("container.image.registry.name", container.image.registry.name.as_str())
        .set("container.image.tag.value", container.image.tag.value.as_str())
        .set_opt("container.image.digest.value", container.image.digest.value.as_deref())
        .set_opt("container.result.tag", result.and_then(|r| r.tag.as_deref()))
        .set_opt("container.result.digest", result.and_then(|r| r.digest.as_deref()))
        .set_opt("container.result.link", result_link(container))
        .set_opt(
            "container.error.message",
            container.error.as_ref().map(|e| e.message.as_str()),
        )
        .set("container.updateAvailable", container.update_available().to_string())
        .set("container.updateKind.kind", kind.kind.to_string())
        .set_opt("container.updateKind.localValue", kind.local_value)
        .set_opt("container.updateKind.remoteValue", kind.remote_value)
        .set_opt(
            "container.updateKind.semverDiff",
            kind.semver_diff.map(|d| d.to_string()),
        );
    vars
}

/// Parse and render `source` against a container in one step.
pub fn render_container(source: &str, container: &Container) -> Result<String, TemplateError> {
    let template = Template::parse(source, CONTAINER_PLACEHOLDERS)?;
    Ok(template.render(&container_vars(container)))
}
