// ABOUTME: Container labels that steer watching, tag filtering and presentation.
// ABOUTME: Label lookups treat an empty value the same as an absent label.

use std::collections::HashMap;

/// Should the container be watched (`true` | `false`).
pub const WATCH: &str = "tagwatch.watch";
/// Regex of tags to consider.
pub const TAG_INCLUDE: &str = "tagwatch.tag.include";
/// Regex of tags to ignore.
pub const TAG_EXCLUDE: &str = "tagwatch.tag.exclude";
/// `pattern => replacement` rule applied to tags before comparison.
pub const TAG_TRANSFORM: &str = "tagwatch.tag.transform";
/// Should the image digest be watched (`true` | `false`).
pub const WATCH_DIGEST: &str = "tagwatch.watch.digest";
/// Link template rendered against the running and the candidate version.
pub const LINK_TEMPLATE: &str = "tagwatch.link.template";
pub const DISPLAY_NAME: &str = "tagwatch.display.name";
pub const DISPLAY_ICON: &str = "tagwatch.display.icon";
/// Triggers allowed to fire for this container.
pub const TRIGGER_INCLUDE: &str = "tagwatch.trigger.include";
/// Triggers never allowed to fire for this container.
pub const TRIGGER_EXCLUDE: &str = "tagwatch.trigger.exclude";

/// Non-empty value of `label`.
pub fn get<'a>(labels: &'a HashMap<String, String>, label: &str) -> Option<&'a str> {
    labels
        .get(label)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// The `watch` label decides when set; otherwise the watcher default applies.
pub fn is_container_to_watch(label: Option<&str>, watch_by_default: bool) -> bool {
    match label.filter(|v| !v.is_empty()) {
        Some(value) => is_true(value),
        None => watch_by_default,
    }
}

/// Digests are watched by default for non-semver tags only; the label overrides either way.
pub fn is_digest_to_watch(label: Option<&str>, is_semver: bool) -> bool {
    match label.filter(|v| !v.is_empty()) {
        Some(value) => is_true(value),
        None => !is_semver,
    }
}
