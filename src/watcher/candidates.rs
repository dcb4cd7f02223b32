// ABOUTME: Tag candidate selection: which remote tags are newer versions of the running tag.
// ABOUTME: Include/exclude filters first, then semver-only, strictly greater, highest first.

use super::WatcherError;
use crate::model::Container;
use crate::tag;
use regex::Regex;
use std::cmp::Ordering;

/// Remote tags that would be an update for `container`, highest first.
///
/// Non-semver images never get tag candidates; only their digest is compared.
/// The transform rule applies to both sides of every comparison, the returned
/// tags are the raw remote values.
pub fn select_candidates(container: &Container, tags: &[String]) -> Result<Vec<String>, WatcherError> {
    let include = compile(container.include_tags.as_deref())?;
    let exclude = compile(container.exclude_tags.as_deref())?;

    let filtered: Vec<&String> = tags
        .iter()
        .filter(|t| include.as_ref().is_none_or(|re| re.is_match(t)))
        .filter(|t| exclude.as_ref().is_none_or(|re| !re.is_match(t)))
        .collect();

    if !container.image.tag.is_semver {
        return Ok(Vec::new());
    }
    if filtered.is_empty() {
        tracing::warn!(
            container = %container.full_name(),
            "no tags left after filtering; check the include/exclude patterns"
        );
    }

    let transform = container.transform_tags.as_deref();
    let Some(local) = tag::parse(&tag::transform(transform, &container.image.tag.value)) else {
        return Ok(Vec::new());
    };

    let mut candidates: Vec<(semver::Version, &String)> = filtered
        .into_iter()
        .filter_map(|raw| tag::parse(&tag::transform(transform, raw)).map(|v| (v, raw)))
        .filter(|(version, _)| version.cmp_precedence(&local) == Ordering::Greater)
        .collect();
    candidates.sort_by(|(a, _), (b, _)| b.cmp_precedence(a));

    Ok(candidates.into_iter().map(|(_, raw)| raw.clone()).collect())
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>, WatcherError> {
    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| WatcherError::InvalidTagFilter {
                pattern: p.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::container;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn newer_semver_tags_highest_first() {
        let c = container("c1", "1.0.0");
        let selected = select_candidates(&c, &tags(&["1.0.0", "1.1.0", "2.0.0", "latest", "0.9"])).unwrap();
        assert_eq!(selected, tags(&["2.0.0", "1.1.0"]));
    }

    #[test]
    fn non_semver_images_get_no_candidates() {
        let c = container("c1", "latest");
        assert!(!c.image.tag.is_semver);
        assert!(select_candidates(&c, &tags(&["1.0.0", "2.0.0"])).unwrap().is_empty());
    }

    #[test]
    fn include_and_exclude_filters() {
        let mut c = container("c1", "1.0.0");
        c.include_tags = Some(r"^\d+\.\d+\.\d+$".to_string());
        c.exclude_tags = Some(r"^2\.".to_string());
        let selected =
            select_candidates(&c, &tags(&["1.2.0", "2.0.0", "1.3.0-rc.1", "1.1.0"])).unwrap();
        assert_eq!(selected, tags(&["1.2.0", "1.1.0"]));
    }

    #[test]
    fn transform_applies_to_both_sides() {
        let mut c = container("c1", "1.2.3-ls45");
        c.transform_tags = Some(r"^(\d+\.\d+\.\d+)-ls(\d+)$ => $1-$2".to_string());
        let selected =
            select_candidates(&c, &tags(&["1.2.3-ls44", "1.2.3-ls46", "1.2.4-ls1"])).unwrap();
        assert_eq!(selected, tags(&["1.2.4-ls1", "1.2.3-ls46"]));
    }

    #[test]
    fn prereleases_rank_below_releases() {
        let c = container("c1", "1.0.0");
        let selected = select_candidates(&c, &tags(&["2.0.0-rc.1", "2.0.0", "1.5.0"])).unwrap();
        assert_eq!(selected, tags(&["2.0.0", "2.0.0-rc.1", "1.5.0"]));
    }

    #[test]
    fn invalid_filter_is_an_error() {
        let mut c = container("c1", "1.0.0");
        c.include_tags = Some("(".to_string());
        assert!(matches!(
            select_candidates(&c, &tags(&["1.1.0"])),
            Err(WatcherError::InvalidTagFilter { .. })
        ));
    }
}
