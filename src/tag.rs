// ABOUTME: Semver helpers for image tags: lenient parsing, ordering, diff kind and transform rules.
// ABOUTME: Every version comparison in the crate goes through this module.

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static COERCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,16})(?:\.(\d{1,16}))?(?:\.(\d{1,16}))?(?:$|[^\d])")
        .expect("coerce pattern is valid")
});

static TRANSFORM_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*=>\s*").expect("separator pattern is valid"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern is valid"));

/// Parse a tag as a semantic version.
///
/// Strict parsing is tried first after stripping a leading `v` or `=`.
/// Failing that, the first `major[.minor[.patch]]` run of digits is coerced
/// into a version, dropping anything after the patch number.
pub fn parse(raw: &str) -> Option<Version> {
    let cleaned = raw.trim().trim_start_matches(['v', 'V', '=']);
    if let Ok(version) = Version::parse(cleaned) {
        return Some(version);
    }
    coerce(raw)
}

fn coerce(raw: &str) -> Option<Version> {
    let captures = COERCE.captures(raw)?;
    let number = |index: usize| -> Option<u64> {
        match captures.get(index) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(number(1)?, number(2)?, number(3)?))
}

/// True when `candidate` parses and is strictly greater than `reference`.
pub fn is_greater(candidate: &str, reference: &str) -> bool {
    match (parse(candidate), parse(reference)) {
        (Some(c), Some(r)) => c.cmp_precedence(&r) == Ordering::Greater,
        _ => false,
    }
}

/// Release distance between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemverDiff {
    Major,
    Minor,
    Patch,
    Prerelease,
    Unknown,
}

impl fmt::Display for SemverDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SemverDiff::Major => "major",
            SemverDiff::Minor => "minor",
            SemverDiff::Patch => "patch",
            SemverDiff::Prerelease => "prerelease",
            SemverDiff::Unknown => "unknown",
        })
    }
}

/// Which release component separates two versions.
///
/// Returns `None` when either side does not parse or both are equal.
/// Moving to or between prereleases of a newer release reports the component
/// that changed, so `1.0.0 -> 2.0.0-rc.1` is `Major`.
pub fn diff(version1: &str, version2: &str) -> Option<SemverDiff> {
    let v1 = parse(version1)?;
    let v2 = parse(version2)?;
    let (low, high) = match v1.cmp_precedence(&v2) {
        Ordering::Equal => return None,
        Ordering::Less => (&v1, &v2),
        Ordering::Greater => (&v2, &v1),
    };

    // Leaving a prerelease for its final release.
    if !low.pre.is_empty() && high.pre.is_empty() {
        if low.minor == 0 && low.patch == 0 {
            return Some(SemverDiff::Major);
        }
        if (low.major, low.minor, low.patch) == (high.major, high.minor, high.patch) {
            return Some(if low.patch == 0 {
                SemverDiff::Minor
            } else {
                SemverDiff::Patch
            });
        }
    }

    Some(if v1.major != v2.major {
        SemverDiff::Major
    } else if v1.minor != v2.minor {
        SemverDiff::Minor
    } else if v1.patch != v2.patch {
        SemverDiff::Patch
    } else {
        SemverDiff::Prerelease
    })
}

/// A `pattern => replacement` rewrite applied to tags before comparison.
///
/// `$N` in the replacement is substituted with capture group `N`.
#[derive(Debug, Clone)]
pub struct TransformRule {
    pattern: Regex,
    replacement: String,
}

impl TransformRule {
    /// Compile a rule, returning `None` when the formula is malformed.
    pub fn parse(formula: &str) -> Option<Self> {
        let mut parts = TRANSFORM_SEPARATOR.splitn(formula, 2);
        let pattern = Regex::new(parts.next()?).ok()?;
        let replacement = parts.next()?.to_string();
        if !PLACEHOLDER.is_match(&replacement) {
            return None;
        }
        Some(Self {
            pattern,
            replacement,
        })
    }

    /// Rewrite `tag`, falling back to the tag itself when it does not match.
    pub fn apply(&self, tag: &str) -> String {
        let Some(captures) = self.pattern.captures(tag) else {
            return tag.to_string();
        };
        let mut missing = false;
        let rewritten = PLACEHOLDER.replace_all(&self.replacement, |placeholder: &regex::Captures<'_>| {
            let group = placeholder[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| captures.get(index));
            match group {
                Some(m) => m.as_str().to_string(),
                None => {
                    missing = true;
                    String::new()
                }
            }
        });
        if missing {
            tag.to_string()
        } else {
            rewritten.into_owned()
        }
    }
}

/// Apply an optional transform formula to a tag.
pub fn transform(formula: Option<&str>, tag: &str) -> String {
    match formula.filter(|f| !f.trim().is_empty()).and_then(TransformRule::parse) {
        Some(rule) => rule.apply(tag),
        None => tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_prefix() {
        assert_eq!(parse("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse("=1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse("1.2.3-rc.1").unwrap().pre.as_str(), "rc.1");
    }

    #[test]
    fn parse_coerces_partial_versions() {
        assert_eq!(parse("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse("8"), Some(Version::new(8, 0, 0)));
        assert_eq!(parse("release-2.4.1.7"), Some(Version::new(2, 4, 1)));
        assert_eq!(parse("alpine3.18"), Some(Version::new(3, 18, 0)));
    }

    #[test]
    fn parse_keeps_prerelease_suffix() {
        let version = parse("10.1.4-alpine").unwrap();
        assert_eq!((version.major, version.minor, version.patch), (10, 1, 4));
        assert_eq!(version.pre.as_str(), "alpine");
    }

    #[test]
    fn parse_coerces_build_numbers() {
        assert_eq!(parse("2024.01.15"), Some(Version::new(2024, 1, 15)));
    }

    #[test]
    fn parse_rejects_non_versions() {
        assert_eq!(parse("latest"), None);
        assert_eq!(parse("stable"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn is_greater_is_strict() {
        assert!(is_greater("2.0.0", "1.9.9"));
        assert!(!is_greater("1.0.0", "1.0.0"));
        assert!(!is_greater("1.0.0", "1.0.1"));
        assert!(is_greater("1.0.0", "1.0.0-rc.1"));
        assert!(!is_greater("latest", "1.0.0"));
    }

    #[test]
    fn diff_kinds() {
        assert_eq!(diff("1.0.0", "2.0.0"), Some(SemverDiff::Major));
        assert_eq!(diff("1.0.0", "1.1.0"), Some(SemverDiff::Minor));
        assert_eq!(diff("1.0.0", "1.0.1"), Some(SemverDiff::Patch));
        assert_eq!(diff("1.0.0-rc.1", "1.0.0-rc.2"), Some(SemverDiff::Prerelease));
        assert_eq!(diff("1.0.0", "2.0.0-rc.1"), Some(SemverDiff::Major));
        assert_eq!(diff("1.2.0-rc.1", "1.2.0"), Some(SemverDiff::Minor));
        assert_eq!(diff("1.2.3-rc.1", "1.2.3"), Some(SemverDiff::Patch));
        assert_eq!(diff("1.0.0", "1.0.0"), None);
        assert_eq!(diff("latest", "1.0.0"), None);
    }

    #[test]
    fn transform_rewrites_with_groups() {
        let formula = Some(r"^(\d+)\.(\d+)-r(\d+)$ => $1.$2.$3");
        assert_eq!(transform(formula, "1.2-r7"), "1.2.7");
    }

    #[test]
    fn transform_falls_back_to_original() {
        let formula = Some(r"^(\d+)\.(\d+)-r(\d+)$ => $1.$2.$3");
        assert_eq!(transform(formula, "latest"), "latest");
        assert_eq!(transform(Some("no separator"), "1.0"), "1.0");
        assert_eq!(transform(Some(r"^(\d+)$ => fixed"), "1"), "1");
        assert_eq!(transform(Some(r"^(\d+)$ => $1.$4"), "1"), "1");
        assert_eq!(transform(Some("(unclosed => $1"), "1"), "1");
        assert_eq!(transform(None, "1.0"), "1.0");
        assert_eq!(transform(Some(""), "1.0"), "1.0");
    }
}
