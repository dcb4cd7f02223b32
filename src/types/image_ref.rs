// ABOUTME: Docker image reference parsing.
// ABOUTME: Splits references like ghcr.io/org/app:1.2@sha256:... into domain, path, tag and digest.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageReferenceError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character {0:?} in image reference")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference as written in a container's `Image` field.
///
/// No defaults are applied: a reference without a tag has `tag() == None`
/// and a Docker Hub reference has no domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    domain: Option<String>,
    path: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self, ParseImageReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageReferenceError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ParseImageReferenceError::InvalidChar(c));
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) if !after.is_empty() => (before, Some(after.to_string())),
            Some(_) => return Err(ParseImageReferenceError::InvalidFormat(input.to_string())),
            None => (input, None),
        };

        // A colon after the last slash separates the tag; earlier colons belong to a port.
        let last_slash = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (without_tag, tag) = match without_digest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &without_digest[split + 1..];
                if tag.is_empty() {
                    return Err(ParseImageReferenceError::InvalidFormat(input.to_string()));
                }
                (&without_digest[..split], Some(tag.to_string()))
            }
            None => (without_digest, None),
        };

        let (domain, path) = match without_tag.split_once('/') {
            Some((first, rest)) if is_domain(first) => (Some(first.to_string()), rest),
            _ => (None, without_tag),
        };

        if path.is_empty() || path.starts_with('/') || path.ends_with('/') || path.contains("//") {
            return Err(ParseImageReferenceError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            domain,
            path: path.to_string(),
            tag,
            digest,
        })
    }

    /// Registry host (with optional port), absent for Docker Hub short names.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Repository path inside the registry.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

fn is_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref domain) = self.domain {
            write!(f, "{domain}/")?;
        }
        f.write_str(&self.path)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hub_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.domain(), None);
        assert_eq!(r.path(), "nginx");
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), None);
    }

    #[test]
    fn registry_with_port_and_tag() {
        let r = ImageReference::parse("localhost:5000/team/app:1.2.3").unwrap();
        assert_eq!(r.domain(), Some("localhost:5000"));
        assert_eq!(r.path(), "team/app");
        assert_eq!(r.tag(), Some("1.2.3"));
    }

    #[test]
    fn registry_with_port_without_tag() {
        let r = ImageReference::parse("registry.lan:5000/app").unwrap();
        assert_eq!(r.domain(), Some("registry.lan:5000"));
        assert_eq!(r.path(), "app");
        assert_eq!(r.tag(), None);
    }

    #[test]
    fn organisation_without_domain_stays_in_path() {
        let r = ImageReference::parse("linuxserver/sonarr:latest").unwrap();
        assert_eq!(r.domain(), None);
        assert_eq!(r.path(), "linuxserver/sonarr");
    }

    #[test]
    fn tag_and_digest() {
        let r = ImageReference::parse("ghcr.io/o/a:1.0@sha256:abcd").unwrap();
        assert_eq!(r.domain(), Some("ghcr.io"));
        assert_eq!(r.tag(), Some("1.0"));
        assert_eq!(r.digest(), Some("sha256:abcd"));
        assert_eq!(r.to_string(), "ghcr.io/o/a:1.0@sha256:abcd");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(ImageReference::parse("  "), Err(ParseImageReferenceError::Empty));
        assert_eq!(
            ImageReference::parse("nginx latest"),
            Err(ParseImageReferenceError::InvalidChar(' '))
        );
        assert!(ImageReference::parse("nginx:").is_err());
        assert!(ImageReference::parse("ghcr.io/").is_err());
    }
}
