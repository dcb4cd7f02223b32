// ABOUTME: Resolves the comparable digest of a remote image across v1, v2 and OCI manifest shapes.
// ABOUTME: v2 digests always come from the docker-content-digest header of the platform manifest.

use super::{Registry, RegistryError, RegistryRequest};
use crate::model::Image;
use serde::{Deserialize, Serialize};

pub const MEDIA_DOCKER_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const MEDIA_OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

const DIGEST_HEADER: &str = "docker-content-digest";

/// Digest found for a remote tag or digest.
///
/// `version` is 2 when `digest` is a manifest digest comparable with local
/// repo digests, and 1 when it is an image config id (legacy registries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestDigest {
    pub digest: Option<String>,
    pub created: Option<String>,
    pub version: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    schema_version: u32,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Vec<ManifestEntry>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    #[serde(default)]
    media_type: Option<String>,
    digest: String,
    #[serde(default)]
    platform: Option<Platform>,
}

#[derive(Debug, Default, Deserialize)]
struct Platform {
    #[serde(default)]
    architecture: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    variant: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    media_type: String,
    digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    v1_compatibility: String,
}

#[derive(Debug, Deserialize)]
struct V1Compatibility {
    #[serde(default)]
    config: Option<V1Config>,
    #[serde(default)]
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct V1Config {
    #[serde(rename = "Image", default)]
    image: Option<String>,
}

fn accept_manifests() -> String {
    [
        MEDIA_DOCKER_LIST,
        MEDIA_OCI_INDEX,
        MEDIA_DOCKER_MANIFEST,
        MEDIA_OCI_MANIFEST,
    ]
    .join(", ")
}

/// Resolve the digest of `image` at `digest`, or at its tag when `digest` is `None`.
pub async fn resolve_manifest_digest<R: Registry + ?Sized>(
    registry: &R,
    image: &Image,
    digest: Option<&str>,
) -> Result<ManifestDigest, RegistryError> {
    let reference = digest.unwrap_or(&image.tag.value);
    let url = format!(
        "{}/{}/manifests/{reference}",
        image.registry.url, image.name
    );
    tracing::debug!(registry = %registry.id(), image = %image.name, reference, "fetching manifest");

    let request = RegistryRequest::get(&url).header("Accept", accept_manifests());
    let response = registry.call_registry(image, request).await?;
    let document: ManifestDocument = response.json(&url)?;

    let found = match document.schema_version {
        1 => return legacy_digest(&document, &url),
        2 => {
            let media_type = document
                .media_type
                .clone()
                .or_else(|| response.header("content-type").map(bare_media_type));
            select_descriptor(&document, media_type.as_deref(), image)
        }
        _ => None,
    };

    let Some((found_digest, found_media_type)) = found else {
        return Err(RegistryError::ManifestNotFound);
    };
    tracing::debug!(digest = %found_digest, media_type = %found_media_type, "manifest selected");

    match found_media_type.as_str() {
        MEDIA_DOCKER_MANIFEST | MEDIA_OCI_MANIFEST => {
            let url = format!(
                "{}/{}/manifests/{found_digest}",
                image.registry.url, image.name
            );
            let request = RegistryRequest::head(&url).header("Accept", found_media_type.as_str());
            let response = registry.call_registry(image, request).await?;
            let digest = response
                .header(DIGEST_HEADER)
                .ok_or(RegistryError::MissingHeader {
                    url,
                    header: DIGEST_HEADER,
                })?;
            Ok(ManifestDigest {
                digest: Some(digest.to_string()),
                created: None,
                version: 2,
            })
        }
        MEDIA_DOCKER_CONFIG | MEDIA_OCI_CONFIG => Ok(ManifestDigest {
            digest: Some(found_digest),
            created: None,
            version: 1,
        }),
        _ => Err(RegistryError::ManifestNotFound),
    }
}

fn bare_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Pick the descriptor to follow: the platform entry of a list, or the config of a manifest.
fn select_descriptor(
    document: &ManifestDocument,
    media_type: Option<&str>,
    image: &Image,
) -> Option<(String, String)> {
    match media_type? {
        MEDIA_DOCKER_LIST | MEDIA_OCI_INDEX => {
            let entry = select_platform(&document.manifests, image)?;
            Some((entry.digest.clone(), entry.media_type.clone()?))
        }
        MEDIA_DOCKER_MANIFEST | MEDIA_OCI_MANIFEST => {
            let config = document.config.as_ref()?;
            Some((config.digest.clone(), config.media_type.clone()))
        }
        _ => None,
    }
}

/// First entry for the image's os/architecture, refined by variant when several match.
fn select_platform<'a>(entries: &'a [ManifestEntry], image: &Image) -> Option<&'a ManifestEntry> {
    let candidates: Vec<&ManifestEntry> = entries
        .iter()
        .filter(|entry| {
            entry
                .platform
                .as_ref()
                .is_some_and(|p| p.architecture == image.architecture && p.os == image.os)
        })
        .collect();

    if candidates.len() > 1
        && let Some(exact) = candidates.iter().find(|entry| {
            entry.platform.as_ref().and_then(|p| p.variant.as_deref()) == image.variant.as_deref()
        })
    {
        return Some(*exact);
    }
    candidates.first().copied()
}

fn legacy_digest(document: &ManifestDocument, url: &str) -> Result<ManifestDigest, RegistryError> {
    let entry = document.history.first().ok_or(RegistryError::ManifestNotFound)?;
    let compat: V1Compatibility =
        serde_json::from_str(&entry.v1_compatibility).map_err(|e| RegistryError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(ManifestDigest {
        digest: compat
            .config
            .and_then(|c| c.image)
            .filter(|image| !image.is_empty()),
        created: compat.created,
        version: 1,
    })
}
