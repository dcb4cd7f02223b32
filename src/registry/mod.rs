// ABOUTME: Registry provider contract and the shared machinery behind it.
// ABOUTME: Providers override matching, normalization and auth; tag listing and digests come from the defaults here.

mod client;
mod error;
mod factory;
#[cfg(test)]
pub(crate) mod fixture;
mod manifest;
pub mod providers;
mod set;

pub use client::{HttpTransport, Method, RegistryClient, RegistryRequest, RegistryResponse, ReqwestTransport};
pub use error::RegistryError;
pub use factory::{PROVIDER_KINDS, create_registry};
pub use manifest::{
    ManifestDigest, MEDIA_DOCKER_CONFIG, MEDIA_DOCKER_LIST, MEDIA_DOCKER_MANIFEST, MEDIA_OCI_CONFIG,
    MEDIA_OCI_INDEX, MEDIA_OCI_MANIFEST, resolve_manifest_digest,
};
pub use set::RegistrySet;

use crate::model::Image;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TAGS_PER_PAGE: u32 = 1000;

/// Credentials a pull-capable consumer may hand to the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullCredentials {
    pub username: String,
    pub password: String,
}

/// One page of a tag listing and the `link` header pointing past it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagsPage {
    pub tags: Vec<String>,
    pub link: Option<String>,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl TagsPage {
    pub fn from_response(response: &RegistryResponse, url: &str) -> Result<Self, RegistryError> {
        let list: TagList = response.json(url)?;
        Ok(Self {
            tags: list.tags.unwrap_or_default(),
            link: response.header("link").map(str::to_string),
        })
    }
}

/// A configured registry backend.
///
/// Implementations decide which images they own ([`Registry::matches`]),
/// rewrite them to the registry's v2 endpoint ([`Registry::normalize_image`])
/// and decorate requests with credentials ([`Registry::authenticate`]).
/// Everything else has a working default for any v2 registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Provider type, e.g. `hub`.
    fn kind(&self) -> &'static str;

    /// Instance name, e.g. `public`.
    fn name(&self) -> &str;

    /// `<kind>.<name>`; the value stored in `image.registry.name`.
    fn id(&self) -> String {
        format!("{}.{}", self.kind(), self.name())
    }

    fn client(&self) -> &RegistryClient;

    fn matches(&self, image: &Image) -> bool;

    fn normalize_image(&self, image: Image) -> Image;

    async fn authenticate(
        &self,
        _image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        Ok(request)
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        None
    }

    /// Configuration with secrets masked, for logs.
    fn masked_configuration(&self) -> serde_json::Value {
        serde_json::Value::Object(Default::default())
    }

    fn image_full_name(&self, image: &Image, tag_or_digest: &str) -> String {
        full_image_name(image, tag_or_digest)
    }

    async fn call_registry(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryResponse, RegistryError> {
        let request = self.authenticate(image, request).await?;
        self.client().send(&request).await
    }

    async fn get_tags_page(
        &self,
        image: &Image,
        last: Option<&str>,
        _link: Option<&str>,
    ) -> Result<TagsPage, RegistryError> {
        let last = last.map(|item| format!("&last={item}")).unwrap_or_default();
        let url = format!(
            "{}/{}/tags/list?n={TAGS_PER_PAGE}{last}",
            image.registry.url, image.name
        );
        let response = self.call_registry(image, RegistryRequest::get(&url)).await?;
        TagsPage::from_response(&response, &url)
    }

    /// Every tag of the image, sorted in descending lexical order.
    async fn get_tags(&self, image: &Image) -> Result<Vec<String>, RegistryError> {
        tracing::debug!(registry = %self.id(), image = %image.name, "listing tags");
        let mut tags = Vec::new();
        let mut last: Option<String> = None;
        let mut link: Option<String> = None;
        loop {
            let page = self
                .get_tags_page(image, last.as_deref(), link.as_deref())
                .await?;
            let exhausted = page.link.is_none() || page.tags.is_empty();
            last = page.tags.last().cloned();
            link = page.link;
            tags.extend(page.tags);
            if exhausted {
                break;
            }
        }
        tags.sort();
        tags.reverse();
        Ok(tags)
    }

    /// Digest of the image's tag, or of `digest` when given.
    async fn get_image_manifest_digest(
        &self,
        image: &Image,
        digest: Option<&str>,
    ) -> Result<ManifestDigest, RegistryError> {
        resolve_manifest_digest(self, image, digest).await
    }
}

/// `host/name:tag` or `host/name@digest` without scheme or `/v2`.
pub fn full_image_name(image: &Image, tag_or_digest: &str) -> String {
    let separator = if tag_or_digest.contains(':') { '@' } else { ':' };
    let full = format!(
        "{}/{}{separator}{tag_or_digest}",
        image.registry.url, image.name
    );
    let without_scheme = full
        .strip_prefix("https://")
        .or_else(|| full.strip_prefix("http://"))
        .unwrap_or(&full);
    without_scheme.replacen("/v2", "", 1)
}
