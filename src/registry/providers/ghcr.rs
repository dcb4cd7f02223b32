// ABOUTME: GitHub Container Registry and the registries that share its auth scheme (lscr.io, trueforge.org).
// ABOUTME: The bearer token is the base64 personal access token, or an anonymous placeholder.

use super::{host_ends_with, https_v2, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhcrFlavor {
    Ghcr,
    Lscr,
    Trueforge,
}

impl GhcrFlavor {
    pub fn kind(&self) -> &'static str {
        match self {
            GhcrFlavor::Ghcr => "ghcr",
            GhcrFlavor::Lscr => "lscr",
            GhcrFlavor::Trueforge => "trueforge",
        }
    }

    fn host_suffix(&self) -> &'static str {
        match self {
            GhcrFlavor::Ghcr => "ghcr.io",
            GhcrFlavor::Lscr => "lscr.io",
            GhcrFlavor::Trueforge => "trueforge.org",
        }
    }

    /// Only ghcr.io may be watched anonymously.
    fn credentials_required(&self) -> bool {
        !matches!(self, GhcrFlavor::Ghcr)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GhcrConfig {
    #[serde(default)]
    username: Option<ConfigValue>,
    #[serde(default)]
    token: Option<ConfigValue>,
}

#[derive(Debug)]
pub struct Ghcr {
    flavor: GhcrFlavor,
    name: String,
    client: RegistryClient,
    username: Option<String>,
    token: Option<String>,
}

impl Ghcr {
    pub fn new(
        flavor: GhcrFlavor,
        name: &str,
        value: &serde_yaml::Value,
        client: RegistryClient,
    ) -> Result<Self, RegistryError> {
        let kind = flavor.kind();
        let config: GhcrConfig = parse_config(kind, value)?;
        let username = resolve(kind, &config.username)?;
        let token = resolve(kind, &config.token)?;
        let anonymous = username.is_none() && token.is_none();
        if (anonymous && flavor.credentials_required()) || username.is_some() != token.is_some() {
            return Err(RegistryError::invalid(kind, "`username` and `token` are required"));
        }
        Ok(Self {
            flavor,
            name: name.to_string(),
            client,
            username,
            token,
        })
    }
}

#[async_trait]
impl Registry for Ghcr {
    fn kind(&self) -> &'static str {
        self.flavor.kind()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn client(&self) -> &RegistryClient {
        &self.client
    }

    fn matches(&self, image: &Image) -> bool {
        host_ends_with(image, self.flavor.host_suffix())
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        _image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        let token = STANDARD.encode(self.token.as_deref().unwrap_or(":"));
        Ok(request.bearer(&token))
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        match (&self.username, &self.token) {
            (Some(username), Some(token)) => Some(PullCredentials {
                username: username.clone(),
                password: token.clone(),
            }),
            _ => None,
        }
    }

    fn masked_configuration(&self) -> serde_json::Value {
        serde_json::json!({
            "username": self.username,
            "token": mask(self.token.as_deref()),
        })
    }
}
