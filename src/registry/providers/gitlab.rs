// ABOUTME: GitLab container registry provider (gitlab.com or self-managed).
// ABOUTME: Pull tokens come from the GitLab JWT endpoint, authorized with a personal access token.

use super::{https_v2, mask, parse_config, require, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

const KIND: &str = "gitlab";
const DEFAULT_URL: &str = "https://registry.gitlab.com";
const DEFAULT_AUTH_URL: &str = "https://gitlab.com";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GitlabConfig {
    #[serde(default)]
    url: Option<ConfigValue>,
    #[serde(default)]
    authurl: Option<ConfigValue>,
    #[serde(default)]
    token: Option<ConfigValue>,
}

#[derive(Debug)]
pub struct Gitlab {
    name: String,
    client: RegistryClient,
    url: String,
    auth_url: String,
    token: String,
}

impl Gitlab {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: GitlabConfig = parse_config(KIND, value)?;
        let url = resolve(KIND, &config.url)?.unwrap_or_else(|| DEFAULT_URL.to_string());
        let auth_url = resolve(KIND, &config.authurl)?.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());
        Ok(Self {
            name: name.to_string(),
            client,
            url: url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            token: require(KIND, "token", resolve(KIND, &config.token)?)?,
        })
    }
}

#[async_trait]
impl Registry for Gitlab {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn client(&self) -> &RegistryClient {
        &self.client
    }

    fn matches(&self, image: &Image) -> bool {
        !image.registry.url.is_empty() && self.url.contains(&image.registry.url)
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        let url = format!(
            "{}/jwt/auth?service=container_registry&scope=repository:{}:pull",
            self.auth_url, image.name
        );
        let basic = STANDARD.encode(format!(":{}", self.token));
        let token = self
            .client
            .fetch_token(&url, Some(&basic))
            .await
            .map_err(|e| RegistryError::Authentication {
                registry: self.id(),
                message: e.to_string(),
            })?;
        Ok(request.bearer(&token))
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        Some(PullCredentials {
            username: String::new(),
            password: self.token.clone(),
        })
    }

    fn masked_configuration(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "authurl": self.auth_url,
            "token": mask(Some(&self.token)),
        })
    }
}
