// ABOUTME: Docker Hub provider: owns unqualified image names and anything on docker.io.
// ABOUTME: Every call is authorized with a pull token from auth.docker.io.

use super::{BasicCredentials, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{
    PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest, full_image_name,
};
use async_trait::async_trait;
use serde::Deserialize;

const KIND: &str = "hub";
const REGISTRY_URL: &str = "https://registry-1.docker.io";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HubConfig {
    #[serde(default)]
    login: Option<ConfigValue>,
    #[serde(default)]
    password: Option<ConfigValue>,
    #[serde(default)]
    token: Option<ConfigValue>,
    #[serde(default)]
    auth: Option<ConfigValue>,
}

#[derive(Debug)]
pub struct Hub {
    name: String,
    client: RegistryClient,
    credentials: BasicCredentials,
    token: Option<String>,
}

impl Hub {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: HubConfig = parse_config(KIND, value)?;
        let token = resolve(KIND, &config.token)?;
        let credentials = BasicCredentials {
            login: resolve(KIND, &config.login)?,
            password: token.clone().or(resolve(KIND, &config.password)?),
            auth: resolve(KIND, &config.auth)?,
        }
        .validate(KIND)?;
        Ok(Self {
            name: name.to_string(),
            client,
            credentials,
            token,
        })
    }
}

#[async_trait]
impl Registry for Hub {
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
        image.registry.url.is_empty() || image.registry.url.ends_with("docker.io")
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.url = format!("{REGISTRY_URL}/v2");
        if !image.name.contains('/') {
            image.name = format!("library/{}", image.name);
        }
        image
    }

    async fn authenticate(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        let url = format!(
            "https://auth.docker.io/token?service=registry.docker.io&scope=repository:{}:pull&grant_type=password",
            image.name
        );
        let token = self
            .client
            .fetch_token(&url, self.credentials.encoded().as_deref())
            .await
            .map_err(|e| RegistryError::Authentication {
                registry: self.id(),
                message: e.to_string(),
            })?;
        Ok(request.bearer(&token))
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        self.credentials.pull()
    }

    fn masked_configuration(&self) -> serde_json::Value {
        let mut masked = self.credentials.masked();
        masked["url"] = serde_json::Value::String(REGISTRY_URL.to_string());
        masked["token"] = serde_json::to_value(mask(self.token.as_deref())).unwrap_or_default();
        masked
    }

    fn image_full_name(&self, image: &Image, tag_or_digest: &str) -> String {
        full_image_name(image, tag_or_digest)
            .replacen("registry-1.docker.io/", "", 1)
            .replacen("library/", "", 1)
    }
}
