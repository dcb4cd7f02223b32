// ABOUTME: Azure Container Registry provider using a service principal as Basic credentials.

use super::{base64_credentials, host_ends_with, https_v2, mask, parse_config, require, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use serde::Deserialize;

const KIND: &str = "acr";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AcrConfig {
    #[serde(default)]
    clientid: Option<ConfigValue>,
    #[serde(default)]
    clientsecret: Option<ConfigValue>,
}

#[derive(Debug)]
pub struct Acr {
    name: String,
    client: RegistryClient,
    client_id: String,
    client_secret: String,
}

impl Acr {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: AcrConfig = parse_config(KIND, value)?;
        Ok(Self {
            name: name.to_string(),
            client,
            client_id: require(KIND, "clientid", resolve(KIND, &config.clientid)?)?,
            client_secret: require(KIND, "clientsecret", resolve(KIND, &config.clientsecret)?)?,
        })
    }
}

#[async_trait]
impl Registry for Acr {
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
        host_ends_with(image, "azurecr.io")
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        _image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        Ok(request.basic(&base64_credentials(&self.client_id, &self.client_secret)))
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        Some(PullCredentials {
            username: self.client_id.clone(),
            password: self.client_secret.clone(),
        })
    }

    fn masked_configuration(&self) -> serde_json::Value {
        serde_json::json!({
            "clientid": self.client_id,
            "clientsecret": mask(Some(&self.client_secret)),
        })
    }
}
