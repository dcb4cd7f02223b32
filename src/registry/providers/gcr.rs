// ABOUTME: Google Container Registry provider, anonymous or authenticated with a service account key.
// ABOUTME: Service account requests trade a `_json_key` Basic credential for a pull token.

use super::{host_ends_with, https_v2, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

const KIND: &str = "gcr";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GcrConfig {
    #[serde(default)]
    clientemail: Option<ConfigValue>,
    #[serde(default)]
    privatekey: Option<ConfigValue>,
}

#[derive(Debug, Clone)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
}

impl ServiceAccount {
    fn json_key(&self) -> String {
        let key = serde_json::json!({
            "client_email": self.client_email,
            "private_key": self.private_key,
        });
        STANDARD.encode(format!("_json_key:{key}"))
    }
}

#[derive(Debug)]
pub struct Gcr {
    name: String,
    client: RegistryClient,
    account: Option<ServiceAccount>,
}

impl Gcr {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: GcrConfig = parse_config(KIND, value)?;
        let account = match (
            resolve(KIND, &config.clientemail)?,
            resolve(KIND, &config.privatekey)?,
        ) {
            (None, None) => None,
            (Some(client_email), Some(private_key)) => Some(ServiceAccount {
                client_email,
                private_key,
            }),
            _ => {
                return Err(RegistryError::invalid(
                    KIND,
                    "`clientemail` and `privatekey` must be set together",
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            client,
            account,
        })
    }
}

#[async_trait]
impl Registry for Gcr {
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
        host_ends_with(image, "gcr.io")
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        let Some(ref account) = self.account else {
            return Ok(request);
        };
        let url = format!(
            "https://gcr.io/v2/token?scope=repository:{}:pull",
            image.name
        );
        let token = self
            .client
            .fetch_token(&url, Some(&account.json_key()))
            .await
            .map_err(|e| RegistryError::Authentication {
                registry: self.id(),
                message: e.to_string(),
            })?;
        Ok(request.bearer(&token))
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        self.account.as_ref().map(|account| PullCredentials {
            username: account.client_email.clone(),
            password: account.private_key.clone(),
        })
    }

    fn masked_configuration(&self) -> serde_json::Value {
        let account = self.account.as_ref();
        serde_json::json!({
            "clientemail": account.map(|a| a.client_email.as_str()),
            "privatekey": mask(account.map(|a| a.private_key.as_str())),
        })
    }
}
