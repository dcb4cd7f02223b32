// ABOUTME: Amazon ECR provider for private registries and the public gallery.
// ABOUTME: Private access exchanges IAM keys for an ECR authorization token through the AWS SDK.

use super::{https_v2, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const KIND: &str = "ecr";
const PUBLIC_GALLERY: &str = "public.ecr.aws";
const PUBLIC_TOKEN_URL: &str = "https://public.ecr.aws/token/";

static PRIVATE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*\.dkr\.ecr\..*\.amazonaws\.com$").expect("ecr host pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EcrConfig {
    #[serde(default)]
    accesskeyid: Option<ConfigValue>,
    #[serde(default)]
    secretaccesskey: Option<ConfigValue>,
    #[serde(default)]
    region: Option<ConfigValue>,
}

#[derive(Debug, Clone)]
struct AwsKeys {
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

#[derive(Debug)]
pub struct Ecr {
    name: String,
    client: RegistryClient,
    keys: Option<AwsKeys>,
}

impl Ecr {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: EcrConfig = parse_config(KIND, value)?;
        let access_key_id = resolve(KIND, &config.accesskeyid)?;
        let secret_access_key = resolve(KIND, &config.secretaccesskey)?;
        let region = resolve(KIND, &config.region)?;

        let keys = match (access_key_id, secret_access_key, region) {
            (None, None, None) => None,
            (Some(access_key_id), Some(secret_access_key), Some(region)) => Some(AwsKeys {
                access_key_id,
                secret_access_key,
                region,
            }),
            _ => {
                return Err(RegistryError::invalid(
                    KIND,
                    "`accesskeyid`, `secretaccesskey` and `region` must be set together",
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            client,
            keys,
        })
    }

    async fn authorization_token(&self, keys: &AwsKeys) -> Result<String, RegistryError> {
        use aws_sdk_ecr::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &keys.access_key_id,
            &keys.secret_access_key,
            None,
            None,
            "tagwatch",
        );
        let config = aws_sdk_ecr::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(keys.region.clone()))
            .credentials_provider(credentials)
            .build();
        let ecr = aws_sdk_ecr::Client::from_conf(config);

        let auth_error = |message: String| RegistryError::Authentication {
            registry: self.id(),
            message,
        };
        let output = ecr
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| auth_error(aws_sdk_ecr::error::DisplayErrorContext(&e).to_string()))?;
        output
            .authorization_data()
            .first()
            .and_then(|data| data.authorization_token())
            .map(str::to_string)
            .ok_or_else(|| auth_error("no authorization data returned".to_string()))
    }
}

#[async_trait]
impl Registry for Ecr {
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
        PRIVATE_HOST.is_match(&image.registry.url) || image.registry.url == PUBLIC_GALLERY
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        if let Some(ref keys) = self.keys {
            let token = self.authorization_token(keys).await?;
            return Ok(request.basic(&token));
        }
        if image.registry.url.contains(PUBLIC_GALLERY) {
            let token = self
                .client
                .fetch_token(PUBLIC_TOKEN_URL, None)
                .await
                .map_err(|e| RegistryError::Authentication {
                    registry: self.id(),
                    message: e.to_string(),
                })?;
            return Ok(request.bearer(&token));
        }
        Ok(request)
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        self.keys.as_ref().map(|keys| PullCredentials {
            username: keys.access_key_id.clone(),
            password: keys.secret_access_key.clone(),
        })
    }

    fn masked_configuration(&self) -> serde_json::Value {
        let keys = self.keys.as_ref();
        serde_json::json!({
            "accesskeyid": mask(keys.map(|k| k.access_key_id.as_str())),
            "secretaccesskey": mask(keys.map(|k| k.secret_access_key.as_str())),
            "region": keys.map(|k| k.region.as_str()),
        })
    }
}
