// ABOUTME: Self-hosted v2 registry provider with optional Basic credentials.
// ABOUTME: Also defines the Basic credential block reused by Hub and Gitea-like providers.

use super::{is_base64, is_http_url, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;
use serde::Deserialize;

const KIND: &str = "custom";

/// Basic auth material: a ready-made `auth` string or a login/password pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicCredentials {
    pub login: Option<String>,
    pub password: Option<String>,
    pub auth: Option<String>,
}

impl BasicCredentials {
    /// Login and password come together; `auth` excludes `login` and must be base64.
    pub(crate) fn validate(self, kind: &str) -> Result<Self, RegistryError> {
        match (&self.login, &self.password) {
            (Some(_), None) => {
                return Err(RegistryError::invalid(kind, "`password` is required with `login`"));
            }
            (None, Some(_)) => {
                return Err(RegistryError::invalid(kind, "`login` is required with `password`"));
            }
            _ => {}
        }
        if self.login.is_some() && self.auth.is_some() {
            return Err(RegistryError::invalid(kind, "`auth` cannot be combined with `login`"));
        }
        if let Some(ref auth) = self.auth
            && !is_base64(auth)
        {
            return Err(RegistryError::invalid(kind, "`auth` must be base64 encoded"));
        }
        Ok(self)
    }

    /// Value for a `Basic` authorization header, if any credentials are set.
    pub fn encoded(&self) -> Option<String> {
        if let Some(ref auth) = self.auth {
            return Some(auth.clone());
        }
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some(super::base64_credentials(login, password)),
            _ => None,
        }
    }

    pub fn pull(&self) -> Option<PullCredentials> {
        let login = self.login.as_ref()?;
        Some(PullCredentials {
            username: login.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }

    pub(crate) fn masked(&self) -> serde_json::Value {
        serde_json::json!({
            "login": self.login,
            "password": mask(self.password.as_deref()),
            "auth": mask(self.auth.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CustomConfig {
    #[serde(default)]
    pub url: Option<ConfigValue>,
    #[serde(default)]
    pub login: Option<ConfigValue>,
    #[serde(default)]
    pub password: Option<ConfigValue>,
    #[serde(default)]
    pub auth: Option<ConfigValue>,
}

impl CustomConfig {
    pub(crate) fn credentials(&self, kind: &str) -> Result<BasicCredentials, RegistryError> {
        BasicCredentials {
            login: resolve(kind, &self.login)?,
            password: resolve(kind, &self.password)?,
            auth: resolve(kind, &self.auth)?,
        }
        .validate(kind)
    }
}

/// Any registry reachable at a configured URL.
#[derive(Debug)]
pub struct Custom {
    name: String,
    client: RegistryClient,
    url: String,
    credentials: BasicCredentials,
}

impl Custom {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: CustomConfig = parse_config(KIND, value)?;
        let url = super::require(KIND, "url", resolve(KIND, &config.url)?)?;
        if !is_http_url(&url) {
            return Err(RegistryError::invalid(KIND, format!("`url` must be an http(s) URL, got {url}")));
        }
        Ok(Self {
            name: name.to_string(),
            client,
            url: url.trim_end_matches('/').to_string(),
            credentials: config.credentials(KIND)?,
        })
    }
}

#[async_trait]
impl Registry for Custom {
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

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.url = format!("{}/v2", self.url);
        image
    }

    async fn authenticate(
        &self,
        _image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        Ok(match self.credentials.encoded() {
            Some(credentials) => request.basic(&credentials),
            None => request,
        })
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        self.credentials.pull()
    }

    fn masked_configuration(&self) -> serde_json::Value {
        let mut masked = self.credentials.masked();
        masked["url"] = serde_json::Value::String(self.url.clone());
        masked
    }
}
