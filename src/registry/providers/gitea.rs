// ABOUTME: Gitea-family providers (Gitea, Forgejo, Codeberg) matched by registry host name.
// ABOUTME: Codeberg is a Forgejo instance at a fixed URL.

use super::custom::CustomConfig;
use super::{BasicCredentials, parse_config, resolve};
use crate::model::Image;
use crate::registry::{PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest};
use async_trait::async_trait;

const CODEBERG_URL: &str = "https://codeberg.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiteaFlavor {
    Gitea,
    Forgejo,
    Codeberg,
}

impl GiteaFlavor {
    pub fn kind(&self) -> &'static str {
        match self {
            GiteaFlavor::Gitea => "gitea",
            GiteaFlavor::Forgejo => "forgejo",
            GiteaFlavor::Codeberg => "codeberg",
        }
    }
}

#[derive(Debug)]
pub struct Gitea {
    flavor: GiteaFlavor,
    name: String,
    client: RegistryClient,
    url: String,
    credentials: BasicCredentials,
}

impl Gitea {
    pub fn new(
        flavor: GiteaFlavor,
        name: &str,
        value: &serde_yaml::Value,
        client: RegistryClient,
    ) -> Result<Self, RegistryError> {
        let kind = flavor.kind();
        let config: CustomConfig = parse_config(kind, value)?;
        let url = match flavor {
            GiteaFlavor::Codeberg => CODEBERG_URL.to_string(),
            _ => super::require(kind, "url", resolve(kind, &config.url)?)?,
        };
        let url = if url.to_ascii_lowercase().starts_with("http") {
            url
        } else {
            format!("https://{url}")
        };
        Ok(Self {
            flavor,
            name: name.to_string(),
            client,
            url: url.trim_end_matches('/').to_string(),
            credentials: config.credentials(kind)?,
        })
    }
}

fn fqdn(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower)
        .to_string()
}

#[async_trait]
impl Registry for Gitea {
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
        fqdn(&self.url) == fqdn(&image.registry.url)
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
