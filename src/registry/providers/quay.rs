// ABOUTME: Quay.io provider with robot-account authentication.
// ABOUTME: Tag pagination follows the `next_page` token of Quay's `link` header.

use super::{base64_credentials, host_ends_with, https_v2, mask, parse_config, resolve};
use crate::config::ConfigValue;
use crate::model::Image;
use crate::registry::{
    PullCredentials, Registry, RegistryClient, RegistryError, RegistryRequest, TagsPage,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const KIND: &str = "quay";
const TAGS_PER_PAGE: u32 = 1000;

static NEXT_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"next_page=([^&>;]+)").expect("next_page pattern is valid"));
static LAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"last=([^&>;]+)").expect("last pattern is valid"));

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuayConfig {
    #[serde(default)]
    namespace: Option<ConfigValue>,
    #[serde(default)]
    account: Option<ConfigValue>,
    #[serde(default)]
    token: Option<ConfigValue>,
}

#[derive(Debug, Clone)]
struct Robot {
    namespace: String,
    account: String,
    token: String,
}

impl Robot {
    fn username(&self) -> String {
        format!("{}+{}", self.namespace, self.account)
    }
}

#[derive(Debug)]
pub struct Quay {
    name: String,
    client: RegistryClient,
    robot: Option<Robot>,
}

impl Quay {
    pub fn new(name: &str, value: &serde_yaml::Value, client: RegistryClient) -> Result<Self, RegistryError> {
        let config: QuayConfig = parse_config(KIND, value)?;
        let robot = match (
            resolve(KIND, &config.namespace)?,
            resolve(KIND, &config.account)?,
            resolve(KIND, &config.token)?,
        ) {
            (None, None, None) => None,
            (Some(namespace), Some(account), Some(token)) => Some(Robot {
                namespace,
                account,
                token,
            }),
            _ => {
                return Err(RegistryError::invalid(
                    KIND,
                    "`namespace`, `account` and `token` must be set together",
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            client,
            robot,
        })
    }
}

/// Query parameter continuing the listing from a Quay `link` header.
///
/// Quay pages with an opaque `next_page` token; plain `last` cursors are
/// passed back under their own name.
fn next_page_query(link: &str) -> Option<String> {
    let (parameter, captures) = match NEXT_PAGE.captures(link) {
        Some(captures) => ("next_page", captures),
        None => ("last", LAST.captures(link)?),
    };
    Some(format!("&{parameter}={}", captures.get(1)?.as_str()))
}

#[async_trait]
impl Registry for Quay {
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
        host_ends_with(image, "quay.io")
    }

    fn normalize_image(&self, image: Image) -> Image {
        https_v2(image)
    }

    async fn authenticate(
        &self,
        image: &Image,
        request: RegistryRequest,
    ) -> Result<RegistryRequest, RegistryError> {
        let Some(ref robot) = self.robot else {
            return Ok(request);
        };
        let url = format!(
            "https://quay.io/v2/auth?service=quay.io&scope=repository:{}:pull",
            image.name
        );
        let basic = base64_credentials(&robot.username(), &robot.token);
        match self.client.fetch_token(&url, Some(&basic)).await {
            Ok(token) => Ok(request.bearer(&token)),
            Err(e) => {
                tracing::warn!(registry = %self.id(), error = %e, "quay authentication failed, continuing anonymously");
                Ok(request)
            }
        }
    }

    fn auth_pull(&self) -> Option<PullCredentials> {
        self.robot.as_ref().map(|robot| PullCredentials {
            username: robot.username(),
            password: robot.token.clone(),
        })
    }

    fn masked_configuration(&self) -> serde_json::Value {
        let robot = self.robot.as_ref();
        serde_json::json!({
            "namespace": robot.map(|r| r.namespace.as_str()),
            "account": robot.map(|r| r.account.as_str()),
            "token": mask(robot.map(|r| r.token.as_str())),
        })
    }

    async fn get_tags_page(
        &self,
        image: &Image,
        _last: Option<&str>,
        link: Option<&str>,
    ) -> Result<TagsPage, RegistryError> {
        let cursor = link.and_then(next_page_query).unwrap_or_default();
        let url = format!(
            "{}/{}/tags/list?n={TAGS_PER_PAGE}{cursor}",
            image.registry.url, image.name
        );
        let response = self.call_registry(image, RegistryRequest::get(&url)).await?;
        TagsPage::from_response(&response, &url)
    }
}
