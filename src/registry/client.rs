// ABOUTME: HTTP plumbing for registry calls: request/response values, the transport seam and its reqwest implementation.
// ABOUTME: RegistryClient adds status checking, JSON decoding and token fetches on top of a transport.

use super::RegistryError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("tagwatch/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

/// One outgoing registry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRequest {
    pub method: Method,
    pub url: String,
    headers: Vec<(String, String)>,
}

impl RegistryRequest {
    /// A GET expecting JSON.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::Head,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn basic(self, credentials: &str) -> Self {
        self.header("Authorization", format!("Basic {credentials}"))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// A registry response with lowercase header names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RegistryResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        serde_json::from_slice(&self.body).map_err(|e| RegistryError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Sends registry requests. The only network seam of the registry layer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &RegistryRequest) -> Result<RegistryResponse, RegistryError>;
}

/// Transport backed by a shared reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let transport_error = |e: reqwest::Error| RegistryError::Transport {
            url: request.url.clone(),
            message: e.to_string(),
        };
        let response = builder.send().await.map_err(transport_error)?;

        let mut out = RegistryResponse::new(response.status().as_u16());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.with_header(name.as_str(), value);
            }
        }
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(out.with_body(body.to_vec()))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Status-checking wrapper shared by every provider instance.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn HttpTransport>,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient").finish_non_exhaustive()
    }
}

impl RegistryClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Client over a fresh [`ReqwestTransport`].
    pub fn reqwest() -> Result<Self, RegistryError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    /// Send `request`, turning non-2xx answers into [`RegistryError::Status`].
    pub async fn send(&self, request: &RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        tracing::trace!(method = request.method.as_str(), url = %request.url, "registry request");
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(RegistryError::Status {
                method: request.method.as_str(),
                url: request.url.clone(),
                status: response.status,
            });
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: &RegistryRequest) -> Result<T, RegistryError> {
        self.send(request).await?.json(&request.url)
    }

    /// GET a `{"token": ...}` document, optionally with Basic credentials.
    pub async fn fetch_token(&self, url: &str, basic: Option<&str>) -> Result<String, RegistryError> {
        let mut request = RegistryRequest::get(url);
        if let Some(credentials) = basic {
            request = request.basic(credentials);
        }
        let response: TokenResponse = self.get_json(&request).await?;
        Ok(response.token)
    }
}
