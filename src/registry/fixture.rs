// ABOUTME: Scripted HTTP transport for unit tests of providers, the resolver and watchers.
// ABOUTME: Answers by method and exact URL and records every request it sees.

use super::{HttpTransport, Method, RegistryError, RegistryRequest, RegistryResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct FixtureTransport {
    routes: Mutex<HashMap<(&'static str, String), RegistryResponse>>,
    requests: Mutex<Vec<RegistryRequest>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url: &str, response: RegistryResponse) {
        self.routes
            .lock()
            .insert((method.as_str(), url.to_string()), response);
    }

    pub fn on_json(&self, url: &str, body: serde_json::Value) {
        self.on(
            Method::Get,
            url,
            RegistryResponse::new(200).with_body(body.to_string()),
        );
    }

    pub fn requests(&self) -> Vec<RegistryRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for FixtureTransport {
    async fn send(&self, request: &RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        self.requests.lock().push(request.clone());
        Ok(self
            .routes
            .lock()
            .get(&(request.method.as_str(), request.url.clone()))
            .cloned()
            .unwrap_or_else(|| RegistryResponse::new(404)))
    }
}
