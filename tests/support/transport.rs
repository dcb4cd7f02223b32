// ABOUTME: In-process registry transport answering from a route table.
// ABOUTME: Lets registry tests run without network access and inspect the requests sent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tagwatch::registry::{HttpTransport, Method, RegistryError, RegistryRequest, RegistryResponse};

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(&'static str, String), RegistryResponse>>,
    requests: Mutex<Vec<RegistryRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `response`. Unrouted requests get a 404.
    pub fn route(&self, method: Method, url: &str, response: RegistryResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.as_str(), url.to_string()), response);
    }

    pub fn json(&self, url: &str, body: serde_json::Value) {
        self.route(
            Method::Get,
            url,
            RegistryResponse::new(200).with_body(body.to_string()),
        );
    }

    pub fn requests(&self) -> Vec<RegistryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        self.requests.lock().unwrap().push(request.clone());
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(&(request.method.as_str(), request.url.clone()))
            .cloned()
            .unwrap_or_else(|| RegistryResponse::new(404)))
    }
}
