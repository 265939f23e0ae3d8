//! HTTP client for the daemon API.
//!
//! This module provides a typed client for the controller endpoints served
//! by virtbmcd.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::types::{
    ApiErrorResponse, BmcRecord, DriversResponse, LifecycleResponse, ListBmcsResponse,
};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The daemon could not be reached.
    #[error("cannot reach daemon at {0}. Is the daemon running?")]
    Unreachable(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl ClientError {
    /// Whether the daemon answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Client for the daemon API.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    /// Create a new daemon client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the daemon (e.g., "http://127.0.0.1:6230")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send a request, mapping connection failures to `Unreachable`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ClientError::Unreachable(self.base_url.clone())
            } else {
                ClientError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        Ok(response)
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(err) => err.error.message,
            Err(_) => "Unknown error".to_string(),
        };
        ClientError::Api { status, message }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    // =========================================================================
    // BMC Operations
    // =========================================================================

    /// List all persisted configs.
    pub async fn list_bmcs(&self) -> Result<Vec<BmcRecord>, ClientError> {
        let url = format!("{}/v1/bmcs", self.base_url);
        let response = self.send(self.client.get(&url)).await?;
        let body: ListBmcsResponse = Self::parse(response).await?;
        Ok(body.bmcs)
    }

    /// Get one config, `None` if the daemon has no record of it.
    pub async fn get_bmc(&self, name: &str) -> Result<Option<BmcRecord>, ClientError> {
        let url = format!("{}/v1/bmcs/{}", self.base_url, name);
        match self.send(self.client.get(&url)).await {
            Ok(response) => Ok(Some(Self::parse(response).await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a config from raw settings.
    pub async fn create_bmc(&self, raw: &Map<String, Value>) -> Result<BmcRecord, ClientError> {
        let url = format!("{}/v1/bmcs", self.base_url);
        let response = self.send(self.client.post(&url).json(raw)).await?;
        Self::parse(response).await
    }

    /// Delete a config, stopping its instance first.
    pub async fn delete_bmc(&self, name: &str) -> Result<(), ClientError> {
        let url = format!("{}/v1/bmcs/{}", self.base_url, name);
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    /// Start serving an instance.
    pub async fn start_bmc(&self, name: &str) -> Result<LifecycleResponse, ClientError> {
        let url = format!("{}/v1/bmcs/{}/start", self.base_url, name);
        let response = self.send(self.client.post(&url)).await?;
        Self::parse(response).await
    }

    /// Stop a live instance.
    pub async fn stop_bmc(&self, name: &str) -> Result<LifecycleResponse, ClientError> {
        let url = format!("{}/v1/bmcs/{}/stop", self.base_url, name);
        let response = self.send(self.client.post(&url)).await?;
        Self::parse(response).await
    }

    /// List registered driver tags.
    pub async fn list_drivers(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/v1/drivers", self.base_url);
        let response = self.send(self.client.get(&url)).await?;
        let body: DriversResponse = Self::parse(response).await?;
        Ok(body.drivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str) -> Value {
        json!({
            "name": name,
            "driver": "dummy",
            "username": "admin",
            "password": "password",
            "port": 623,
            "address": "::",
            "active": false
        })
    }

    fn error(code: &str, message: &str) -> Value {
        json!({"error": {"code": code, "message": message}})
    }

    #[tokio::test]
    async fn list_unwraps_bmcs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/bmcs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"bmcs": [record("a"), record("b")]})),
            )
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        let bmcs = client.list_bmcs().await.unwrap();
        assert_eq!(bmcs.len(), 2);
        assert_eq!(bmcs[1].name, "b");
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/bmcs/nope"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(error("not_found", "bmc with that name doesn't exist: nope")),
            )
            .mount(&server)
            .await;

        let client = DaemonClient::new(format!("{}/", server.uri()));
        assert!(client.get_bmc("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_posts_raw_settings() {
        let server = MockServer::start().await;
        let raw = json!({"name": "a", "driver": "dummy"});
        Mock::given(method("POST"))
            .and(path("/v1/bmcs"))
            .and(body_json(&raw))
            .respond_with(ResponseTemplate::new(201).set_body_json(record("a")))
            .expect(1)
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        let created = client
            .create_bmc(raw.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(created.name, "a");
        assert_eq!(created.port, 623);
    }

    #[tokio::test]
    async fn api_errors_carry_the_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/bmcs/a/start"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(error("conflict", "bmc a already started")),
            )
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        let err = client.start_bmc("a").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 409, .. }));
        assert_eq!(err.to_string(), "bmc a already started");
    }

    #[tokio::test]
    async fn unparseable_error_body_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/bmcs/a"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        let err = client.delete_bmc("a").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/bmcs/a"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        client.delete_bmc("a").await.unwrap();
    }

    #[tokio::test]
    async fn stop_and_drivers_decode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/bmcs/a/stop"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "a", "active": false})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/drivers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"drivers": ["dummy", "openstack"]})),
            )
            .mount(&server)
            .await;

        let client = DaemonClient::new(server.uri());
        let stopped = client.stop_bmc("a").await.unwrap();
        assert!(!stopped.active);
        assert_eq!(client.list_drivers().await.unwrap(), vec!["dummy", "openstack"]);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DaemonClient::new(format!("http://{addr}"));
        let err = client.list_bmcs().await.unwrap_err();
        assert!(matches!(err, ClientError::Unreachable(_)));
        assert!(err.to_string().contains("Is the daemon running?"));
    }
}
