//! Keystone-authenticated Nova client.
//!
//! This module provides the `NovaClient` implementation of [`ComputeApi`].
//! Credentials are resolved on first use, so an instance can be configured
//! and validated on a host that has no cloud credentials yet.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::compute::ComputeApi;
use crate::error::{ComputeError, Result};
use crate::types::{RebootType, ServerView};

/// Connection settings for one cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    /// Keystone endpoint, with or without the `/v3` suffix.
    pub auth_url: String,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Project to scope the token to.
    pub project_name: String,
    /// Domain of the user.
    pub user_domain_name: String,
    /// Domain of the project.
    pub project_domain_name: String,
    /// Region used to pick the compute endpoint.
    pub region_name: Option<String>,
    /// Endpoint interface used to pick the compute endpoint.
    pub interface: String,
    /// Compute endpoint override, skipping the catalog lookup.
    pub compute_url: Option<String>,
}

impl CloudConfig {
    const DEFAULT_DOMAIN: &'static str = "Default";
    const DEFAULT_INTERFACE: &'static str = "public";

    /// Read settings from `OS_*` environment variables.
    ///
    /// With a cloud name, `<CLOUD>_OS_*` variables take precedence.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Config` if a required variable is missing.
    pub fn from_env(cloud: Option<&str>) -> Result<Self> {
        Self::from_lookup(cloud, |key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Config` if a required variable is missing.
    pub fn from_lookup<F>(cloud: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = cloud.map(env_prefix);
        let get = |key: &str| {
            prefix
                .as_ref()
                .and_then(|p| lookup(&format!("{p}_{key}")))
                .or_else(|| lookup(key))
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                ComputeError::Config(match &prefix {
                    Some(p) => format!("neither {p}_{key} nor {key} is set"),
                    None => format!("{key} is not set"),
                })
            })
        };

        Ok(Self {
            auth_url: require("OS_AUTH_URL")?,
            username: require("OS_USERNAME")?,
            password: require("OS_PASSWORD")?,
            project_name: match get("OS_TENANT_NAME") {
                Some(name) => get("OS_PROJECT_NAME").unwrap_or(name),
                None => require("OS_PROJECT_NAME")?,
            },
            user_domain_name: get("OS_USER_DOMAIN_NAME")
                .unwrap_or_else(|| Self::DEFAULT_DOMAIN.to_string()),
            project_domain_name: get("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| Self::DEFAULT_DOMAIN.to_string()),
            region_name: get("OS_REGION_NAME"),
            interface: get("OS_INTERFACE").unwrap_or_else(|| Self::DEFAULT_INTERFACE.to_string()),
            compute_url: get("OS_COMPUTE_API"),
        })
    }

    fn token_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            format!("{base}/auth/tokens")
        } else {
            format!("{base}/v3/auth/tokens")
        }
    }
}

/// Upper-cased cloud name with separators replaced, e.g. `my-lab` → `MY_LAB`.
fn env_prefix(cloud: &str) -> String {
    cloud
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Where credentials come from.
#[derive(Debug, Clone)]
enum Credentials {
    Env(Option<String>),
    Fixed(CloudConfig),
}

/// An authenticated token and the compute endpoint it was issued for.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    compute_url: String,
}

/// Nova API client.
#[derive(Debug)]
pub struct NovaClient {
    client: reqwest::Client,
    credentials: Credentials,
    session: Mutex<Option<Session>>,
}

/// Keystone token response, reduced to the catalog.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerView,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    servers: Vec<ServerView>,
}

#[derive(Debug, Deserialize)]
struct MetaEnvelope {
    meta: serde_json::Map<String, Value>,
}

impl NovaClient {
    fn http_client() -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?)
    }

    /// Create a client reading credentials from the environment on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_env(cloud: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Self::http_client()?,
            credentials: Credentials::Env(cloud),
            session: Mutex::new(None),
        })
    }

    /// Create a client with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(config: CloudConfig) -> Result<Self> {
        Ok(Self {
            client: Self::http_client()?,
            credentials: Credentials::Fixed(config),
            session: Mutex::new(None),
        })
    }

    fn cloud_config(&self) -> Result<CloudConfig> {
        match &self.credentials {
            Credentials::Env(cloud) => CloudConfig::from_env(cloud.as_deref()),
            Credentials::Fixed(config) => Ok(config.clone()),
        }
    }

    /// Return the cached session, authenticating if there is none.
    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let session = self.authenticate(&self.cloud_config()?).await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn invalidate(&self) {
        *self.session.lock().await = None;
    }

    async fn authenticate(&self, config: &CloudConfig) -> Result<Session> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": config.username,
                            "domain": {"name": config.user_domain_name},
                            "password": config.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": config.project_name,
                        "domain": {"name": config.project_domain_name},
                    }
                }
            }
        });

        let response = self
            .client
            .post(config.token_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = fault_message(&response.text().await.unwrap_or_default());
            tracing::error!(status = %status, error = %message, "Keystone authentication failed");
            return Err(ComputeError::Auth(message));
        }

        let token = response
            .headers()
            .get("x-subject-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ComputeError::Auth("response carried no X-Subject-Token".into()))?;

        let compute_url = match &config.compute_url {
            Some(url) => url.clone(),
            None => {
                let body: TokenResponse = response.json().await?;
                pick_compute_endpoint(&body.token.catalog, config)?
            }
        };

        tracing::debug!(compute_url = %compute_url, "Authenticated with keystone");

        Ok(Session {
            token,
            compute_url: compute_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map a non-success response onto a `ComputeError`.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = fault_message(&response.text().await.unwrap_or_default());
        match status {
            reqwest::StatusCode::NOT_FOUND => Err(ComputeError::NotFound(message)),
            reqwest::StatusCode::CONFLICT => Err(ComputeError::Conflict { message }),
            reqwest::StatusCode::UNAUTHORIZED => {
                self.invalidate().await;
                Err(ComputeError::Auth(message))
            }
            _ => Err(ComputeError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn action(&self, server_id: &str, body: Value) -> Result<()> {
        let session = self.session().await?;
        let url = format!("{}/servers/{server_id}/action", session.compute_url);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &session.token)
            .json(&body)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

fn pick_compute_endpoint(catalog: &[CatalogEntry], config: &CloudConfig) -> Result<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == "compute")
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| {
            endpoint.interface == config.interface
                && config
                    .region_name
                    .as_ref()
                    .map_or(true, |region| endpoint.region.as_ref() == Some(region))
        })
        .map(|endpoint| endpoint.url.clone())
        .ok_or_else(|| {
            ComputeError::Config(format!(
                "no {} compute endpoint in the service catalog",
                config.interface
            ))
        })
}

/// Extract the message from an OpenStack fault body such as
/// `{"conflictingRequest": {"code": 409, "message": "..."}}`.
fn fault_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(Value::as_object)
        .and_then(|fault| {
            fault.values().find_map(|detail| {
                detail
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ComputeApi for NovaClient {
    async fn find_server(&self, name_or_id: &str) -> Result<Option<ServerView>> {
        if let Some(server) = self.get_server(name_or_id).await? {
            return Ok(Some(server));
        }

        let session = self.session().await?;
        let url = format!("{}/servers/detail", session.compute_url);
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &session.token)
            .query(&[("name", name_or_id)])
            .send()
            .await?;
        let list: ServerList = self.check(response).await?.json().await?;

        // the name filter is a regex match, keep only exact names
        let mut matches = list.servers.into_iter().filter(|s| s.name == name_or_id);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(ComputeError::Ambiguous(name_or_id.to_string()));
        }
        Ok(first)
    }

    async fn get_server(&self, server_id: &str) -> Result<Option<ServerView>> {
        let session = self.session().await?;
        let url = format!("{}/servers/{server_id}", session.compute_url);
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &session.token)
            .send()
            .await?;

        match self.check(response).await {
            Ok(response) => Ok(Some(response.json::<ServerEnvelope>().await?.server)),
            Err(ComputeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn start_server(&self, server_id: &str) -> Result<()> {
        self.action(server_id, json!({"os-start": null})).await
    }

    async fn stop_server(&self, server_id: &str) -> Result<()> {
        self.action(server_id, json!({"os-stop": null})).await
    }

    async fn reboot_server(&self, server_id: &str, kind: RebootType) -> Result<()> {
        self.action(server_id, json!({"reboot": {"type": kind.as_str()}}))
            .await
    }

    async fn get_metadata_item(&self, server_id: &str, key: &str) -> Result<Option<String>> {
        let session = self.session().await?;
        let url = format!("{}/servers/{server_id}/metadata/{key}", session.compute_url);
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &session.token)
            .send()
            .await?;

        match self.check(response).await {
            Ok(response) => {
                let envelope: MetaEnvelope = response.json().await?;
                Ok(envelope
                    .meta
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string))
            }
            Err(ComputeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_metadata_item(&self, server_id: &str, key: &str, value: &str) -> Result<()> {
        let session = self.session().await?;
        let url = format!("{}/servers/{server_id}/metadata/{key}", session.compute_url);
        let response = self
            .client
            .put(&url)
            .header("X-Auth-Token", &session.token)
            .json(&json!({"meta": {key: value}}))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn test_config(server: &MockServer) -> CloudConfig {
        CloudConfig {
            auth_url: format!("{}/v3", server.uri()),
            username: "admin".into(),
            password: "secret".into(),
            project_name: "lab".into(),
            user_domain_name: "Default".into(),
            project_domain_name: "Default".into(),
            region_name: Some("RegionOne".into()),
            interface: "public".into(),
            compute_url: None,
        }
    }

    async fn mount_keystone(server: &MockServer, expected_logins: u64) {
        let catalog = json!({
            "token": {
                "catalog": [
                    {"type": "identity", "endpoints": [
                        {"interface": "public", "region": "RegionOne", "url": server.uri()}
                    ]},
                    {"type": "compute", "endpoints": [
                        {"interface": "internal", "region": "RegionOne", "url": "http://internal.invalid"},
                        {"interface": "public", "region": "RegionOne", "url": format!("{}/compute/v2.1", server.uri())}
                    ]}
                ]
            }
        });

        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", "tok-1")
                    .set_body_json(catalog),
            )
            .expect(expected_logins)
            .mount(server)
            .await;
    }

    fn server_json(id: &str, name: &str, status: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "status": status,
            "OS-EXT-STS:vm_state": "active",
            "OS-EXT-STS:task_state": null
        })
    }

    #[test]
    fn config_from_plain_env() {
        let config = CloudConfig::from_lookup(
            None,
            lookup(&[
                ("OS_AUTH_URL", "http://keystone:5000"),
                ("OS_USERNAME", "admin"),
                ("OS_PASSWORD", "pw"),
                ("OS_PROJECT_NAME", "lab"),
            ]),
        )
        .unwrap();

        assert_eq!(config.user_domain_name, "Default");
        assert_eq!(config.interface, "public");
        assert_eq!(config.token_url(), "http://keystone:5000/v3/auth/tokens");
    }

    #[test]
    fn cloud_prefixed_env_takes_precedence() {
        let config = CloudConfig::from_lookup(
            Some("my-lab"),
            lookup(&[
                ("OS_AUTH_URL", "http://default/v3/"),
                ("MY_LAB_OS_AUTH_URL", "http://lab/v3"),
                ("OS_USERNAME", "admin"),
                ("OS_PASSWORD", "pw"),
                ("OS_TENANT_NAME", "legacy"),
            ]),
        )
        .unwrap();

        assert_eq!(config.auth_url, "http://lab/v3");
        assert_eq!(config.project_name, "legacy");
        assert_eq!(config.token_url(), "http://lab/v3/auth/tokens");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = CloudConfig::from_lookup(None, lookup(&[])).unwrap_err();
        assert!(matches!(err, ComputeError::Config(msg) if msg.contains("OS_AUTH_URL")));
    }

    #[test]
    fn fault_messages() {
        let body = r#"{"conflictingRequest": {"code": 409, "message": "Cannot 'start' instance x while it is in vm_state active"}}"#;
        assert_eq!(
            fault_message(body),
            "Cannot 'start' instance x while it is in vm_state active"
        );
        assert_eq!(fault_message("plain text\n"), "plain text");
    }

    #[tokio::test]
    async fn get_server_reuses_token() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/srv-1"))
            .and(header("X-Auth-Token", "tok-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"server": server_json("srv-1", "node-1", "ACTIVE")})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        for _ in 0..2 {
            let view = client.get_server("srv-1").await.unwrap().unwrap();
            assert_eq!(view.name, "node-1");
        }
    }

    #[tokio::test]
    async fn missing_server_is_none() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"itemNotFound": {"code": 404, "message": "Instance gone could not be found."}}),
            ))
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        assert!(client.get_server("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_server_falls_back_to_name() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/node-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .and(query_param("name", "node-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [
                    server_json("srv-10", "node-10", "ACTIVE"),
                    server_json("srv-1", "node-1", "SHUTOFF")
                ]
            })))
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        let view = client.find_server("node-1").await.unwrap().unwrap();
        assert_eq!(view.id, "srv-1");
    }

    #[tokio::test]
    async fn conflicting_action_is_a_conflict() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers/srv-1/action"))
            .and(body_json(json!({"os-start": null})))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "conflictingRequest": {
                    "code": 409,
                    "message": "Cannot 'start' instance srv-1 while it is in vm_state active"
                }
            })))
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        let err = client.start_server("srv-1").await.unwrap_err();
        assert!(matches!(err, ComputeError::Conflict { message } if message.ends_with("active")));
    }

    #[tokio::test]
    async fn reboot_sends_type() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers/srv-1/action"))
            .and(body_json(json!({"reboot": {"type": "HARD"}})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        client
            .reboot_server("srv-1", RebootType::Hard)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn metadata_get_and_set() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/srv-1/metadata/libvirt:pxe-first"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"meta": {"libvirt:pxe-first": "1"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/srv-2/metadata/libvirt:pxe-first"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/compute/v2.1/servers/srv-1/metadata/libvirt:pxe-first"))
            .and(body_json(json!({"meta": {"libvirt:pxe-first": ""}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"meta": {"libvirt:pxe-first": ""}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        assert_eq!(
            client
                .get_metadata_item("srv-1", "libvirt:pxe-first")
                .await
                .unwrap()
                .as_deref(),
            Some("1")
        );
        assert!(client
            .get_metadata_item("srv-2", "libvirt:pxe-first")
            .await
            .unwrap()
            .is_none());
        client
            .set_metadata_item("srv-1", "libvirt:pxe-first", "")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_login_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "The request you have made requires authentication.", "title": "Unauthorized"}
            })))
            .mount(&server)
            .await;

        let client = NovaClient::with_config(test_config(&server)).unwrap();
        let err = client.get_server("srv-1").await.unwrap_err();
        assert!(matches!(err, ComputeError::Auth(msg) if msg.contains("requires authentication")));
    }
}
