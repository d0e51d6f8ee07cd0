//! HTTP client for the external system of record
//!
//! One client is bound to one configured endpoint. It attaches credentials,
//! applies the request timeout and classifies failures into
//! [`TransportError`]. It never retries; the scheduler owns retry policy.

use crate::config::{ExternalSystemConfig, SecretString};
use crate::domain::{Result, SyncError, TransportError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

/// Longest response body kept in an [`TransportError::HttpStatus`]
const MAX_ERROR_BODY: usize = 512;

/// Outbound call seam used by the orchestrator
///
/// The production implementation is [`ExternalSystemClient`]; tests swap in
/// fakes.
#[async_trait]
pub trait ExternalSystem: Send + Sync {
    /// Name of the configured endpoint
    fn system_name(&self) -> &str;

    /// Sends one request and returns the decoded JSON body
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> std::result::Result<Value, TransportError>;
}

/// reqwest-backed [`ExternalSystem`]
///
/// # Example
///
/// ```no_run
/// use catalog_sync::adapters::external::{ExternalSystem, ExternalSystemClient};
/// use catalog_sync::config::load_config;
/// use reqwest::Method;
///
/// # async fn example() -> catalog_sync::domain::Result<()> {
/// let config = load_config("catalog-sync.toml")?;
/// let client = ExternalSystemClient::resolve(&config.external_systems, &config.sync.system)?;
/// let products = client.execute(Method::GET, "/api/products", None).await?;
/// # let _ = products;
/// # Ok(())
/// # }
/// ```
pub struct ExternalSystemClient {
    name: String,
    base_url: String,
    client: Client,
    api_key: Option<SecretString>,
    basic: Option<(String, SecretString)>,
}

impl std::fmt::Debug for ExternalSystemClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSystemClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ExternalSystemClient {
    /// Picks the single active endpoint called `name` and builds a client for it
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when no endpoint has that name,
    /// when none of them is active, or when more than one is active.
    pub fn resolve(systems: &[ExternalSystemConfig], name: &str) -> Result<Self> {
        let named: Vec<&ExternalSystemConfig> =
            systems.iter().filter(|s| s.name == name).collect();
        if named.is_empty() {
            return Err(SyncError::Configuration(format!(
                "External system '{name}' is not configured"
            )));
        }

        let active: Vec<&ExternalSystemConfig> = named.into_iter().filter(|s| s.active).collect();
        match active.as_slice() {
            [] => Err(SyncError::Configuration(format!(
                "External system '{name}' is configured but inactive"
            ))),
            [config] => Self::new(config),
            many => Err(SyncError::Configuration(format!(
                "External system '{name}' is ambiguous: {} active endpoints",
                many.len()
            ))),
        }
    }

    /// Builds a client for one endpoint configuration
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the HTTP client cannot be built
    pub fn new(config: &ExternalSystemConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let basic = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            api_key: config.api_key.clone(),
            basic,
        })
    }

    /// Full URL for a request path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build authorization header value
    ///
    /// Basic credentials win over the API key when both are configured.
    fn auth_header_value(&self) -> Option<String> {
        if let Some((ref username, ref password)) = self.basic {
            let credentials = format!("{username}:{}", password.expose_secret());
            let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
            Some(format!("Basic {encoded}"))
        } else {
            self.api_key
                .as_ref()
                .map(|key| format!("Bearer {}", key.expose_secret()))
        }
    }
}

#[async_trait]
impl ExternalSystem for ExternalSystemClient {
    fn system_name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> std::result::Result<Value, TransportError> {
        let url = self.url_for(path);
        tracing::debug!(system = %self.name, method = %method, url = %url, "Calling external system");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(auth) = self.auth_header_value() {
            request = request.header(AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        if !status.is_success() {
            tracing::warn!(
                system = %self.name,
                method = %method,
                url = %url,
                status = status.as_u16(),
                "External system returned an error status"
            );
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| TransportError::InvalidResponse(format!("body is not JSON: {e}")))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_decode() {
        TransportError::InvalidResponse(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
