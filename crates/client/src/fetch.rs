//! HTTP transport for the catalog feeds.
//!
//! All upstream datasets are anonymous JSON GETs. The client carries its
//! own timeout (distinct from the transport default), a redirect cap, and
//! a response size cap. Feeds and the orchestrator consume the transport
//! through the [`JsonTransport`] trait so tests can substitute a stub.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use shelfmark_core::{AppConfig, Error};
use url::Url;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shelfmark/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 16MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shelfmark/0.1".to_string(),
            max_bytes: 16 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// Anonymous JSON GET transport.
///
/// The one narrow seam between the refresh machinery and the network.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, Error>;
}

/// HTTP fetch client for the catalog feeds.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl JsonTransport for FetchClient {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, Error> {
        let url = Url::parse(url).map_err(|e| Error::Network(format!("invalid URL '{url}': {e}")))?;

        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("request timed out: {url}"))
                } else {
                    Error::Network(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("status {} from {url}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "fetched feed");

        serde_json::from_slice(&bytes).map_err(|e| Error::Parse(format!("invalid JSON from {url}: {e}")))
    }
}
