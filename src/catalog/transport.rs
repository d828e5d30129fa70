use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::{config::Config, error::CatalogError};

/// The provider rejects requests without a browser user agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/76.0.3809.132 Safari/537.36";

pub type Query = Vec<(&'static str, String)>;

/// Raw access to the catalog gateway. [`super::CatalogClient`] maps the
/// responses into typed records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// GETs `endpoint` (relative to the gateway base URL) and returns the
    /// decoded JSON body.
    async fn get_json(&self, endpoint: &'static str, query: Query) -> Result<serde_json::Value, CatalogError>;

    /// GETs an absolute URL and returns the body bytes.
    async fn get_bytes(&self, url: &str) -> Result<Bytes, CatalogError>;
}

/// [`CatalogTransport`] over `reqwest`, sending the configured cookie with
/// every request.
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        if !config.cookie.is_empty() {
            let mut cookie = HeaderValue::from_str(&config.cookie).context("provider cookie is not a valid header value")?;
            cookie.set_sensitive(true);
            headers.insert(COOKIE, cookie);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: config.api_base_url.clone(),
            client,
        })
    }

    /// The underlying client, shared with the voice driver for streamed
    /// playback so both use the same connection pool.
    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn get_json(&self, endpoint: &'static str, query: Query) -> Result<serde_json::Value, CatalogError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| CatalogError::Lookup(format!("bad endpoint {endpoint}: {e}")))?;

        debug!("🌐 GET {} {:?}", url, query);
        let response = self.client.get(url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            // The gateway mirrors provider failures (e.g. 404 for unknown
            // ids) as HTTP status codes; the JSON body still carries a reason.
            warn!("❌ Catalog {} answered {}", endpoint, status);
            return match response.json::<serde_json::Value>().await {
                Ok(body) if body.get("code").is_some() => Ok(body),
                _ => Err(CatalogError::Status(status.as_u16())),
            };
        }

        Ok(response.json().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, CatalogError> {
        debug!("⬇️ GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?)
    }
}
