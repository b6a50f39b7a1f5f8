use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::demo;
use super::descriptor::SourceDescriptor;
use crate::config::{Credentials, DataMode};
use crate::error::SourceError;

/// Trait every payload source implements: one fetch, one opaque JSON payload.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<serde_json::Value, SourceError>;

    /// Whether payloads are synthetic.
    fn is_demo(&self) -> bool {
        false
    }
}

/// Live provider fetcher over HTTP.
pub struct HttpFetcher {
    http: Client,
    api_key: Option<String>,
}

impl HttpFetcher {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        HttpFetcher { http, api_key }
    }

    fn request_url(&self, descriptor: &SourceDescriptor) -> Result<Url, SourceError> {
        let mut url = Url::parse(&descriptor.endpoint).map_err(|e| {
            SourceError::Unknown(format!("invalid endpoint '{}': {}", descriptor.endpoint, e))
        })?;
        if let (Some(param), Some(key)) = (descriptor.provider.api_key_param(), &self.api_key) {
            url.query_pairs_mut().append_pair(param, key);
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<serde_json::Value, SourceError> {
        if descriptor.requires_auth && self.api_key.is_none() {
            return Err(SourceError::Unauthorized(format!(
                "no credential configured for {}",
                descriptor.id
            )));
        }
        let url = self.request_url(descriptor)?;
        debug!("Fetching {} from {}", descriptor.id, descriptor.endpoint);

        let resp = self
            .http
            .get(url)
            .header("User-Agent", "sportsedge/0.1")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::from_status(status, &body));
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| SourceError::MalformedPayload(e.to_string()))
    }
}

/// Deterministic synthetic payloads in the same shapes as the real providers.
pub struct DemoFetcher {
    anchor: DateTime<Utc>,
}

impl DemoFetcher {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        DemoFetcher { anchor }
    }

    /// Anchor demo schedules at today's UTC midnight.
    pub fn today() -> Self {
        Self::new(demo::today_anchor())
    }
}

#[async_trait]
impl SourceFetcher for DemoFetcher {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<serde_json::Value, SourceError> {
        Ok(demo::payload_for(descriptor, self.anchor))
    }

    fn is_demo(&self) -> bool {
        true
    }
}

/// Chooses a fetcher for each descriptor at registration time.
pub trait FetcherFactory: Send + Sync {
    fn fetcher_for(&self, descriptor: &SourceDescriptor) -> Arc<dyn SourceFetcher>;
}

/// Picks live or demo fetchers according to the resolved `DataMode`.
pub struct ModeFetcherFactory {
    mode: DataMode,
    credentials: Credentials,
    http: Client,
    demo: Arc<DemoFetcher>,
}

impl ModeFetcherFactory {
    pub fn new(
        mode: DataMode,
        credentials: Credentials,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(ModeFetcherFactory {
            mode,
            credentials,
            http,
            demo: Arc::new(DemoFetcher::today()),
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }
}

impl FetcherFactory for ModeFetcherFactory {
    fn fetcher_for(&self, descriptor: &SourceDescriptor) -> Arc<dyn SourceFetcher> {
        let key = self.credentials.for_kind(descriptor.provider);
        let use_demo = match self.mode {
            DataMode::Demo => true,
            DataMode::Live => false,
            DataMode::Hybrid => descriptor.requires_auth && key.is_none(),
        };
        if use_demo {
            return self.demo.clone();
        }
        Arc::new(HttpFetcher::new(self.http.clone(), key.map(str::to_string)))
    }
}
