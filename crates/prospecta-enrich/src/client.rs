//! HTTP client for the internal research service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use prospecta_core::{
    defaults, Enricher, EnrichmentPatch, EnrichmentRequest, Error, JobKind, Result,
};

/// Configuration for the research service client.
#[derive(Debug, Clone)]
pub struct ResearchClientConfig {
    /// Base URL of the research service.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Timeout for a single enrichment request.
    pub timeout: Duration,
}

impl Default for ResearchClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::RESEARCH_SERVICE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(defaults::ENRICH_TIMEOUT_SECS),
        }
    }
}

impl ResearchClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("RESEARCH_SERVICE_URL") {
            config.base_url = url;
        }
        if let Ok(key) = std::env::var("RESEARCH_SERVICE_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(raw) = std::env::var("RESEARCH_SERVICE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(
                    value = %raw,
                    "Invalid RESEARCH_SERVICE_TIMEOUT_SECS, using default"
                ),
            }
        }
        config
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct EnrichBody<'a> {
    item_id: uuid::Uuid,
    kind: &'a str,
    payload: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    research: Option<serde_json::Value>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    summary: Option<String>,
}

/// Client for the research service's enrichment endpoint.
///
/// A 429 from the service maps to [`Error::RateLimited`]; every other
/// non-success status maps to [`Error::Enrichment`]. The caller decides
/// whether and how to retry.
#[derive(Clone)]
pub struct ResearchClient {
    client: Client,
    config: ResearchClientConfig,
}

impl ResearchClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ResearchClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Base URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Run one enrichment call against the research service.
    pub async fn enrich(&self, req: &EnrichmentRequest) -> Result<EnrichmentPatch> {
        let start = Instant::now();
        let body = EnrichBody {
            item_id: req.item_id,
            kind: req.kind.as_str(),
            payload: &req.payload,
        };

        let mut request = self
            .client
            .post(format!("{}/v1/enrich", self.config.base_url))
            .timeout(self.config.timeout)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unspecified")
                .to_string();
            return Err(Error::RateLimited(format!(
                "Research service rate limit, retry-after: {retry_after}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Enrichment(format!(
                "Research service returned {status}: {text}"
            )));
        }

        let parsed: EnrichResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("Failed to parse response: {e}")))?;

        debug!(
            subsystem = "enrich",
            item_id = %req.item_id,
            kind = %req.kind,
            duration_ms = start.elapsed().as_millis() as u64,
            "Enrichment call complete"
        );

        Ok(EnrichmentPatch {
            research: parsed.research,
            category: parsed.category,
            tags: parsed.tags,
            summary: parsed.summary,
        })
    }
}

/// [`Enricher`] backed by the research service, bound to one job kind.
#[derive(Clone)]
pub struct HttpEnricher {
    client: ResearchClient,
    kind: JobKind,
}

impl HttpEnricher {
    pub fn new(client: ResearchClient, kind: JobKind) -> Self {
        Self { client, kind }
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn enrich(&self, req: EnrichmentRequest) -> Result<EnrichmentPatch> {
        self.client.enrich(&req).await
    }
}
