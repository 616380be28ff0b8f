//! Catalog lookup client (Invidious or Piped).
//!
//! Only the per-video metadata lookup is used. The response object is passed
//! through as-is so clients see the provider's native fields.

use std::time::Duration;

use serde_json::{Map, Value};
use yb_core::config::CatalogConfig;
use yb_core::{Error, Result};

/// Which catalog API the base URL speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogProvider {
    Invidious,
    Piped,
    /// No catalog; item metadata comes from the resolver alone.
    Disabled,
}

impl CatalogProvider {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "invidious" => CatalogProvider::Invidious,
            "piped" => CatalogProvider::Piped,
            _ => CatalogProvider::Disabled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogProvider::Invidious => "invidious",
            CatalogProvider::Piped => "piped",
            CatalogProvider::Disabled => "none",
        }
    }

    fn video_path(&self, video_id: &str) -> Option<String> {
        match self {
            CatalogProvider::Invidious => Some(format!("/api/v1/videos/{video_id}")),
            CatalogProvider::Piped => Some(format!("/api/v1/video/{video_id}")),
            CatalogProvider::Disabled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    provider: CatalogProvider,
    base_url: String,
}

impl CatalogClient {
    pub fn new(provider: CatalogProvider, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build catalog client: {e}")))?;
        Ok(Self {
            http,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &CatalogConfig) -> Result<Self> {
        Self::new(
            CatalogProvider::parse(&cfg.provider),
            cfg.base_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn provider(&self) -> CatalogProvider {
        self.provider
    }

    /// Fetch the provider's metadata object for a video. Returns `None`
    /// when no catalog is configured.
    pub async fn video(&self, video_id: &str) -> Result<Option<Map<String, Value>>> {
        let Some(path) = self.provider.video_path(video_id) else {
            return Ok(None);
        };
        let url = format!("{}{path}", self.base_url);

        let resp = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("catalog request: {e}"))
            } else {
                Error::upstream(format!("catalog request: {e}"))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(if status.as_u16() == 404 {
                Error::not_found(video_id)
            } else {
                Error::upstream(format!("catalog {status}: {snippet}"))
            });
        }

        match resp.json::<Value>().await {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(Error::upstream("catalog returned a non-object response")),
            Err(e) => Err(Error::upstream(format!("catalog parse error: {e}"))),
        }
    }
}
