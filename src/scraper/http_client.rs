use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Typed fetch failure. There is no retry here — the daily job treats a
/// listing-page failure as fatal for the run, while the weekly job skips the
/// affected symbol and moves on, so retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request timed out for {url}")]
    Timeout { url: String },

    #[error("request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body for {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with polite rate-limiting. One attempt only.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.polite_delay().await;

        debug!("GET {}", url);

        let resp = self.inner.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            source: e,
        })
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        sleep(total).await;
    }
}
