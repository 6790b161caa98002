pub mod company;
pub mod http_client;
pub mod listing;
pub mod text;

use crate::config::ScraperConfig;
use crate::models::{CompanyFullData, MarketWatchRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use self::company::parse_company_page;
use self::http_client::HttpClient;
use self::listing::parse_listing;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable data source abstraction. The batch orchestrator and pipeline
/// only see this trait, so tests can inject synthetic sources.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch and parse the market-watch listing page. Failure here is fatal
    /// to the calling job.
    async fn fetch_market_watch(&self) -> Result<Vec<MarketWatchRow>>;

    /// Fetch and parse one company detail page. Failure here is recoverable;
    /// the caller skips the symbol.
    async fn fetch_company(&self, symbol: &str) -> Result<CompanyFullData>;
}

// ── Exchange portal scraper ───────────────────────────────────────────────────

pub struct PsxScraper {
    client: HttpClient,
    base_url: String,
}

impl PsxScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn market_watch_url(&self) -> String {
        format!("{}/market-watch", self.base_url)
    }

    /// URL for a specific company's page. e.g. HUBC → /company/HUBC
    fn company_url(&self, symbol: &str) -> String {
        format!("{}/company/{}", self.base_url, symbol.to_uppercase())
    }
}

#[async_trait]
impl MarketDataSource for PsxScraper {
    async fn fetch_market_watch(&self) -> Result<Vec<MarketWatchRow>> {
        let url = self.market_watch_url();
        let html = self
            .client
            .get_text(&url)
            .await
            .context("Failed to fetch market watch page")?;

        let rows = parse_listing(&html)?;
        debug!("market watch: {} rows", rows.len());
        Ok(rows)
    }

    async fn fetch_company(&self, symbol: &str) -> Result<CompanyFullData> {
        let url = self.company_url(symbol);
        let html = self
            .client
            .get_text(&url)
            .await
            .with_context(|| format!("Failed to fetch company page for {}", symbol))?;

        Ok(parse_company_page(&html, symbol))
    }
}
