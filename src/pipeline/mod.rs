//! Pipeline orchestration: ties scraper → batch → writer together.
//!
//! ## Run modes
//!
//! `run_daily()` — fetch the market-watch listing, refresh live prices and
//!   the per-date history rows. Listing failure is fatal to the run.
//!
//! `run_full()` — daily steps, then fetch+parse every discovered company's
//!   detail page in batches and merge fundamentals, ratios, equity and
//!   financial statements. Per-symbol failures are recorded and skipped.
//!
//! `run_symbols()` — targeted full scrape of an explicit symbol list.

use crate::batch::BatchOrchestrator;
use crate::config::AppConfig;
use crate::models::ScrapeResult;
use crate::scheduler::JobTask;
use crate::scraper::text::normalise_symbol;
use crate::scraper::{MarketDataSource, PsxScraper};
use crate::storage::writer::Writer;
use crate::storage::Repository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct Pipeline {
    config: AppConfig,
    repo: Arc<Repository>,
    source: Arc<dyn MarketDataSource>,
}

impl Pipeline {
    pub fn new(config: AppConfig, repo: Arc<Repository>) -> Result<Self> {
        let source = Arc::new(PsxScraper::new(&config.scraper)?);
        Ok(Self::with_source(config, repo, source))
    }

    /// Inject a custom source; used by tests.
    pub fn with_source(
        config: AppConfig,
        repo: Arc<Repository>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self { config, repo, source }
    }

    pub async fn run_daily(&self) -> Result<ScrapeResult> {
        let started = Instant::now();
        let mut result = ScrapeResult::default();

        let rows = self
            .source
            .fetch_market_watch()
            .await
            .context("Market watch fetch failed")?;
        result.symbols_found = rows.len();
        info!("listing: {} symbols", rows.len());

        Writer::new(Arc::clone(&self.repo)).apply_daily(&rows, &mut result);

        result.duration = started.elapsed();
        info!("daily run done: {}", result.summary());
        Ok(result)
    }

    pub async fn run_full(&self) -> Result<ScrapeResult> {
        let started = Instant::now();
        let mut result = ScrapeResult::default();
        let writer = Writer::new(Arc::clone(&self.repo));

        let rows = self
            .source
            .fetch_market_watch()
            .await
            .context("Market watch fetch failed")?;
        result.symbols_found = rows.len();
        info!("listing: {} symbols", rows.len());

        writer.apply_daily(&rows, &mut result);

        let symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
        let orchestrator =
            BatchOrchestrator::new(Arc::clone(&self.source), self.config.batch.clone());
        let companies = orchestrator.fetch_all(&symbols, &mut result).await;
        info!("detail pages: {}/{} parsed", companies.len(), symbols.len());

        // The detail page carries its own price copy; it never overwrites
        // the listing values but a large gap flags a stale or broken page.
        for row in &rows {
            let Some(company) = companies.get(&row.symbol) else { continue };
            let detail = company.fundamentals.current_price;
            if let (Some(listing), Some(detail)) = (row.current, detail) {
                if price_divergence(listing, detail) > PRICE_DIVERGENCE_WARN {
                    warn!(
                        "{}: detail page quotes {} (change {:?}) but listing says {}",
                        row.symbol, detail, company.fundamentals.price_change, listing
                    );
                }
            }
        }

        writer.apply_full(&companies, &mut result);

        result.duration = started.elapsed();
        info!("full run done: {}", result.summary());
        Ok(result)
    }

    /// Targeted re-scrape of specific symbols, skipping listing discovery.
    pub async fn run_symbols(&self, symbols: &[String]) -> Result<ScrapeResult> {
        let started = Instant::now();
        let mut result = ScrapeResult::default();

        let symbols: Vec<String> = symbols.iter().map(|s| normalise_symbol(s)).collect();
        result.symbols_found = symbols.len();

        let orchestrator =
            BatchOrchestrator::new(Arc::clone(&self.source), self.config.batch.clone());
        let companies = orchestrator.fetch_all(&symbols, &mut result).await;

        Writer::new(Arc::clone(&self.repo)).apply_full(&companies, &mut result);

        result.duration = started.elapsed();
        info!("targeted run done: {}", result.summary());
        Ok(result)
    }
}

const PRICE_DIVERGENCE_WARN: f64 = 0.05;

/// Relative gap between the listing price and the detail page's own copy.
fn price_divergence(listing: f64, detail: f64) -> f64 {
    if listing == 0.0 {
        return if detail == 0.0 { 0.0 } else { f64::INFINITY };
    }
    ((detail - listing) / listing).abs()
}

// ── Scheduled job adapters ────────────────────────────────────────────────────

pub struct DailyPricesJob(pub Arc<Pipeline>);

#[async_trait]
impl JobTask for DailyPricesJob {
    async fn run(&self) -> Result<String> {
        Ok(self.0.run_daily().await?.summary())
    }
}

pub struct FullScrapeJob(pub Arc<Pipeline>);

#[async_trait]
impl JobTask for FullScrapeJob {
    async fn run(&self) -> Result<String> {
        Ok(self.0.run_full().await?.summary())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyFullData, FinancialPeriod, MarketWatchRow, PeriodType};
    use chrono::Utc;

    struct StubSource;

    #[async_trait]
    impl MarketDataSource for StubSource {
        async fn fetch_market_watch(&self) -> Result<Vec<MarketWatchRow>> {
            Ok(vec![MarketWatchRow {
                symbol: "ABC".to_string(),
                name: "ABC Industries".to_string(),
                sector_code: None,
                sector_name: None,
                listed_in: None,
                ldcp: Some(100.0),
                open: None,
                high: None,
                low: None,
                current: Some(101.50),
                change: Some(1.50),
                change_pct: Some(1.50),
                volume: Some(10_000),
                scraped_at: Utc::now().naive_utc(),
            }])
        }

        async fn fetch_company(&self, symbol: &str) -> Result<CompanyFullData> {
            let mut annual = FinancialPeriod::new(PeriodType::Annual, 2024, None);
            annual.revenue = Some(40_000.0);
            Ok(CompanyFullData {
                symbol: symbol.to_string(),
                financials: vec![annual],
                ..Default::default()
            })
        }
    }

    fn pipeline() -> (Pipeline, Arc<Repository>) {
        let repo = Arc::new(Repository::open_in_memory().unwrap());
        repo.run_migrations().unwrap();
        let mut config = AppConfig::default();
        config.batch.inter_batch_delay_ms = 0;
        config.batch.stagger_delay_ms = 0;
        let p = Pipeline::with_source(config, Arc::clone(&repo), Arc::new(StubSource));
        (p, repo)
    }

    #[tokio::test]
    async fn test_daily_run_touches_prices_not_statements() {
        let (pipeline, repo) = pipeline();
        let result = pipeline.run_daily().await.unwrap();

        assert_eq!(result.symbols_found, 1);
        assert_eq!(result.prices_updated, 1);
        assert_eq!(result.history_saved, 1);
        assert_eq!(repo.get_stock("ABC").unwrap().current_price, Some(101.50));
        assert_eq!(repo.financial_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_run_adds_statements() {
        let (pipeline, repo) = pipeline();
        let result = pipeline.run_full().await.unwrap();

        assert_eq!(result.financials_saved, 1);
        assert_eq!(repo.financial_count().unwrap(), 1);
        assert_eq!(repo.get_stock("ABC").unwrap().current_price, Some(101.50));
    }

    #[test]
    fn test_price_divergence_is_relative_and_signless() {
        assert_eq!(price_divergence(100.0, 100.0), 0.0);
        assert!(price_divergence(100.0, 104.0) < PRICE_DIVERGENCE_WARN);
        assert!(price_divergence(100.0, 94.0) > PRICE_DIVERGENCE_WARN);
        assert!(price_divergence(100.0, 106.0) > PRICE_DIVERGENCE_WARN);
        assert!(price_divergence(0.0, 5.0).is_infinite());
        assert_eq!(price_divergence(0.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_targeted_run_uses_explicit_list() {
        let (pipeline, repo) = pipeline();
        let result = pipeline
            .run_symbols(&["def".to_string()])
            .await
            .unwrap();

        assert_eq!(result.symbols_found, 1);
        assert_eq!(result.financials_saved, 1);
        assert!(repo.list_symbols().unwrap().contains(&"DEF".to_string()));
    }
}
