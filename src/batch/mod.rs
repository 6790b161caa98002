//! Batch orchestrator: fans detail-page fetch+parse work out over fixed-size
//! windows. Within a window every fetch runs concurrently with a staggered
//! start so requests don't land as a burst; the window is awaited fully
//! before the inter-batch delay and the next window. A failed symbol is
//! recorded and excluded from the result map — it never aborts the batch.

use crate::config::BatchConfig;
use crate::models::{CompanyFullData, ScrapeResult};
use crate::scraper::MarketDataSource;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

pub struct BatchOrchestrator {
    source: Arc<dyn MarketDataSource>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(source: Arc<dyn MarketDataSource>, config: BatchConfig) -> Self {
        Self { source, config }
    }

    /// Fetch + parse every symbol's detail page. Per-symbol failures land in
    /// `result.errors`; the returned map holds only the successes.
    pub async fn fetch_all(
        &self,
        symbols: &[String],
        result: &mut ScrapeResult,
    ) -> HashMap<String, CompanyFullData> {
        let batch_size = self.config.batch_size.max(1);
        let mut out = HashMap::new();
        let mut completed = 0usize;

        for (window_idx, window) in symbols.chunks(batch_size).enumerate() {
            if window_idx > 0 {
                sleep(Duration::from_millis(self.config.inter_batch_delay_ms)).await;
            }

            let mut handles = Vec::with_capacity(window.len());
            for (i, symbol) in window.iter().enumerate() {
                let source = Arc::clone(&self.source);
                let symbol = symbol.clone();
                let stagger = Duration::from_millis(self.config.stagger_delay_ms * i as u64);

                handles.push(tokio::spawn(async move {
                    sleep(stagger).await;
                    source.fetch_company(&symbol).await
                }));
            }

            for (symbol, handle) in window.iter().zip(handles) {
                match handle.await {
                    Ok(Ok(data)) => {
                        out.insert(symbol.clone(), data);
                    }
                    Ok(Err(e)) => {
                        debug!("{}: detail fetch failed: {:#}", symbol, e);
                        result.push_error(symbol, e);
                    }
                    Err(e) => {
                        error!("Task panic for {}: {}", symbol, e);
                        result.push_error(symbol, e);
                    }
                }

                completed += 1;
                if self.config.progress_every > 0 && completed % self.config.progress_every == 0 {
                    info!("detail pages: {}/{} fetched", completed, symbols.len());
                }
            }
        }

        out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketWatchRow;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct FlakySource {
        failing: String,
    }

    #[async_trait]
    impl MarketDataSource for FlakySource {
        async fn fetch_market_watch(&self) -> Result<Vec<MarketWatchRow>> {
            Ok(vec![])
        }

        async fn fetch_company(&self, symbol: &str) -> Result<CompanyFullData> {
            if symbol == self.failing {
                Err(anyhow!("boom"))
            } else {
                Ok(CompanyFullData {
                    symbol: symbol.to_string(),
                    ..Default::default()
                })
            }
        }
    }

    fn fast_config() -> BatchConfig {
        BatchConfig {
            batch_size: 2,
            inter_batch_delay_ms: 0,
            stagger_delay_ms: 0,
            progress_every: 50,
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let symbols: Vec<String> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let orchestrator = BatchOrchestrator::new(
            Arc::new(FlakySource { failing: "C".to_string() }),
            fast_config(),
        );

        let mut result = ScrapeResult::default();
        let out = orchestrator.fetch_all(&symbols, &mut result).await;

        assert_eq!(out.len(), 4);
        assert!(!out.contains_key("C"));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("C:"));
    }

    #[tokio::test]
    async fn test_all_symbols_fetched_across_windows() {
        let symbols: Vec<String> = (0..7).map(|i| format!("S{}", i)).collect();
        let orchestrator = BatchOrchestrator::new(
            Arc::new(FlakySource { failing: String::new() }),
            fast_config(),
        );

        let mut result = ScrapeResult::default();
        let out = orchestrator.fetch_all(&symbols, &mut result).await;

        assert_eq!(out.len(), 7);
        assert!(result.errors.is_empty());
    }
}
