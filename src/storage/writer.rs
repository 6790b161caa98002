//! Maps parsed records onto relational rows.
//!
//! Every write for a given symbol is independent: a failure writing one
//! symbol's rows is recorded as an error string and never prevents other
//! symbols' writes.

use crate::models::{CompanyFullData, MarketWatchRow, ScrapeResult};
use crate::storage::Repository;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct Writer {
    repo: Arc<Repository>,
}

impl Writer {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Daily mode: refresh live prices and the per-date history row for
    /// every listing row. Re-running on the same date overwrites.
    pub fn apply_daily(&self, rows: &[MarketWatchRow], result: &mut ScrapeResult) {
        for row in rows {
            match self.apply_daily_row(row) {
                Ok(history_written) => {
                    result.prices_updated += 1;
                    if history_written {
                        result.history_saved += 1;
                    }
                }
                Err(e) => result.push_error(&row.symbol, e),
            }
        }
    }

    fn apply_daily_row(&self, row: &MarketWatchRow) -> Result<bool> {
        self.repo.upsert_listing_company(row)?;
        self.repo.update_stock_price(row)?;

        // No close, no history row: suspended listings trade no price
        if let Some(close) = row.current {
            let today = Utc::now().date_naive();
            self.repo.upsert_history(row, today, close)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Full mode: merge each company's identity, fundamentals and financial
    /// periods. Symbol failures accumulate; nothing aborts.
    pub fn apply_full(
        &self,
        companies: &HashMap<String, CompanyFullData>,
        result: &mut ScrapeResult,
    ) {
        let mut symbols: Vec<&String> = companies.keys().collect();
        symbols.sort();

        for symbol in symbols {
            let data = &companies[symbol];
            match self.apply_company(symbol, data) {
                Ok(periods) => {
                    result.companies_updated += 1;
                    result.fundamentals_updated += 1;
                    result.financials_saved += periods;
                }
                Err(e) => {
                    debug!("{}: full write failed: {:#}", symbol, e);
                    result.push_error(symbol, e);
                }
            }
        }
    }

    fn apply_company(&self, symbol: &str, data: &CompanyFullData) -> Result<usize> {
        self.repo.ensure_company(symbol)?;
        self.repo.merge_company_identity(symbol, &data.info)?;
        self.repo
            .merge_stock_fundamentals(symbol, &data.fundamentals, &data.ratios, &data.equity)?;

        let mut saved = 0usize;
        for period in &data.financials {
            self.repo.upsert_financial_period(symbol, period)?;
            saved += 1;
        }
        Ok(saved)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
