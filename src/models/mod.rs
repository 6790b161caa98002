use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Market watch (listing page) ───────────────────────────────────────────────

/// One instrument's snapshot from the market-watch listing page.
/// Produced fresh on every listing parse; never merged across scrapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketWatchRow {
    pub symbol: String,
    pub name: String,
    pub sector_code: Option<String>,
    pub sector_name: Option<String>,
    pub listed_in: Option<String>,
    /// Last day closing price (previous close).
    pub ldcp: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub current: Option<f64>,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    pub volume: Option<i64>,
    pub scraped_at: NaiveDateTime,
}

// ── Company detail sub-records ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub sector: Option<String>,
}

/// Trading fundamentals scraped from the detail page. The price/change pair at
/// the bottom is only a fallback cross-check against the listing-page value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FundamentalsData {
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub ev_ebitda: Option<f64>,
    pub eps: Option<f64>,
    pub book_value: Option<f64>,
    pub dividend_per_share: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub free_float_shares: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub avg_volume: Option<f64>,
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
}

/// Profitability, leverage and liquidity ratios. Orthogonal to
/// [`FundamentalsData`]; both attach to the same stock row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatiosData {
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub roce: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodType {
    Annual,
    Quarterly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Annual => "annual",
            PeriodType::Quarterly => "quarterly",
        }
    }
}

/// One fiscal period's statement line items.
/// Natural key: (symbol, period_type, fiscal_year, quarter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialPeriod {
    pub period_type: PeriodType,
    pub fiscal_year: i32,
    /// 1..=4 for quarterly periods, `None` for annual.
    pub quarter: Option<u8>,
    pub revenue: Option<f64>,
    pub cost_of_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub total_equity: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditure: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

impl FinancialPeriod {
    pub fn new(period_type: PeriodType, fiscal_year: i32, quarter: Option<u8>) -> Self {
        Self {
            period_type,
            fiscal_year,
            quarter,
            revenue: None,
            cost_of_revenue: None,
            gross_profit: None,
            operating_income: None,
            net_income: None,
            eps: None,
            total_assets: None,
            total_liabilities: None,
            total_equity: None,
            operating_cash_flow: None,
            capital_expenditure: None,
            free_cash_flow: None,
        }
    }

    /// Quarter ordinal used in the natural key (0 = annual).
    pub fn quarter_ordinal(&self) -> i32 {
        self.quarter.map(|q| q as i32).unwrap_or(0)
    }
}

/// Market cap and share-count facts scraped from a distinct page section;
/// used to backfill [`FundamentalsData`] when that section omitted them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EquityData {
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub free_float_pct: Option<f64>,
    pub free_float_shares: Option<f64>,
}

/// Everything parsed from one company detail page — the unit of work the
/// batch orchestrator produces and the persistence writer consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyFullData {
    pub symbol: String,
    pub info: CompanyInfo,
    pub fundamentals: FundamentalsData,
    pub ratios: RatiosData,
    pub financials: Vec<FinancialPeriod>,
    pub equity: EquityData,
}

// ── Run-level result ──────────────────────────────────────────────────────────

/// Counters for one job invocation. Never persisted as business data — only
/// summarized into the job log.
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub symbols_found: usize,
    pub prices_updated: usize,
    pub history_saved: usize,
    pub companies_updated: usize,
    pub fundamentals_updated: usize,
    pub financials_saved: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl ScrapeResult {
    pub fn push_error(&mut self, symbol: &str, err: impl std::fmt::Display) {
        self.errors.push(format!("{}: {:#}", symbol, err));
    }

    pub fn summary(&self) -> String {
        format!(
            "{} symbols, {} prices, {} history rows, {} companies, {} fundamentals, {} financial periods, {} errors",
            self.symbols_found,
            self.prices_updated,
            self.history_saved,
            self.companies_updated,
            self.fundamentals_updated,
            self.financials_saved,
            self.errors.len(),
        )
    }
}
