pub mod writer;

use crate::models::{CompanyInfo, EquityData, FinancialPeriod, FundamentalsData, MarketWatchRow, RatiosData};
use crate::scheduler::JobLog;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    symbol       VARCHAR PRIMARY KEY,
    name         VARCHAR NOT NULL DEFAULT '',
    description  VARCHAR,
    logo_url     VARCHAR,
    sector_code  VARCHAR,
    sector_name  VARCHAR,
    updated_at   TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS stocks (
    symbol                  VARCHAR PRIMARY KEY,
    listed_in               VARCHAR,
    -- Live price fields, overwritten by every daily run
    current_price           DOUBLE,
    previous_close          DOUBLE,
    open                    DOUBLE,
    high                    DOUBLE,
    low                     DOUBLE,
    change                  DOUBLE,
    change_pct              DOUBLE,
    volume                  BIGINT,
    -- Fundamentals, merged field-by-field by the weekly run
    market_cap              DOUBLE,
    pe_ratio                DOUBLE,
    pb_ratio                DOUBLE,
    ps_ratio                DOUBLE,
    peg_ratio               DOUBLE,
    ev_ebitda               DOUBLE,
    eps                     DOUBLE,
    book_value              DOUBLE,
    dividend_per_share      DOUBLE,
    dividend_yield          DOUBLE,
    shares_outstanding      DOUBLE,
    free_float_shares       DOUBLE,
    free_float_pct          DOUBLE,
    week52_high             DOUBLE,
    week52_low              DOUBLE,
    avg_volume              DOUBLE,
    -- Ratios
    roe                     DOUBLE,
    roa                     DOUBLE,
    roce                    DOUBLE,
    gross_margin            DOUBLE,
    operating_margin        DOUBLE,
    net_margin              DOUBLE,
    debt_to_equity          DOUBLE,
    debt_ratio              DOUBLE,
    current_ratio           DOUBLE,
    quick_ratio             DOUBLE,
    revenue_growth          DOUBLE,
    earnings_growth         DOUBLE,
    price_updated_at        TIMESTAMP,
    fundamentals_updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS stock_history (
    symbol      VARCHAR NOT NULL,
    date        DATE    NOT NULL,
    open        DOUBLE,
    high        DOUBLE,
    low         DOUBLE,
    close_price DOUBLE  NOT NULL,
    change      DOUBLE,
    change_pct  DOUBLE,
    volume      BIGINT,
    scraped_at  TIMESTAMP NOT NULL,
    PRIMARY KEY (symbol, date)
);

CREATE TABLE IF NOT EXISTS financial_statements (
    symbol              VARCHAR NOT NULL,
    period_type         VARCHAR NOT NULL,
    fiscal_year         INTEGER NOT NULL,
    -- 0 = annual, 1..4 = fiscal quarter
    quarter             INTEGER NOT NULL DEFAULT 0,
    revenue             DOUBLE,
    cost_of_revenue     DOUBLE,
    gross_profit        DOUBLE,
    operating_income    DOUBLE,
    net_income          DOUBLE,
    eps                 DOUBLE,
    total_assets        DOUBLE,
    total_liabilities   DOUBLE,
    total_equity        DOUBLE,
    operating_cash_flow DOUBLE,
    capital_expenditure DOUBLE,
    free_cash_flow      DOUBLE,
    updated_at          TIMESTAMP NOT NULL,
    PRIMARY KEY (symbol, period_type, fiscal_year, quarter)
);

CREATE SEQUENCE IF NOT EXISTS seq_scrape_job_id START 1;

CREATE TABLE IF NOT EXISTS scrape_jobs (
    id          BIGINT PRIMARY KEY,
    name        VARCHAR NOT NULL,
    started_at  TIMESTAMP NOT NULL,
    finished_at TIMESTAMP,
    status      VARCHAR NOT NULL DEFAULT 'running',
    summary     VARCHAR,
    error_msg   VARCHAR,
    duration_ms BIGINT
);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_history_date     ON stock_history (date);
CREATE INDEX IF NOT EXISTS idx_history_symbol   ON stock_history (symbol);
CREATE INDEX IF NOT EXISTS idx_financials_sym   ON financial_statements (symbol);
CREATE INDEX IF NOT EXISTS idx_jobs_name        ON scrape_jobs (name);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Mutex<Connection>,
}

/// Small read-back view over a stock row, for stats and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockSnapshot {
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub free_float_pct: Option<f64>,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Mutex::new(Connection::open_in_memory()?) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("connection mutex poisoned")
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        let conn = self.conn();
        conn.execute_batch(DDL).context("DDL failed")?;
        conn.execute_batch(INDEXES).context("Index creation failed")?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Companies / stocks ────────────────────────────────────────────────────

    /// Make sure the company and its stock row exist before any merge.
    pub fn ensure_company(&self, symbol: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO companies (symbol, name, updated_at) VALUES (?, '', ?)",
            params![symbol, Utc::now().naive_utc()],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO stocks (symbol) VALUES (?)",
            params![symbol],
        )?;
        Ok(())
    }

    /// Upsert the identity fields a listing row carries. The listing name is
    /// authoritative when non-empty; sector fields merge.
    pub fn upsert_listing_company(&self, row: &MarketWatchRow) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            r#"INSERT INTO companies (symbol, name, sector_code, sector_name, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (symbol) DO UPDATE SET
                   name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE companies.name END,
                   sector_code = COALESCE(excluded.sector_code, companies.sector_code),
                   sector_name = COALESCE(excluded.sector_name, companies.sector_name),
                   updated_at = excluded.updated_at"#,
            params![
                row.symbol,
                row.name,
                row.sector_code,
                row.sector_name,
                Utc::now().naive_utc()
            ],
        )
        .with_context(|| format!("upsert company {}", row.symbol))?;

        conn.execute(
            "INSERT OR IGNORE INTO stocks (symbol) VALUES (?)",
            params![row.symbol],
        )?;
        Ok(())
    }

    /// Overwrite the live price fields from the latest listing snapshot.
    /// Listing rows fully replace what is there, including clearing values
    /// the page stopped carrying.
    pub fn update_stock_price(&self, row: &MarketWatchRow) -> Result<()> {
        self.conn()
            .execute(
                r#"UPDATE stocks SET
                       listed_in = ?,
                       current_price = ?, previous_close = ?,
                       open = ?, high = ?, low = ?,
                       change = ?, change_pct = ?, volume = ?,
                       price_updated_at = ?
                   WHERE symbol = ?"#,
                params![
                    row.listed_in,
                    row.current,
                    row.ldcp,
                    row.open,
                    row.high,
                    row.low,
                    row.change,
                    row.change_pct,
                    row.volume,
                    Utc::now().naive_utc(),
                    row.symbol,
                ],
            )
            .with_context(|| format!("update price {}", row.symbol))?;
        Ok(())
    }

    /// Upsert one history row keyed by (symbol, date). A second scrape on
    /// the same date overwrites rather than duplicates.
    pub fn upsert_history(&self, row: &MarketWatchRow, date: NaiveDate, close: f64) -> Result<()> {
        self.conn()
            .execute(
                r#"INSERT INTO stock_history
                       (symbol, date, open, high, low, close_price, change, change_pct, volume, scraped_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT (symbol, date) DO UPDATE SET
                       open = excluded.open,
                       high = excluded.high,
                       low = excluded.low,
                       close_price = excluded.close_price,
                       change = excluded.change,
                       change_pct = excluded.change_pct,
                       volume = excluded.volume,
                       scraped_at = excluded.scraped_at"#,
                params![
                    row.symbol,
                    date,
                    row.open,
                    row.high,
                    row.low,
                    close,
                    row.change,
                    row.change_pct,
                    row.volume,
                    row.scraped_at,
                ],
            )
            .with_context(|| format!("upsert history {} {}", row.symbol, date))?;
        Ok(())
    }

    /// Merge detail-page identity onto the company row. Empty values never
    /// clobber; the logo is replaced only while the stored one is missing or
    /// a generated placeholder.
    pub fn merge_company_identity(&self, symbol: &str, info: &CompanyInfo) -> Result<()> {
        let logo = match &info.logo_url {
            Some(candidate) if !candidate.trim().is_empty() => {
                let current = self.company_logo(symbol);
                let replaceable = current
                    .as_deref()
                    .map(|l| l.is_empty() || l.contains("ui-avatars.com"))
                    .unwrap_or(true);
                if replaceable {
                    Some(candidate.clone())
                } else {
                    None
                }
            }
            _ => None,
        };

        self.conn()
            .execute(
                r#"UPDATE companies SET
                       name = COALESCE(?, name),
                       description = COALESCE(?, description),
                       sector_name = COALESCE(?, sector_name),
                       logo_url = COALESCE(?, logo_url),
                       updated_at = ?
                   WHERE symbol = ?"#,
                params![
                    info.name,
                    info.description,
                    info.sector,
                    logo,
                    Utc::now().naive_utc(),
                    symbol,
                ],
            )
            .with_context(|| format!("merge identity {}", symbol))?;
        Ok(())
    }

    /// Merge fundamentals, ratios and equity onto the stock row. Only
    /// non-null fields are applied so an absent value never clobbers a
    /// previously known one. The detail page's own price/change copy is a
    /// cross-check only and is never written over the listing values.
    pub fn merge_stock_fundamentals(
        &self,
        symbol: &str,
        fundamentals: &FundamentalsData,
        ratios: &RatiosData,
        equity: &EquityData,
    ) -> Result<()> {
        self.conn()
            .execute(
                r#"UPDATE stocks SET
                       market_cap = COALESCE(?, market_cap),
                       pe_ratio = COALESCE(?, pe_ratio),
                       pb_ratio = COALESCE(?, pb_ratio),
                       ps_ratio = COALESCE(?, ps_ratio),
                       peg_ratio = COALESCE(?, peg_ratio),
                       ev_ebitda = COALESCE(?, ev_ebitda),
                       eps = COALESCE(?, eps),
                       book_value = COALESCE(?, book_value),
                       dividend_per_share = COALESCE(?, dividend_per_share),
                       dividend_yield = COALESCE(?, dividend_yield),
                       shares_outstanding = COALESCE(?, shares_outstanding),
                       free_float_shares = COALESCE(?, free_float_shares),
                       free_float_pct = COALESCE(?, free_float_pct),
                       week52_high = COALESCE(?, week52_high),
                       week52_low = COALESCE(?, week52_low),
                       avg_volume = COALESCE(?, avg_volume),
                       roe = COALESCE(?, roe),
                       roa = COALESCE(?, roa),
                       roce = COALESCE(?, roce),
                       gross_margin = COALESCE(?, gross_margin),
                       operating_margin = COALESCE(?, operating_margin),
                       net_margin = COALESCE(?, net_margin),
                       debt_to_equity = COALESCE(?, debt_to_equity),
                       debt_ratio = COALESCE(?, debt_ratio),
                       current_ratio = COALESCE(?, current_ratio),
                       quick_ratio = COALESCE(?, quick_ratio),
                       revenue_growth = COALESCE(?, revenue_growth),
                       earnings_growth = COALESCE(?, earnings_growth),
                       fundamentals_updated_at = ?
                   WHERE symbol = ?"#,
                params![
                    fundamentals.market_cap,
                    fundamentals.pe_ratio,
                    fundamentals.pb_ratio,
                    fundamentals.ps_ratio,
                    fundamentals.peg_ratio,
                    fundamentals.ev_ebitda,
                    fundamentals.eps,
                    fundamentals.book_value,
                    fundamentals.dividend_per_share,
                    fundamentals.dividend_yield,
                    fundamentals.shares_outstanding,
                    fundamentals.free_float_shares,
                    equity.free_float_pct,
                    fundamentals.week52_high,
                    fundamentals.week52_low,
                    fundamentals.avg_volume,
                    ratios.roe,
                    ratios.roa,
                    ratios.roce,
                    ratios.gross_margin,
                    ratios.operating_margin,
                    ratios.net_margin,
                    ratios.debt_to_equity,
                    ratios.debt_ratio,
                    ratios.current_ratio,
                    ratios.quick_ratio,
                    ratios.revenue_growth,
                    ratios.earnings_growth,
                    Utc::now().naive_utc(),
                    symbol,
                ],
            )
            .with_context(|| format!("merge fundamentals {}", symbol))?;
        Ok(())
    }

    // ── Financial statements ──────────────────────────────────────────────────

    /// Existence is checked first to decide update-vs-insert; the natural
    /// key is (symbol, period_type, fiscal_year, quarter).
    pub fn upsert_financial_period(&self, symbol: &str, p: &FinancialPeriod) -> Result<()> {
        let exists = self.financial_period_exists(symbol, p)?;
        let conn = self.conn();
        let now = Utc::now().naive_utc();

        if exists {
            conn.execute(
                r#"UPDATE financial_statements SET
                       revenue = COALESCE(?, revenue),
                       cost_of_revenue = COALESCE(?, cost_of_revenue),
                       gross_profit = COALESCE(?, gross_profit),
                       operating_income = COALESCE(?, operating_income),
                       net_income = COALESCE(?, net_income),
                       eps = COALESCE(?, eps),
                       total_assets = COALESCE(?, total_assets),
                       total_liabilities = COALESCE(?, total_liabilities),
                       total_equity = COALESCE(?, total_equity),
                       operating_cash_flow = COALESCE(?, operating_cash_flow),
                       capital_expenditure = COALESCE(?, capital_expenditure),
                       free_cash_flow = COALESCE(?, free_cash_flow),
                       updated_at = ?
                   WHERE symbol = ? AND period_type = ? AND fiscal_year = ? AND quarter = ?"#,
                params![
                    p.revenue,
                    p.cost_of_revenue,
                    p.gross_profit,
                    p.operating_income,
                    p.net_income,
                    p.eps,
                    p.total_assets,
                    p.total_liabilities,
                    p.total_equity,
                    p.operating_cash_flow,
                    p.capital_expenditure,
                    p.free_cash_flow,
                    now,
                    symbol,
                    p.period_type.as_str(),
                    p.fiscal_year,
                    p.quarter_ordinal(),
                ],
            )
            .with_context(|| format!("update financials {} {}", symbol, p.fiscal_year))?;
        } else {
            conn.execute(
                r#"INSERT INTO financial_statements
                       (symbol, period_type, fiscal_year, quarter,
                        revenue, cost_of_revenue, gross_profit, operating_income,
                        net_income, eps, total_assets, total_liabilities, total_equity,
                        operating_cash_flow, capital_expenditure, free_cash_flow, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    symbol,
                    p.period_type.as_str(),
                    p.fiscal_year,
                    p.quarter_ordinal(),
                    p.revenue,
                    p.cost_of_revenue,
                    p.gross_profit,
                    p.operating_income,
                    p.net_income,
                    p.eps,
                    p.total_assets,
                    p.total_liabilities,
                    p.total_equity,
                    p.operating_cash_flow,
                    p.capital_expenditure,
                    p.free_cash_flow,
                    now,
                ],
            )
            .with_context(|| format!("insert financials {} {}", symbol, p.fiscal_year))?;
        }
        Ok(())
    }

    pub fn financial_period_exists(&self, symbol: &str, p: &FinancialPeriod) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            r#"SELECT COUNT(*) FROM financial_statements
               WHERE symbol = ? AND period_type = ? AND fiscal_year = ? AND quarter = ?"#,
            params![symbol, p.period_type.as_str(), p.fiscal_year, p.quarter_ordinal()],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    // ── Read-back queries ─────────────────────────────────────────────────────

    pub fn list_symbols(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT symbol FROM companies ORDER BY symbol")?;
        let syms: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(syms)
    }

    pub fn company_logo(&self, symbol: &str) -> Option<String> {
        self.conn()
            .query_row(
                "SELECT logo_url FROM companies WHERE symbol = ?",
                params![symbol],
                |r| r.get(0),
            )
            .ok()
            .flatten()
    }

    pub fn get_stock(&self, symbol: &str) -> Option<StockSnapshot> {
        self.conn()
            .query_row(
                r#"SELECT current_price, previous_close, volume, market_cap,
                          pe_ratio, shares_outstanding, free_float_pct
                   FROM stocks WHERE symbol = ?"#,
                params![symbol],
                |r| {
                    Ok(StockSnapshot {
                        current_price: r.get(0)?,
                        previous_close: r.get(1)?,
                        volume: r.get(2)?,
                        market_cap: r.get(3)?,
                        pe_ratio: r.get(4)?,
                        shares_outstanding: r.get(5)?,
                        free_float_pct: r.get(6)?,
                    })
                },
            )
            .ok()
    }

    pub fn history_close(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.conn()
            .query_row(
                "SELECT close_price FROM stock_history WHERE symbol = ? AND date = ?",
                params![symbol, date],
                |r| r.get(0),
            )
            .ok()
    }

    pub fn company_count(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?)
    }

    pub fn history_count(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM stock_history", [], |r| r.get(0))?)
    }

    pub fn financial_count(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM financial_statements", [], |r| r.get(0))?)
    }

    pub fn history_date_range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        Ok(self.conn().query_row(
            "SELECT MIN(date), MAX(date) FROM stock_history",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
    }

    pub fn job_status(&self, id: i64) -> Option<String> {
        self.conn()
            .query_row(
                "SELECT status FROM scrape_jobs WHERE id = ?",
                params![id],
                |r| r.get(0),
            )
            .ok()
    }
}

// ── Job log sink ──────────────────────────────────────────────────────────────

#[async_trait]
impl JobLog for Repository {
    async fn log_job_start(&self, name: &str) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn.query_row("SELECT nextval('seq_scrape_job_id')", [], |r| r.get(0))?;
        conn.execute(
            "INSERT INTO scrape_jobs (id, name, started_at, status) VALUES (?, ?, ?, 'running')",
            params![id, name, Utc::now().naive_utc()],
        )
        .with_context(|| format!("log job start {}", name))?;
        Ok(id)
    }

    async fn log_job_complete(&self, id: i64, summary: &str, duration: Duration) -> Result<()> {
        self.conn().execute(
            r#"UPDATE scrape_jobs SET
                   finished_at = ?, status = 'completed', summary = ?, duration_ms = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                summary,
                duration.as_millis() as i64,
                id
            ],
        )?;
        Ok(())
    }

    async fn log_job_fail(&self, id: i64, error: &str, duration: Duration) -> Result<()> {
        self.conn().execute(
            r#"UPDATE scrape_jobs SET
                   finished_at = ?, status = 'failed', error_msg = ?, duration_ms = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                error,
                duration.as_millis() as i64,
                id
            ],
        )?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    #[tokio::test]
    async fn test_job_log_lifecycle_rows() {
        let repo = repo();

        let id = repo.log_job_start("daily-prices").await.unwrap();
        assert_eq!(repo.job_status(id).as_deref(), Some("running"));

        repo.log_job_complete(id, "5 symbols", Duration::from_millis(1_200))
            .await
            .unwrap();
        assert_eq!(repo.job_status(id).as_deref(), Some("completed"));

        let id2 = repo.log_job_start("weekly-full").await.unwrap();
        assert!(id2 > id);
        repo.log_job_fail(id2, "listing unreachable", Duration::from_millis(40))
            .await
            .unwrap();
        assert_eq!(repo.job_status(id2).as_deref(), Some("failed"));
        // The first job's row is untouched by the second lifecycle
        assert_eq!(repo.job_status(id).as_deref(), Some("completed"));
    }
}
