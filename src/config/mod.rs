use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Detail-page batch fetching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Number of detail pages in flight per window.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Staggered start delay applied per item within a window.
    #[serde(default = "default_stagger_delay_ms")]
    pub stagger_delay_ms: u64,

    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

/// Scheduler configuration. Cron expressions use the 6-field
/// seconds-first form; all triggers fire in `timezone`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_daily_cron")]
    pub daily_cron: String,

    #[serde(default = "default_weekly_cron")]
    pub weekly_cron: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://dps.psx.com.pk".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    300
}
fn default_user_agent() -> String {
    "psx-market-etl/0.1 (research project; market data pipeline)".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/psx.duckdb")
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    5
}
fn default_inter_batch_delay_ms() -> u64 {
    3000
}
fn default_stagger_delay_ms() -> u64 {
    400
}
fn default_progress_every() -> usize {
    50
}
fn default_timezone() -> String {
    "Asia/Karachi".to_string()
}
fn default_daily_cron() -> String {
    // Weekday market close + settlement margin
    "0 30 17 * * Mon-Fri".to_string()
}
fn default_weekly_cron() -> String {
    "0 0 22 * * Sun".to_string()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("PSX").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().context("Invalid configuration")?;
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            storage: StorageConfig::default(),
            batch: BatchConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            stagger_delay_ms: default_stagger_delay_ms(),
            progress_every: default_progress_every(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            daily_cron: default_daily_cron(),
            weekly_cron: default_weekly_cron(),
        }
    }
}
