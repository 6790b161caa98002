mod batch;
mod config;
mod models;
mod pipeline;
mod scheduler;
mod scraper;
mod storage;
mod utils;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::{DailyPricesJob, FullScrapeJob, Pipeline};
use crate::scheduler::{JobLog, Scheduler};
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "psx-etl", about = "PSX market data ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh live prices from the market-watch listing (daily mode)
    Daily,

    /// Full scrape: listing + every company detail page (weekly mode)
    Full,

    /// Targeted full scrape of specific symbols
    Scrape {
        /// Comma-separated symbol list, e.g. HUBC,ENGRO,LUCK
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },

    /// Run the recurring job scheduler until Ctrl-C
    Schedule,

    /// Show database statistics
    Stats {
        /// Emit machine-readable JSON instead of the table
        #[arg(long)]
        json: bool,
    },

    /// List all stored company symbols
    Symbols,

    /// Apply schema migrations without scraping
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "psx_market_etl=info,warn",
        1 => "psx_market_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Daily => {
            let _t = utils::Timer::start("Daily price refresh");
            let pipeline = build_pipeline(&config)?;
            let result = pipeline.run_daily().await?;
            report_errors(&result.errors);
            info!("Done: {}", result.summary());
        }

        Command::Full => {
            let _t = utils::Timer::start("Full scrape");
            let pipeline = build_pipeline(&config)?;
            let result = pipeline.run_full().await?;
            report_errors(&result.errors);
            info!("Done: {}", result.summary());
        }

        Command::Scrape { symbols } => {
            let _t = utils::Timer::start("Targeted scrape");
            let pipeline = build_pipeline(&config)?;
            let result = pipeline.run_symbols(&symbols).await?;
            report_errors(&result.errors);
            info!("Done: {}", result.summary());
        }

        Command::Schedule => {
            let repo = open_repo(&config)?;
            let pipeline = Arc::new(Pipeline::new(config.clone(), Arc::clone(&repo))?);

            let tz: Tz = config
                .schedule
                .timezone
                .parse()
                .map_err(|e| anyhow!("invalid timezone '{}': {}", config.schedule.timezone, e))?;

            let mut scheduler = Scheduler::new(tz, Arc::clone(&repo) as Arc<dyn JobLog>);
            scheduler.register(
                "daily-prices",
                &config.schedule.daily_cron,
                Arc::new(DailyPricesJob(Arc::clone(&pipeline))),
            );
            scheduler.register(
                "weekly-full",
                &config.schedule.weekly_cron,
                Arc::new(FullScrapeJob(pipeline)),
            );
            scheduler.run().await?;
        }

        Command::Stats { json } => {
            let repo = open_repo(&config)?;
            let companies = repo.company_count()?;
            let history = repo.history_count()?;
            let financials = repo.financial_count()?;
            let (min, max) = repo.history_date_range().unwrap_or((None, None));

            if json {
                let stats = serde_json::json!({
                    "companies": companies,
                    "history_rows": history,
                    "financial_periods": financials,
                    "history_from": min.map(|d| d.to_string()),
                    "history_to": max.map(|d| d.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("─────────────────────────────────");
                println!("  PSX ETL — Database Stats");
                println!("─────────────────────────────────");
                println!("  Companies  : {}", utils::fmt_number(companies));
                println!("  History    : {}", utils::fmt_number(history));
                println!("  Financials : {}", utils::fmt_number(financials));
                println!("  From       : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
                println!("  To         : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
                println!("─────────────────────────────────");
            }
        }

        Command::Symbols => {
            let repo = open_repo(&config)?;
            let syms = repo.list_symbols()?;
            if syms.is_empty() {
                println!("No symbols — run `psx-etl daily` first.");
            } else {
                println!("{} symbols:", syms.len());
                for s in &syms {
                    println!("  {}", s);
                }
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}

fn open_repo(config: &AppConfig) -> Result<Arc<Repository>> {
    let repo = Arc::new(Repository::open(&config.storage.db_path)?);
    if config.storage.run_migrations {
        repo.run_migrations()?;
    }
    Ok(repo)
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let repo = open_repo(config)?;
    Pipeline::new(config.clone(), repo)
}

fn report_errors(errors: &[String]) {
    for e in errors {
        info!("error: {}", e);
    }
}
