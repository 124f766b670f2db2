//! Sandwich Screener - moving-average sandwich screening for KRX watchlists.
//!
//! Runs one stateless screening pass, prints the report on stdout and
//! optionally delivers it to Telegram.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use sandwich_common::config::Config;
use sandwich_common::logging::init_logging_with_exclusions;
use sandwich_screener::screener::ReportFormat;
use sandwich_screener::ScreeningService;
use std::path::PathBuf;

/// Screen a watchlist for names trading between their 120/224-day averages.
#[derive(Parser, Debug)]
#[command(name = "sandwich-screener")]
#[command(version)]
#[command(about = "Moving-average sandwich screener for KRX watchlists", long_about = None)]
struct Cli {
    /// Config file (default: ~/.sandwich/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one screening pass and print the report
    Run {
        /// Deliver the report through the configured notifier
        #[arg(long)]
        notify: bool,

        /// Report format: telegram, plain, json (default: telegram with --notify, plain otherwise)
        #[arg(long)]
        format: Option<ReportFormat>,
    },

    /// Resolve the watchlist against the latest ticker listing
    Resolve,

    /// Print the effective configuration with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_env(cli.config.as_deref())?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Sandwich Screener v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config => {
            let json = serde_json::to_string_pretty(&config.redacted())
                .context("Failed to serialize config")?;
            println!("{json}");
        }
        Commands::Resolve => {
            config.validate()?;
            let service = ScreeningService::new(&config, ReportFormat::Plain)?;
            let watchlist = service.load_watchlist().await?;
            let resolution = service
                .resolve(&watchlist, Local::now().date_naive())
                .await?;

            println!("source:         {}", resolution.source);
            println!("date:           {}", resolution.date);
            println!("listing size:   {}", resolution.listing_size);
            println!("resolved:       {}/{}", resolution.tickers.len(), watchlist.len());
            for entry in watchlist.iter().filter(|e| resolution.tickers.get(&e.name).is_none()) {
                println!("unresolved:     {}", entry.name);
            }
        }
        Commands::Run { notify, format } => {
            config.validate()?;
            if notify && !config.telegram.enabled {
                tracing::warn!("--notify given but telegram is disabled; report will only be printed");
            }

            let format = format.unwrap_or(if notify {
                ReportFormat::Telegram
            } else {
                ReportFormat::Plain
            });
            let service = ScreeningService::new(&config, format)?;
            let report = service.run(notify).await?;

            tracing::info!(
                run_id = %report.run_id,
                source = report.listing_source,
                matches = report.ranked.len(),
                failures = report.outcome.failures.len(),
                delivered = report.delivered,
                "Run complete"
            );
            println!("{}", report.text);
        }
    }

    Ok(())
}
