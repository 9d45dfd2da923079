use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use garmin_ido_sync::common::config::Config;
use garmin_ido_sync::runner::{self, RunReport};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Copy cycling activities from Garmin Connect to iDO Sport.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Date to sync (YYYY-MM-DD). Defaults to today and yesterday.
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// dotenv-style file with credentials and settings
    #[arg(short, long, default_value = ".env")]
    config: PathBuf,

    /// Keep downloaded archives and FIT files here
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn log_summary(report: &RunReport) {
    for result in &report.results {
        info!("{}", result);
        for failure in &result.failures {
            warn!(
                "  {} ({}): {} [{}]",
                failure.activity_name,
                failure.activity_id,
                failure.error,
                failure.error.kind()
            );
        }
    }
    for (date, e) in &report.skipped {
        warn!("{}: skipped, listing failed: {}", date, e);
    }
    info!(
        "Sync completed: {} found, {} uploaded, {} failed, {} dates skipped",
        report.found(),
        report.succeeded(),
        report.failed(),
        report.skipped.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    config.validate()?;
    if cli.artifact_dir.is_some() {
        config.artifact_dir = cli.artifact_dir;
    }

    let dates = match cli.date {
        Some(date) => vec![date],
        None => runner::default_dates(),
    };
    let listed = dates
        .iter()
        .map(NaiveDate::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    info!("Syncing cycling activities for {}", listed);

    let report = runner::run(&config, &dates).await?;
    log_summary(&report);
    Ok(())
}
