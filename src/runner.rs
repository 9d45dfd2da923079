use crate::artifacts::ArtifactStore;
use crate::common::config::Config;
use crate::errors::{FetchError, SetupError};
use crate::garmin::{ActivitySource, source_from_config};
use crate::ido::{ActivityDestination, destination_from_config};
use crate::sync::{SyncResult, Syncer};
use anyhow::Result;
use chrono::{Days, Local, NaiveDate};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<SyncResult>,
    /// Dates whose listing failed, so nothing on them was attempted.
    pub skipped: Vec<(NaiveDate, FetchError)>,
}

impl RunReport {
    pub fn found(&self) -> usize {
        self.results.iter().map(|r| r.found).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().map(|r| r.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().map(SyncResult::failed).sum()
    }
}

/// Today and yesterday on the local clock, today first.
pub fn default_dates() -> Vec<NaiveDate> {
    let today = Local::now().date_naive();
    match today.checked_sub_days(Days::new(1)) {
        Some(yesterday) => vec![today, yesterday],
        None => vec![today],
    }
}

/// Build both adapters from `config` and sync `dates`.
pub async fn run(config: &Config, dates: &[NaiveDate]) -> Result<RunReport> {
    let source = source_from_config(config)?;
    let destination = destination_from_config(config)?;
    let artifacts = config.artifact_dir.as_deref().map(ArtifactStore::new);

    Ok(run_with(
        source.as_ref(),
        destination.as_ref(),
        dates,
        artifacts.as_ref(),
        config.batch_deadline,
    )
    .await?)
}

/// One session per platform for the whole run. Both are released on every path out,
/// including a failed destination login.
pub async fn run_with(
    source: &dyn ActivitySource,
    destination: &dyn ActivityDestination,
    dates: &[NaiveDate],
    artifacts: Option<&ArtifactStore>,
    deadline: Option<Duration>,
) -> Result<RunReport, SetupError> {
    if let Err(e) = source.login().await {
        release(source, destination).await;
        return Err(SetupError::SourceLogin(e));
    }
    if let Err(e) = destination.login().await {
        release(source, destination).await;
        return Err(SetupError::DestinationLogin(e));
    }

    let syncer = Syncer::new(source, destination)
        .with_artifacts(artifacts)
        .with_deadline(deadline);

    let mut report = RunReport::default();
    for &date in dates {
        info!("Syncing activities for {}", date);
        match syncer.sync_bike_activities(date).await {
            Ok(result) => report.results.push(result),
            Err(e) => {
                error!("Failed to fetch activities for {}: {}", date, e);
                report.skipped.push((date, e));
            }
        }
    }

    release(source, destination).await;
    Ok(report)
}

async fn release(source: &dyn ActivitySource, destination: &dyn ActivityDestination) {
    if let Err(e) = destination.close().await {
        warn!("Failed to close iDO session: {}", e);
    }
    if let Err(e) = source.logout().await {
        warn!("Failed to log out of Garmin: {}", e);
    }
}
