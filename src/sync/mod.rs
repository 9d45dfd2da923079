//! The per-date batch: list cycling activities, then move each one through
//! download, extraction, type mapping and upload. Failures are recorded per activity
//! and never stop the batch.

use crate::archive::{FIT_EXTENSION, extract_payload};
use crate::artifacts::ArtifactStore;
use crate::common::metrics;
use crate::errors::{FetchError, ItemError};
use crate::garmin::{Activity, ActivitySource};
use crate::ido::{ActivityDestination, ActivityUpload};
use crate::sport_type::{DEFAULT_SPORT_TYPE, SportType};
use chrono::NaiveDate;
use function_timer::time;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

mod result;

pub use result::{ActivityFailure, SyncResult, TransferState};

pub struct Syncer<'a> {
    source: &'a dyn ActivitySource,
    destination: &'a dyn ActivityDestination,
    artifacts: Option<&'a ArtifactStore>,
    deadline: Option<Duration>,
}

impl<'a> Syncer<'a> {
    pub fn new(source: &'a dyn ActivitySource, destination: &'a dyn ActivityDestination) -> Self {
        Self {
            source,
            destination,
            artifacts: None,
            deadline: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: Option<&'a ArtifactStore>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Activities not started within `deadline` of the batch start are failed without
    /// being attempted.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sync every cycling activity that started on `date`. Only a listing failure is
    /// returned as an error; everything after that lands in the [`SyncResult`].
    #[time("sync_bike_activities_duration")]
    pub async fn sync_bike_activities(&self, date: NaiveDate) -> Result<SyncResult, FetchError> {
        let started = Instant::now();
        let activities = self.source.list_bike_activities(date).await?;

        let mut result = SyncResult::new(date);
        result.found = activities.len();
        if activities.is_empty() {
            info!("No cycling activities found for {}", date);
            return Ok(result);
        }

        info!("Found {} cycling activities for {}", activities.len(), date);
        let total = activities.len();

        for (index, activity) in activities.iter().enumerate() {
            info!(
                "[{}/{}] {} ({:.2} km, {:.0} min)",
                index + 1,
                total,
                activity.name,
                activity.distance_km(),
                activity.duration_minutes()
            );

            let outcome = match self.deadline {
                Some(deadline) if started.elapsed() >= deadline => {
                    Err((TransferState::Pending, ItemError::DeadlineExceeded))
                }
                _ => self.transfer(activity).await,
            };

            match outcome {
                Ok(state) => {
                    metrics::increment_activities_synced();
                    info!("Synced {} ({}): {}", activity.name, activity.id, state);
                    result.record_success();
                }
                Err((failed_at, error)) => {
                    metrics::increment_activities_failed(error.kind());
                    error!(
                        "Failed to sync {} ({}) after {}: {}",
                        activity.name, activity.id, failed_at, error
                    );
                    result.record_failure(ActivityFailure {
                        activity_id: activity.id.clone(),
                        activity_name: activity.name.clone(),
                        failed_at,
                        error,
                    });
                }
            }
        }

        info!("{}", result);
        Ok(result)
    }

    /// One activity, start to finish. On error, returns the last state reached.
    async fn transfer(&self, activity: &Activity) -> Result<TransferState, (TransferState, ItemError)> {
        let archive = self
            .source
            .download_activity(&activity.id)
            .await
            .map_err(|e| (TransferState::Pending, ItemError::from(e)))?;
        reached(activity, TransferState::Downloaded);

        let payload = extract_payload(&archive, FIT_EXTENSION)
            .map_err(|e| (TransferState::Downloaded, ItemError::from(e)))?;
        reached(activity, TransferState::Extracted);

        if let Some(artifacts) = self.artifacts {
            if let Err(e) = artifacts.save(activity, &archive, &payload.bytes).await {
                warn!("Could not save artifacts for {}: {}", activity.id, e);
            }
        }

        let sport_type = self.map_sport_type(activity);
        reached(activity, TransferState::Mapped);

        let upload = ActivityUpload {
            payload: &payload.bytes,
            name: &activity.name,
            sport_type,
            date: activity.start_date(),
        };
        self.destination
            .upload_activity(&upload)
            .await
            .map_err(|e| (TransferState::Mapped, e))?;
        Ok(TransferState::Uploaded)
    }

    fn map_sport_type(&self, activity: &Activity) -> SportType {
        match SportType::lookup(&activity.activity_type) {
            Some(sport_type) => sport_type,
            None => {
                metrics::increment_activities_unmapped_type();
                warn!(
                    "Unmapped activity type {:?} for {}, uploading as {}",
                    activity.activity_type, activity.id, DEFAULT_SPORT_TYPE
                );
                DEFAULT_SPORT_TYPE
            }
        }
    }
}

fn reached(activity: &Activity, state: TransferState) {
    debug!("{} {}", activity.id, state);
}
