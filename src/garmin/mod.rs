//! Garmin Connect as the activity source.
//!
//! [`ActivitySource`] is the capability set the sync pipeline depends on. Two backends
//! satisfy it: [`GarminConnectClient`] talks to Garmin directly over HTTP, and
//! [`ScriptClient`] delegates to an external helper process. Which one runs is a
//! configuration choice; callers only ever see the trait.

use crate::common::config::{Config, GarminBackend};
use crate::errors::{AuthError, DownloadError, FetchError};
use async_trait::async_trait;
use chrono::NaiveDate;

mod activity;
mod connect_client;
mod script_client;

pub use activity::{Activity, ActivityId, parse_local_time};
pub use connect_client::{GarminConnectClient, GarminEndpoints};
pub use script_client::ScriptClient;

/// Substrings that mark an activity type as cycling. Matched case-insensitively, so
/// anything containing them (e.g. "unicycling") is included too.
pub const BIKE_KEYWORDS: [&str; 3] = ["cycling", "bike", "biking"];

pub fn is_bike_activity(activity_type: &str) -> bool {
    let activity_type = activity_type.to_lowercase();
    BIKE_KEYWORDS
        .iter()
        .any(|keyword| activity_type.contains(keyword))
}

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Establish the authenticated session used by every later call.
    async fn login(&self) -> Result<(), AuthError>;

    /// Activities that started on `date` in the account's local time, in source order.
    async fn list_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError>;

    async fn list_bike_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError> {
        Ok(self
            .list_activities(date)
            .await?
            .into_iter()
            .filter(|activity| is_bike_activity(&activity.activity_type))
            .collect())
    }

    /// Raw bytes of the original export, a zip wrapping the FIT file.
    async fn download_activity(&self, id: &ActivityId) -> Result<Vec<u8>, DownloadError>;

    /// Release the session. Idempotent and best-effort.
    async fn logout(&self) -> anyhow::Result<()>;
}

/// Build the backend selected by `config`. Nothing touches the network until `login`.
pub fn source_from_config(config: &Config) -> anyhow::Result<Box<dyn ActivitySource>> {
    let source: Box<dyn ActivitySource> = match config.garmin_backend {
        GarminBackend::Http => Box::new(GarminConnectClient::new(
            &config.garmin_username,
            &config.garmin_password,
            config.http_timeout,
        )?),
        GarminBackend::Script => Box::new(ScriptClient::new(
            &config.garmin_username,
            &config.garmin_password,
            &config.garmin_script_path,
        )),
    };
    Ok(source)
}
