use super::{Activity, ActivityId, ActivitySource};
use crate::common::metrics;
use crate::errors::{AuthError, DownloadError, FetchError};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info};

const DEFAULT_INTERPRETER: &str = "python3";

/// Garmin access delegated to a helper script (by default `scripts/garmin_client.py`,
/// built on the `garminconnect` Python library). The script authenticates on every
/// invocation, so `login` only checks that it can be run.
///
/// Credentials reach the script through `GARMIN_USERNAME`/`GARMIN_PASSWORD` in its
/// environment rather than argv, keeping them out of process listings.
pub struct ScriptClient {
    username: String,
    password: String,
    script_path: PathBuf,
    interpreter: String,
}

impl ScriptClient {
    pub fn new(username: &str, password: &str, script_path: &Path) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            script_path: script_path.to_path_buf(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.interpreter = interpreter.to_string();
        self
    }

    async fn run_script(&self, args: &[&str]) -> Result<Vec<u8>> {
        let script = std::path::absolute(&self.script_path)?;
        debug!("Running {} {} {:?}", self.interpreter, script.display(), args);

        let output = Command::new(&self.interpreter)
            .arg(&script)
            .args(args)
            .env("GARMIN_USERNAME", &self.username)
            .env("GARMIN_PASSWORD", &self.password)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("failed to run {}: {e}", self.interpreter))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Garmin script exited with {}: {}", output.status, stderr.trim());
            return Err(anyhow!("{}", stderr.trim()));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ActivitySource for ScriptClient {
    async fn login(&self) -> Result<(), AuthError> {
        if !tokio::fs::try_exists(&self.script_path).await.unwrap_or(false) {
            return Err(AuthError::Unavailable(format!(
                "script not found at {}",
                self.script_path.display()
            )));
        }

        let version = Command::new(&self.interpreter)
            .arg("--version")
            .output()
            .await;
        match version {
            Ok(output) if output.status.success() => {}
            _ => {
                return Err(AuthError::Unavailable(format!(
                    "{} not found in PATH",
                    self.interpreter
                )));
            }
        }

        info!(
            "Garmin script backend ready: {} {}",
            self.interpreter,
            self.script_path.display()
        );
        Ok(())
    }

    /// Unlike the trait contract, this is already limited to cycling: the script drops
    /// every other activity type before printing.
    async fn list_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError> {
        let date_arg = date.format("%Y-%m-%d").to_string();
        let stdout = self
            .run_script(&["--command", "get-activities", "--date", &date_arg])
            .await
            .map_err(|e| {
                metrics::increment_garmin_api_failure();
                FetchError::Script(format!("{e:#}"))
            })?;

        let activities: Vec<Activity> = serde_json::from_slice(&stdout).map_err(|e| {
            metrics::increment_garmin_api_failure();
            FetchError::Decode(e.to_string())
        })?;
        metrics::increment_garmin_api_success();

        Ok(activities
            .into_iter()
            .filter(|activity| activity.start_date() == date)
            .collect())
    }

    async fn list_bike_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError> {
        // The script already keeps cycling activities only.
        self.list_activities(date).await
    }

    async fn download_activity(&self, id: &ActivityId) -> Result<Vec<u8>, DownloadError> {
        let bytes = self
            .run_script(&[
                "--command",
                "download-activity",
                "--activity-id",
                id.as_str(),
                "--format",
                "FIT",
            ])
            .await
            .map_err(|e| {
                metrics::increment_garmin_api_failure();
                DownloadError::Script(format!("{e:#}"))
            })?;

        metrics::increment_garmin_api_success();
        Ok(bytes)
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}
