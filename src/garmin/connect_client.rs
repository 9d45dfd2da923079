use super::{Activity, ActivityId, ActivitySource};
use crate::common::{http, metrics};
use crate::errors::{AuthError, DownloadError, FetchError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const SSO_ENDPOINT: &str = "https://sso.garmin.com/sso";
const CONNECT_ENDPOINT: &str = "https://connect.garmin.com";
const PLATFORM: &str = "Garmin Connect";
const SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub struct GarminEndpoints {
    pub sso_url: String,
    pub connect_url: String,
}

impl Default for GarminEndpoints {
    fn default() -> Self {
        Self {
            sso_url: SSO_ENDPOINT.to_string(),
            connect_url: CONNECT_ENDPOINT.to_string(),
        }
    }
}

impl GarminEndpoints {
    /// Point both the SSO and the Connect side at one base URL.
    pub fn single_host(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            sso_url: format!("{base_url}/sso"),
            connect_url: base_url.to_string(),
        }
    }

    fn signin_url(&self) -> String {
        format!("{}/signin", self.sso_url)
    }

    fn activity_search_url(&self) -> String {
        format!(
            "{}/modern/proxy/activitylist-service/activities/search/activities",
            self.connect_url
        )
    }

    fn download_url(&self, activity_id: &ActivityId) -> String {
        format!(
            "{}/download-service/files/activity/{activity_id}",
            self.connect_url
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySearchRequest {
    start_date: String,
    end_date: String,
    limit: u32,
}

#[derive(Deserialize)]
struct ActivitySearchResponse {
    #[serde(rename = "activityList", default)]
    activities: Vec<Activity>,
}

/// Direct HTTP client for Garmin Connect. Owns its cookie store, so the SSO session
/// established by `login` stays with this instance.
pub struct GarminConnectClient {
    client: ClientWithMiddleware,
    endpoints: GarminEndpoints,
    username: String,
    password: String,
    logged_in: AtomicBool,
}

impl GarminConnectClient {
    pub fn new(username: &str, password: &str, timeout: Duration) -> Result<Self> {
        Self::with_endpoints(username, password, timeout, GarminEndpoints::default())
    }

    pub fn with_endpoints(
        username: &str,
        password: &str,
        timeout: Duration,
        endpoints: GarminEndpoints,
    ) -> Result<Self> {
        Ok(Self {
            client: http::session_client(timeout)?,
            endpoints,
            username: username.to_string(),
            password: password.to_string(),
            logged_in: AtomicBool::new(false),
        })
    }

    fn unreachable(e: impl std::fmt::Display) -> AuthError {
        metrics::increment_garmin_api_failure();
        AuthError::Unreachable {
            platform: PLATFORM,
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl ActivitySource for GarminConnectClient {
    async fn login(&self) -> Result<(), AuthError> {
        let signin_url = self.endpoints.signin_url();

        // Fetching the form first seeds the CSRF cookies.
        self.client
            .get(&signin_url)
            .send()
            .await
            .map_err(Self::unreachable)?;

        let form = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("embed", "false"),
        ];
        let response = self
            .client
            .post(&signin_url)
            .form(&form)
            .send()
            .await
            .map_err(Self::unreachable)?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::FOUND {
            metrics::increment_garmin_api_failure();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                platform: PLATFORM,
                status: status.as_u16(),
                body,
            });
        }

        // Completes the ticket redirect chain into connect.garmin.com.
        self.client
            .get(&self.endpoints.connect_url)
            .send()
            .await
            .map_err(Self::unreachable)?;

        metrics::increment_garmin_api_success();
        self.logged_in.store(true, Ordering::SeqCst);
        info!("Logged in to Garmin Connect as {}", self.username);
        Ok(())
    }

    async fn list_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError> {
        let end_date = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let request = ActivitySearchRequest {
            start_date: date.format("%Y-%m-%d").to_string(),
            end_date: end_date.format("%Y-%m-%d").to_string(),
            limit: SEARCH_LIMIT,
        };
        let body =
            serde_json::to_vec(&request).map_err(|e| FetchError::Decode(e.to_string()))?;

        let response = self
            .client
            .post(self.endpoints.activity_search_url())
            .header(CONTENT_TYPE, "application/json")
            .header("NK", "NT")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                metrics::increment_garmin_api_failure();
                FetchError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            metrics::increment_garmin_api_failure();
            FetchError::Network(e.to_string())
        })?;

        if !status.is_success() {
            metrics::increment_garmin_api_failure();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ActivitySearchResponse = serde_json::from_str(&text).map_err(|e| {
            metrics::increment_garmin_api_failure();
            debug!("Raw activity list response: {}", text);
            FetchError::Decode(e.to_string())
        })?;
        metrics::increment_garmin_api_success();

        // The remote range is inclusive of end_date, so trim to the requested day.
        let total = parsed.activities.len();
        let activities: Vec<Activity> = parsed
            .activities
            .into_iter()
            .filter(|activity| activity.start_date() == date)
            .collect();
        if activities.len() != total {
            debug!(
                "Dropped {} activities outside {}",
                total - activities.len(),
                date
            );
        }

        Ok(activities)
    }

    async fn download_activity(&self, id: &ActivityId) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(self.endpoints.download_url(id))
            .send()
            .await
            .map_err(|e| {
                metrics::increment_garmin_api_failure();
                DownloadError::Network(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            metrics::increment_garmin_api_failure();
            return Err(DownloadError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            metrics::increment_garmin_api_failure();
            DownloadError::Network(e.to_string())
        })?;

        metrics::increment_garmin_api_success();
        Ok(body.to_vec())
    }

    async fn logout(&self) -> Result<()> {
        // Session cookies die with the client; there is no server-side session to revoke.
        if self.logged_in.swap(false, Ordering::SeqCst) {
            info!("Logged out of Garmin Connect");
        } else {
            debug!("Garmin logout requested without an active session");
        }
        Ok(())
    }
}
