#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use garmin_ido_sync::errors::{AuthError, DownloadError, FetchError, ItemError, UploadError, UploadStage};
use garmin_ido_sync::garmin::{Activity, ActivityId, ActivitySource, parse_local_time};
use garmin_ido_sync::ido::{
    ActivityDestination, ActivityUpload, BrowserSession, FormField, IdoClient, IdoEndpoints, SessionCookie,
};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const SESSION_ID: &str = "sess-1";

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn activity(id: u64, name: &str, activity_type: &str, start: &str) -> Activity {
    Activity {
        id: ActivityId::from(id),
        name: name.to_string(),
        activity_type: activity_type.to_string(),
        start_time: parse_local_time(start).unwrap(),
        distance: 25_000.0,
        duration: 3_600.0,
        average_speed: 6.9,
        calories: 700.0,
    }
}

/// Original-format export: one `.fit` entry next to a readme.
pub fn fit_zip(payload: &[u8]) -> Vec<u8> {
    zip_with(&[("readme.txt", b"export"), ("ride_ACTIVITY.fit", payload)])
}

pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[derive(Default)]
pub struct SourceState {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub downloads: Mutex<Vec<String>>,
}

/// In-memory source. Dates in `failing_dates` fail to list; ids without an archive
/// fail to download with a 404.
#[derive(Default)]
pub struct FakeSource {
    pub listings: HashMap<NaiveDate, Vec<Activity>>,
    pub archives: HashMap<String, Vec<u8>>,
    pub failing_dates: HashSet<NaiveDate>,
    pub reject_login: bool,
    pub state: Arc<SourceState>,
}

impl FakeSource {
    pub fn with_activity(mut self, activity: Activity, archive: Vec<u8>) -> Self {
        self.archives.insert(activity.id.to_string(), archive);
        self.listings
            .entry(activity.start_date())
            .or_default()
            .push(activity);
        self
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn login(&self) -> Result<(), AuthError> {
        self.state.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(AuthError::Rejected {
                platform: "Garmin Connect",
                status: 401,
                body: "bad credentials".to_string(),
            });
        }
        Ok(())
    }

    async fn list_activities(&self, date: NaiveDate) -> Result<Vec<Activity>, FetchError> {
        if self.failing_dates.contains(&date) {
            return Err(FetchError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(self.listings.get(&date).cloned().unwrap_or_default())
    }

    async fn download_activity(&self, id: &ActivityId) -> Result<Vec<u8>, DownloadError> {
        self.state.downloads.lock().unwrap().push(id.to_string());
        self.archives
            .get(id.as_str())
            .cloned()
            .ok_or(DownloadError::Status(404))
    }

    async fn logout(&self) -> Result<()> {
        self.state.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct BrowserState {
    pub opened: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<(String, String)>>,
    pub current: Mutex<String>,
    pub quits: AtomicUsize,
}

/// Scripted browser: `submit_form` lands on `landing_url`, `cookies` returns `cookies`.
#[derive(Clone)]
pub struct FakeBrowser {
    pub landing_url: String,
    pub cookies: Vec<SessionCookie>,
    pub state: Arc<BrowserState>,
}

impl FakeBrowser {
    pub fn new(landing_url: &str, cookies: Vec<SessionCookie>) -> Self {
        Self {
            landing_url: landing_url.to_string(),
            cookies,
            state: Arc::default(),
        }
    }

    /// Logged in, holding a session cookie for the mock server's host.
    pub fn logged_in(base_url: &str) -> Self {
        let host = IdoEndpoints::new(base_url).host();
        Self::new(
            &format!("{base_url}/athlete/"),
            vec![
                SessionCookie::new("PHPSESSID", SESSION_ID, &host),
                SessionCookie::new("_ga", "GA1.1", ".google.com"),
            ],
        )
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn open(&self, url: &str) -> Result<()> {
        self.state.opened.lock().unwrap().push(url.to_string());
        *self.state.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn submit_form(&self, fields: &[FormField<'_>]) -> Result<()> {
        let mut submitted = self.state.submitted.lock().unwrap();
        for field in fields {
            submitted.push((field.selector.to_string(), field.value.to_string()));
        }
        *self.state.current.lock().unwrap() = self.landing_url.clone();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.current.lock().unwrap().clone())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        Ok(self.cookies.clone())
    }

    async fn quit(&self) -> Result<()> {
        self.state.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn ido_client(base_url: &str, browser: FakeBrowser) -> IdoClient {
    IdoClient::with_endpoints(
        Box::new(browser),
        "rider@example.com",
        "hunter2",
        Duration::from_secs(5),
        IdoEndpoints::new(base_url),
    )
    .unwrap()
    .with_settle_delay(Duration::ZERO)
}

#[derive(Default)]
pub struct DestinationState {
    pub logins: AtomicUsize,
    pub closes: AtomicUsize,
    pub uploads: Mutex<Vec<String>>,
}

/// Records uploads by activity name. Names in `failing_names` fail at blob transfer.
#[derive(Default)]
pub struct FakeDestination {
    pub reject_login: bool,
    pub failing_names: HashSet<String>,
    pub state: Arc<DestinationState>,
}

#[async_trait]
impl ActivityDestination for FakeDestination {
    async fn login(&self) -> Result<(), AuthError> {
        self.state.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(AuthError::StillOnLoginPage {
                url: "https://www.idosport.app/login".to_string(),
            });
        }
        Ok(())
    }

    async fn upload_activity(&self, upload: &ActivityUpload<'_>) -> Result<(), ItemError> {
        if self.failing_names.contains(upload.name) {
            return Err(UploadError::Rejected {
                stage: UploadStage::BlobTransfer,
                status: 500,
                body: "expired".to_string(),
            }
            .into());
        }
        self.state.uploads.lock().unwrap().push(upload.name.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
