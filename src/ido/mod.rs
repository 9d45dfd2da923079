//! iDO Sport as the activity destination.
//!
//! iDO has no token API. Login happens in a real browser, and the session cookies it
//! leaves behind authorize the three-step upload (target issuance, blob transfer,
//! metadata registration) that runs over plain HTTP.

use crate::common::config::Config;
use crate::common::{http, metrics};
use crate::errors::{AuthError, ItemError};
use crate::sport_type::SportType;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

mod browser;
mod upload;

pub use browser::{BrowserSession, FormField, SessionCookie, WebDriverSession, cookie_header};
pub use upload::{SESSION_COOKIE, UploadTarget};

const BASE_URL: &str = "https://www.idosport.app";
const LOGIN_SETTLE_DELAY: Duration = Duration::from_secs(6);

#[derive(Debug, Clone)]
pub struct IdoEndpoints {
    pub base_url: String,
}

impl Default for IdoEndpoints {
    fn default() -> Self {
        Self::new(BASE_URL)
    }
}

impl IdoEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    pub fn athlete_url(&self) -> String {
        format!("{}/athlete/", self.base_url)
    }

    pub fn upload_target_url(&self) -> String {
        format!("{}/v-get-s3-s-upurl", self.base_url)
    }

    pub fn add_activity_url(&self) -> String {
        format!("{}/v-add-activity-v2", self.base_url)
    }

    /// Host the session cookies must be scoped to.
    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn is_login_page(&self, url: &str) -> bool {
        same_path(url, "/login")
    }

    pub fn is_athlete_page(&self, url: &str) -> bool {
        same_path(url, "/athlete/")
    }
}

fn same_path(url: &str, expected: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(url) => url.path().trim_end_matches('/') == expected.trim_end_matches('/'),
        Err(_) => false,
    }
}

/// Everything the destination needs to register one activity.
#[derive(Debug, Clone, Copy)]
pub struct ActivityUpload<'a> {
    pub payload: &'a [u8],
    pub name: &'a str,
    pub sport_type: SportType,
    pub date: NaiveDate,
}

#[async_trait]
pub trait ActivityDestination: Send + Sync {
    async fn login(&self) -> Result<(), AuthError>;

    /// Push one payload through all three upload steps. Nothing is retried.
    async fn upload_activity(&self, upload: &ActivityUpload<'_>) -> Result<(), ItemError>;

    /// Release the session. Idempotent.
    async fn close(&self) -> Result<()>;
}

pub struct IdoClient {
    browser: Box<dyn BrowserSession>,
    client: reqwest::Client,
    endpoints: IdoEndpoints,
    username: String,
    password: String,
    settle_delay: Duration,
    closed: AtomicBool,
}

impl IdoClient {
    pub fn new(
        browser: Box<dyn BrowserSession>,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_endpoints(browser, username, password, timeout, IdoEndpoints::default())
    }

    pub fn with_endpoints(
        browser: Box<dyn BrowserSession>,
        username: &str,
        password: &str,
        timeout: Duration,
        endpoints: IdoEndpoints,
    ) -> Result<Self> {
        Ok(Self {
            browser,
            client: http::single_shot_client(timeout)?,
            endpoints,
            username: username.to_string(),
            password: password.to_string(),
            settle_delay: LOGIN_SETTLE_DELAY,
            closed: AtomicBool::new(false),
        })
    }

    /// How long to wait after submitting the login form before checking where we landed.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn endpoints(&self) -> &IdoEndpoints {
        &self.endpoints
    }

    async fn browser_login(&self) -> Result<()> {
        self.browser.open(&self.endpoints.login_url()).await?;
        self.browser
            .submit_form(&[
                FormField {
                    selector: r#"input[name="email"]"#,
                    value: &self.username,
                },
                FormField {
                    selector: r#"input[name="password"]"#,
                    value: &self.password,
                },
            ])
            .await?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl ActivityDestination for IdoClient {
    async fn login(&self) -> Result<(), AuthError> {
        info!("Logging in to iDO as {}", self.username);
        self.browser_login().await.map_err(|e| {
            metrics::increment_ido_api_failure("login");
            AuthError::Browser(e.to_string())
        })?;

        let current_url = self
            .browser
            .current_url()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;
        debug!("iDO landed on {}", current_url);

        if self.endpoints.is_login_page(&current_url) {
            metrics::increment_ido_api_failure("login");
            return Err(AuthError::StillOnLoginPage { url: current_url });
        }

        // The upload endpoints expect the athlete page to have been visited in this session.
        if !self.endpoints.is_athlete_page(&current_url) {
            self.browser
                .open(&self.endpoints.athlete_url())
                .await
                .map_err(|e| AuthError::Browser(e.to_string()))?;
        }

        // A login that left /login without setting the session cookie never took.
        if let Err(e) = self.session_cookies().await {
            metrics::increment_ido_api_failure("login");
            return Err(e);
        }

        metrics::increment_ido_api_success();
        info!("Logged in to iDO");
        Ok(())
    }

    async fn upload_activity(&self, upload: &ActivityUpload<'_>) -> Result<(), ItemError> {
        self.upload(upload).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("iDO session already closed");
            return Ok(());
        }
        self.browser.quit().await
    }
}

/// WebDriver-backed iDO client built from `config`. The browser starts on `login`.
pub fn destination_from_config(config: &Config) -> Result<Box<dyn ActivityDestination>> {
    let browser = WebDriverSession::new(&config.webdriver_url);
    let client = IdoClient::new(
        Box::new(browser),
        &config.ido_username,
        &config.ido_password,
        config.http_timeout,
    )?;
    Ok(Box::new(client))
}
