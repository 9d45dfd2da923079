use anyhow::{Result, anyhow};
use async_trait::async_trait;
use thirtyfour::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A cookie as harvested from the browser's cookie jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl SessionCookie {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
        }
    }

    /// Whether the browser would send this cookie to `host`. Covers the exact host,
    /// dotted parent domains (`.idosport.app`), and bare parent domains.
    pub fn applies_to(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        !domain.is_empty()
            && (host.eq_ignore_ascii_case(domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", domain.to_ascii_lowercase())))
    }
}

/// `Cookie` header value for the cookies that apply to `host`.
pub fn cookie_header(cookies: &[SessionCookie], host: &str) -> String {
    cookies
        .iter()
        .filter(|cookie| cookie.applies_to(host))
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct FormField<'a> {
    pub selector: &'a str,
    pub value: &'a str,
}

/// The opaque, browser-held session the destination login runs in. Upload code only
/// ever reads cookies back out of it.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;

    /// Type each value into its field, then submit the page's form.
    async fn submit_form(&self, fields: &[FormField<'_>]) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn cookies(&self) -> Result<Vec<SessionCookie>>;

    /// Shut the browser down. Safe to call more than once.
    async fn quit(&self) -> Result<()>;
}

/// Headless Chrome driven through a WebDriver server such as chromedriver.
/// The browser is started lazily on first use.
pub struct WebDriverSession {
    server_url: String,
    driver: Mutex<Option<WebDriver>>,
}

impl WebDriverSession {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            driver: Mutex::new(None),
        }
    }

    async fn driver(&self) -> Result<WebDriver> {
        let mut slot = self.driver.lock().await;
        if let Some(driver) = slot.as_ref() {
            return Ok(driver.clone());
        }

        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--headless")?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--window-size=1920,1080")?;

        let driver = WebDriver::new(self.server_url.as_str(), caps)
            .await
            .map_err(|e| anyhow!("WebDriver connection to {} failed: {e}", self.server_url))?;
        info!("Started browser session via {}", self.server_url);

        *slot = Some(driver.clone());
        Ok(driver)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn open(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.driver().await?.goto(url).await?;
        Ok(())
    }

    async fn submit_form(&self, fields: &[FormField<'_>]) -> Result<()> {
        let driver = self.driver().await?;
        for field in fields {
            let element = driver
                .query(By::Css(field.selector.to_string()))
                .and_displayed()
                .first()
                .await?;
            element.send_keys(field.value).await?;
        }
        // Submitting the form itself keeps any hidden CSRF input in the POST.
        driver
            .execute("document.querySelector('form').submit()", Vec::new())
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.driver().await?.current_url().await?.to_string())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self.driver().await?.get_all_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|cookie| SessionCookie {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain.unwrap_or_default(),
            })
            .collect())
    }

    async fn quit(&self) -> Result<()> {
        let driver = self.driver.lock().await.take();
        if let Some(driver) = driver {
            driver.quit().await?;
            info!("Browser session closed");
        }
        Ok(())
    }
}
