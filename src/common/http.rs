use anyhow::Result;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

/// Client with its own cookie store and transient-failure retries, for the source platform.
pub fn session_client(timeout: Duration) -> Result<ClientWithMiddleware> {
    let inner = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Client without retries. Upload targets are single-use, so nothing here may be replayed.
pub fn single_shot_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
