use super::{ActivityUpload, IdoClient, SessionCookie, cookie_header};
use crate::common::{http, metrics};
use crate::errors::{AuthError, ItemError, UploadError, UploadStage};
use function_timer::time;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::multipart::Form;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const SESSION_COOKIE: &str = "PHPSESSID";

/// A pre-signed, single-use write target. Consumed by the transfer so it cannot be
/// replayed.
#[derive(Debug, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub key: String,
}

impl UploadTarget {
    /// Validity window advertised by the signed URL, if any.
    pub fn expires_in(&self) -> Option<Duration> {
        let url = reqwest::Url::parse(&self.url).ok()?;
        url.query_pairs()
            .find(|(name, _)| name == "X-Amz-Expires")
            .and_then(|(_, value)| value.parse().ok())
            .map(Duration::from_secs)
    }
}

impl IdoClient {
    #[time("ido_upload_duration")]
    pub(super) async fn upload(&self, upload: &ActivityUpload<'_>) -> Result<(), ItemError> {
        let headers = self.session_headers().await?;

        let target = self.request_upload_target(&headers).await?;
        if let Some(expires_in) = target.expires_in() {
            debug!("Upload target valid for {}s", expires_in.as_secs());
        }

        let key = self.transfer(target, upload.payload).await?;
        self.register_activity(&headers, upload, &key).await?;

        metrics::increment_ido_api_success();
        info!("Uploaded {} to iDO as {}", upload.name, key);
        Ok(())
    }

    /// The browser's cookies, provided one of them is the session cookie for our host.
    pub(super) async fn session_cookies(&self) -> Result<Vec<SessionCookie>, AuthError> {
        let host = self.endpoints.host();
        let cookies = self
            .browser
            .cookies()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        if !cookies
            .iter()
            .any(|cookie| cookie.name == SESSION_COOKIE && cookie.applies_to(&host))
        {
            return Err(AuthError::MissingSessionCookie {
                cookie: SESSION_COOKIE.to_string(),
                domain: host,
            });
        }
        Ok(cookies)
    }

    /// Headers for the session-authenticated steps, built from the browser's cookies.
    async fn session_headers(&self) -> Result<HeaderMap, AuthError> {
        let host = self.endpoints.host();
        let cookies = self.session_cookies().await?;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, header_value(&cookie_header(&cookies, &host))?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ORIGIN, header_value(&self.endpoints.base_url)?);
        headers.insert(REFERER, header_value(&self.endpoints.athlete_url())?);
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(USER_AGENT, HeaderValue::from_static(http::BROWSER_USER_AGENT));
        Ok(headers)
    }

    async fn request_upload_target(&self, headers: &HeaderMap) -> Result<UploadTarget, UploadError> {
        let stage = UploadStage::TargetIssuance;
        let response = self
            .client
            .get(self.endpoints.upload_target_url())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        let body = check_status(stage, response).await?;
        serde_json::from_str(&body).map_err(|e| {
            metrics::increment_ido_api_failure(stage_label(stage));
            UploadError::Transport {
                stage,
                detail: format!("unexpected response {body:?}: {e}"),
            }
        })
    }

    /// PUT the bytes straight to the signed URL. The URL carries its own authorization.
    async fn transfer(&self, target: UploadTarget, payload: &[u8]) -> Result<String, UploadError> {
        let stage = UploadStage::BlobTransfer;
        let response = self
            .client
            .put(&target.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        check_status(stage, response).await?;
        debug!("Transferred {} bytes for {}", payload.len(), target.key);
        Ok(target.key)
    }

    async fn register_activity(
        &self,
        headers: &HeaderMap,
        upload: &ActivityUpload<'_>,
        key: &str,
    ) -> Result<(), UploadError> {
        let stage = UploadStage::MetadataRegistration;
        let form = Form::new()
            .text("actName", upload.name.to_string())
            .text("dateString", upload.date.format("%Y-%m-%d").to_string())
            .text("creationType", "fit")
            .text("sportType", upload.sport_type.as_str())
            .text("keyFile", key.to_string());

        let response = self
            .client
            .post(self.endpoints.add_activity_url())
            .headers(headers.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        check_status(stage, response).await?;
        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|e| AuthError::Browser(format!("unusable header value: {e}")))
}

fn stage_label(stage: UploadStage) -> &'static str {
    match stage {
        UploadStage::TargetIssuance => "target_issuance",
        UploadStage::BlobTransfer => "blob_transfer",
        UploadStage::MetadataRegistration => "metadata_registration",
    }
}

fn transport(stage: UploadStage, e: reqwest::Error) -> UploadError {
    metrics::increment_ido_api_failure(stage_label(stage));
    UploadError::Transport {
        stage,
        detail: e.to_string(),
    }
}

/// Anything but 200 fails the stage. Returns the body on success.
async fn check_status(stage: UploadStage, response: reqwest::Response) -> Result<String, UploadError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status != StatusCode::OK {
        metrics::increment_ido_api_failure(stage_label(stage));
        return Err(UploadError::Rejected {
            stage,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
