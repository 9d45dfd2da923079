use std::fmt;

/// Login failures. Fatal to the whole run when raised by either platform's login.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{platform} rejected the login (HTTP {status}): {body}")]
    Rejected {
        platform: &'static str,
        status: u16,
        body: String,
    },
    #[error("{platform} unreachable: {detail}")]
    Unreachable {
        platform: &'static str,
        detail: String,
    },
    #[error("login failed - still on login page ({url})")]
    StillOnLoginPage { url: String },
    #[error("no {cookie} session cookie found for {domain} - login may have failed")]
    MissingSessionCookie { cookie: String, domain: String },
    #[error("browser session error: {0}")]
    Browser(String),
    #[error("source backend unavailable: {0}")]
    Unavailable(String),
}

/// Listing failures. Fatal to one date only.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode activity list: {0}")]
    Decode(String),
    #[error("activity script failed: {0}")]
    Script(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("activity script failed: {0}")]
    Script(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("not a readable archive: {0}")]
    InvalidArchive(String),
    #[error("no payload found")]
    NoPayload,
    #[error("payload entry {entry} is empty")]
    EmptyPayload { entry: String },
    #[error("failed to read entry {entry}: {detail}")]
    Read { entry: String, detail: String },
}

/// The three sub-steps of a destination upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    TargetIssuance,
    BlobTransfer,
    MetadataRegistration,
}

impl UploadStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadStage::TargetIssuance => "target issuance failed",
            UploadStage::BlobTransfer => "blob transfer failed",
            UploadStage::MetadataRegistration => "metadata registration failed",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{stage}: HTTP {status}: {body}")]
    Rejected {
        stage: UploadStage,
        status: u16,
        body: String,
    },
    #[error("{stage}: {detail}")]
    Transport { stage: UploadStage, detail: String },
}

impl UploadError {
    pub fn stage(&self) -> UploadStage {
        match self {
            UploadError::Rejected { stage, .. } | UploadError::Transport { stage, .. } => *stage,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Rejected { status, .. } => Some(*status),
            UploadError::Transport { .. } => None,
        }
    }
}

/// Anything that ends a single activity's transfer. Recorded, never propagated past the batch.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("session lost: {0}")]
    Session(#[from] AuthError),
    #[error("batch deadline passed before the transfer started")]
    DeadlineExceeded,
}

impl ItemError {
    /// Short classification used in reports and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Download(_) => "download",
            ItemError::Extraction(_) => "extraction",
            ItemError::Upload(_) => "upload",
            ItemError::Session(_) => "auth",
            ItemError::DeadlineExceeded => "deadline",
        }
    }
}

/// Failures that stop the run before any date is processed.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to login to Garmin: {0}")]
    SourceLogin(#[source] AuthError),
    #[error("failed to login to iDO: {0}")]
    DestinationLogin(#[source] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_carries_stage_and_status() {
        let err = UploadError::Rejected {
            stage: UploadStage::BlobTransfer,
            status: 403,
            body: "expired".to_string(),
        };

        assert_eq!(err.stage(), UploadStage::BlobTransfer);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "blob transfer failed: HTTP 403: expired");
    }

    #[test]
    fn item_error_kinds() {
        assert_eq!(ItemError::from(ExtractionError::NoPayload).kind(), "extraction");
        assert_eq!(ItemError::from(DownloadError::Status(500)).kind(), "download");
        assert_eq!(ItemError::DeadlineExceeded.kind(), "deadline");
        assert_eq!(
            ItemError::from(ExtractionError::NoPayload).to_string(),
            "extraction failed: no payload found"
        );
    }
}
