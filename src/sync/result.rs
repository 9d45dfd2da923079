use crate::errors::ItemError;
use crate::garmin::ActivityId;
use chrono::NaiveDate;
use std::fmt;

/// How far an activity got through the pipeline.
///
/// Type mapping cannot fail, so a failure never reports `Extracted`: an extraction
/// error leaves the activity `Downloaded` and an upload error leaves it `Mapped`.
/// `Uploaded` is only ever a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Downloaded,
    Extracted,
    Mapped,
    Uploaded,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferState::Pending => "pending",
            TransferState::Downloaded => "downloaded",
            TransferState::Extracted => "extracted",
            TransferState::Mapped => "mapped",
            TransferState::Uploaded => "uploaded",
        })
    }
}

#[derive(Debug)]
pub struct ActivityFailure {
    pub activity_id: ActivityId,
    pub activity_name: String,
    /// Last state reached before the error. One of `Pending`, `Downloaded` or `Mapped`.
    pub failed_at: TransferState,
    pub error: ItemError,
}

/// Outcome of one date's batch. `succeeded + failed() == found` always holds.
#[derive(Debug)]
pub struct SyncResult {
    pub date: NaiveDate,
    pub found: usize,
    pub succeeded: usize,
    pub failures: Vec<ActivityFailure>,
}

impl SyncResult {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            found: 0,
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found == 0
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: ActivityFailure) {
        self.failures.push(failure);
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} found, {} uploaded, {} failed",
            self.date,
            self.found,
            self.succeeded,
            self.failed()
        )
    }
}
