//! Server-tracked asynchronous job status.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle status of an async job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states stop polling
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Body of `GET /api/jobs/{id}/status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusReport {
    pub status: JobStatus,
    /// Percentage as sent by the server; may be fractional or out of range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job as tracked by the poller
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncJob {
    pub job_id: String,
    pub status: JobStatus,
    /// 0..=100; absent progress reads as 0
    pub progress: u8,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl AsyncJob {
    pub fn from_report(job_id: impl Into<String>, report: JobStatusReport) -> Self {
        Self {
            job_id: job_id.into(),
            status: report.status,
            progress: report.progress.map_or(0, clamp_progress),
            result: report.result,
            error: report.error,
        }
    }
}

/// Round to a whole percent within `0..=100`; NaN reads as 0.
fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}
