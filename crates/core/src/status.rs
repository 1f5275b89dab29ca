//! Job and pipeline status as reported by the server, plus the snapshots the
//! submit and status calls return.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::JobId;

/// Job execution status.
///
/// Owned by the server: the client never advances it locally, it only reads the
/// latest authoritative answer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted, no processing started yet
    #[serde(rename = "INITIAL")]
    Initial,
    /// Currently being generated
    #[serde(rename = "PROCESSING")]
    Processing,
    /// Finished successfully; the status carries a result payload
    #[serde(rename = "DONE")]
    Done,
    /// Generation failed
    #[serde(rename = "FAIL")]
    Failed,
    /// Cancelled by the user or the system
    #[serde(rename = "CANCEL")]
    Cancelled,
}

impl JobStatus {
    /// No further transition happens from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Administrative/operational state of a pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Active,
    DisabledManually,
    DisabledByQueue,
}

impl PipelineStatus {
    pub fn is_disabled(&self) -> bool {
        matches!(
            self,
            PipelineStatus::DisabledManually | PipelineStatus::DisabledByQueue
        )
    }
}

/// Availability answer for a single pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub status: PipelineStatus,
}

/// Immediate answer to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(rename = "uuid")]
    pub job_id: JobId,
    pub status: JobStatus,
    /// Present only when the pipeline was unavailable at submission time.
    #[serde(rename = "model_status", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_status: Option<PipelineStatus>,
    /// Seconds the server suggests waiting before the first status query.
    #[serde(rename = "status_time", default)]
    pub status_time: i64,
}

impl SubmissionResult {
    pub fn accepted(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Initial,
            pipeline_status: None,
            status_time: 0,
        }
    }

    pub fn with_pipeline_status(mut self, status: PipelineStatus) -> Self {
        self.pipeline_status = Some(status);
        self
    }

    pub fn with_status_time(mut self, seconds: i64) -> Self {
        self.status_time = seconds;
        self
    }

    /// Server-suggested delay before polling, as a signed duration.
    pub fn suggested_delay(&self) -> Duration {
        Duration::seconds(self.status_time)
    }
}

/// A status snapshot for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    #[serde(rename = "uuid")]
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    /// Opaque generation output; only set once the job is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Seconds spent generating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<u64>,
}

impl StatusResult {
    pub fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            status_description: None,
            result: None,
            generation_time: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.status_description = Some(description.into());
        self
    }

    pub fn with_result(mut self, result: JsonValue) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_generation_time(mut self, seconds: u64) -> Self {
        self.generation_time = Some(seconds);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
