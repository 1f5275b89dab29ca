//! Scripted in-memory endpoint for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::json;

use fusionbrain_core::{
    Availability, JobId, JobStatus, PipelineDescriptor, PipelineId, PipelineParams, PipelineStatus,
    PipelineType, StatusResult, SubmissionResult,
};

use super::{EndpointError, RemoteEndpoint};

/// A failure the in-memory endpoint should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Server answered with this HTTP status.
    Server(u16),
    /// Transport-level failure with this message.
    Transport(String),
}

impl ScriptedFailure {
    fn to_error(&self, operation: &str) -> EndpointError {
        match self {
            ScriptedFailure::Server(status) => EndpointError::server(*status, operation),
            ScriptedFailure::Transport(msg) => EndpointError::transport(std::io::Error::new(
                std::io::ErrorKind::Other,
                msg.clone(),
            )),
        }
    }
}

/// One scripted answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusStep {
    Status(JobStatus),
    Fail(ScriptedFailure),
}

/// A submission as the endpoint received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSubmission {
    pub pipeline_id: PipelineId,
    pub params: Option<PipelineParams>,
    pub attachment_sizes: Vec<usize>,
}

#[derive(Debug, Default)]
struct State {
    pipelines: Vec<PipelineDescriptor>,
    availability: HashMap<PipelineId, PipelineStatus>,
    next_submission: Option<SubmissionResult>,
    submit_failure: Option<ScriptedFailure>,
    submissions: Vec<RecordedSubmission>,
    /// Remaining steps per job; the last step repeats forever.
    scripts: HashMap<JobId, VecDeque<StatusStep>>,
    status_calls: HashMap<JobId, u32>,
}

/// In-memory endpoint driven by scripted answers.
///
/// Status queries for a job walk through its script one step per call and keep
/// returning the last step once the script is exhausted. Unknown jobs answer 404.
#[derive(Debug, Default)]
pub struct InMemoryEndpoint {
    state: Mutex<State>,
}

impl InMemoryEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_pipeline(self, pipeline: PipelineDescriptor) -> Self {
        {
            let mut s = self.state();
            s.availability.insert(pipeline.id, pipeline.status);
            s.pipelines.push(pipeline);
        }
        self
    }

    pub fn set_availability(&self, pipeline_id: PipelineId, status: PipelineStatus) {
        self.state().availability.insert(pipeline_id, status);
    }

    /// Answer the next submission with `result` instead of a fresh accepted job.
    pub fn set_next_submission(&self, result: SubmissionResult) {
        self.state().next_submission = Some(result);
    }

    /// Make every submission fail until cleared with `None`.
    pub fn set_submit_failure(&self, failure: Option<ScriptedFailure>) {
        self.state().submit_failure = failure;
    }

    pub fn script(&self, job_id: JobId, steps: impl IntoIterator<Item = StatusStep>) {
        self.state()
            .scripts
            .insert(job_id, steps.into_iter().collect());
    }

    pub fn script_statuses(&self, job_id: JobId, statuses: &[JobStatus]) {
        self.script(job_id, statuses.iter().copied().map(StatusStep::Status));
    }

    /// Number of status queries received for `job_id`.
    pub fn status_calls(&self, job_id: JobId) -> u32 {
        self.state().status_calls.get(&job_id).copied().unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state().submissions.clone()
    }
}

#[async_trait::async_trait]
impl RemoteEndpoint for InMemoryEndpoint {
    async fn list_pipelines(
        &self,
        pipeline_type: Option<PipelineType>,
    ) -> Result<Vec<PipelineDescriptor>, EndpointError> {
        let s = self.state();
        Ok(s.pipelines
            .iter()
            .filter(|p| pipeline_type.map_or(true, |t| p.pipeline_type == t))
            .cloned()
            .collect())
    }

    async fn availability(&self, pipeline_id: PipelineId) -> Result<Availability, EndpointError> {
        let s = self.state();
        match s.availability.get(&pipeline_id) {
            Some(status) => Ok(Availability { status: *status }),
            None => Err(EndpointError::server(404, "get_pipeline_availability")),
        }
    }

    async fn submit_run(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: &[Vec<u8>],
    ) -> Result<SubmissionResult, EndpointError> {
        let mut s = self.state();
        s.submissions.push(RecordedSubmission {
            pipeline_id,
            params: params.cloned(),
            attachment_sizes: attachments.iter().map(Vec::len).collect(),
        });

        if let Some(failure) = &s.submit_failure {
            return Err(failure.to_error("run_pipeline"));
        }

        Ok(s
            .next_submission
            .take()
            .unwrap_or_else(|| SubmissionResult::accepted(JobId::random())))
    }

    async fn status(&self, job_id: JobId) -> Result<StatusResult, EndpointError> {
        let mut s = self.state();
        *s.status_calls.entry(job_id).or_insert(0) += 1;

        let Some(script) = s.scripts.get_mut(&job_id) else {
            return Err(EndpointError::server(404, "get_status"));
        };

        let step = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        match step {
            Some(StatusStep::Status(status)) => {
                let mut result = StatusResult::new(job_id, status);
                if status == JobStatus::Done {
                    result = result
                        .with_result(json!({ "files": [], "censored": false }))
                        .with_generation_time(1);
                }
                Ok(result)
            }
            Some(StatusStep::Fail(failure)) => Err(failure.to_error("get_status")),
            None => Err(EndpointError::server(404, "get_status")),
        }
    }
}
