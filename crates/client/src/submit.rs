//! Job submission: validate, submit, classify.

use tracing::{debug, error, trace};

use fusionbrain_core::{
    validate_attachments, validate_params, PipelineId, PipelineParams, SubmissionResult,
};

use crate::endpoint::RemoteEndpoint;
use crate::error::{ClientError, ClientResult};

/// Turns validated parameters into a submission and classifies the answer.
///
/// Submissions are never retried here: from the client's point of view a run is
/// not idempotent, so any failure goes straight back to the caller.
#[derive(Debug, Clone)]
pub struct JobSubmitter<E> {
    endpoint: E,
}

impl<E: RemoteEndpoint> JobSubmitter<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub async fn submit(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: Option<&[Vec<u8>]>,
    ) -> ClientResult<SubmissionResult> {
        debug!(pipeline_id = %pipeline_id, "submitting pipeline run");
        trace!(?params, files = attachments.map_or(0, <[Vec<u8>]>::len), "run arguments");

        if let Err(e) = validate_params(params) {
            error!(pipeline_id = %pipeline_id, error = %e, "parameter validation failed");
            return Err(e.into());
        }
        if let Err(e) = validate_attachments(attachments) {
            error!(pipeline_id = %pipeline_id, error = %e, "attachment validation failed");
            return Err(e.into());
        }

        let response = self
            .endpoint
            .submit_run(pipeline_id, params, attachments.unwrap_or_default())
            .await
            .map_err(|e| {
                error!(pipeline_id = %pipeline_id, error = %e, "failed to run pipeline");
                ClientError::from_endpoint("failed to run pipeline", e)
            })?;

        classify(pipeline_id, response)
    }
}

/// The server reports a disabled pipeline inside a successful response; surface
/// that as its own error kind.
fn classify(pipeline_id: PipelineId, response: SubmissionResult) -> ClientResult<SubmissionResult> {
    match response.pipeline_status {
        Some(status) if status.is_disabled() => {
            debug!(pipeline_id = %pipeline_id, ?status, "pipeline is disabled");
            Err(ClientError::PipelineDisabled {
                pipeline_id,
                status,
            })
        }
        _ => {
            debug!(
                pipeline_id = %pipeline_id,
                job_id = %response.job_id,
                status = ?response.status,
                "pipeline run accepted"
            );
            Ok(response)
        }
    }
}
