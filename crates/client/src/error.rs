//! Client error taxonomy.

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use fusionbrain_core::{JobId, PipelineId, PipelineStatus, ValidationError};

use crate::endpoint::EndpointError;

/// Boxed cause carried by generic failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ClientResult<T> = Result<T, ClientError>;

/// Every failure the client surfaces.
///
/// Kinds are distinct so callers can branch on them; none is ever swallowed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local constraint violations; the request never left the process.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server accepted the call but the pipeline is switched off.
    #[error("pipeline {pipeline_id} is currently disabled ({status:?}) and cannot process requests")]
    PipelineDisabled {
        pipeline_id: PipelineId,
        status: PipelineStatus,
    },

    /// The server answered with a failure status.
    #[error("failed request to FusionBrain API (status: {status}, operation: {operation})")]
    Server { status: u16, operation: String },

    /// Poll budget exhausted while the job was still running.
    #[error("timeout waiting for job {job_id} completion after {attempts} attempts")]
    Timeout { job_id: JobId, attempts: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Anything else, with the original cause kept for diagnostics.
    #[error("{message}")]
    Failure {
        message: String,
        #[source]
        source: BoxError,
    },

    /// A blocking wait was cancelled before the poller produced an outcome.
    #[error("synchronous wait aborted")]
    WaitAborted {
        #[source]
        source: RecvError,
    },
}

impl ClientError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn failure(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failure {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Classify an endpoint failure: server errors keep their identity, anything
    /// else is wrapped under `message`.
    pub fn from_endpoint(message: &str, err: EndpointError) -> Self {
        match err {
            EndpointError::Server { status, operation } => Self::Server { status, operation },
            EndpointError::Transport(source) => Self::Failure {
                message: message.to_string(),
                source,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn server_errors_pass_through_unchanged() {
        let err = ClientError::from_endpoint(
            "failed to run pipeline",
            EndpointError::server(503, "run_pipeline"),
        );

        match err {
            ClientError::Server { status, operation } => {
                assert_eq!(status, 503);
                assert_eq!(operation, "run_pipeline");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn transport_errors_are_wrapped_with_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = ClientError::from_endpoint("failed to get job status", EndpointError::transport(io));

        assert_eq!(err.to_string(), "failed to get job status");
        assert_eq!(err.source().unwrap().to_string(), "reset by peer");
    }

    #[test]
    fn timeout_message_names_job_and_attempts() {
        let job_id = JobId::random();
        let err = ClientError::Timeout { job_id, attempts: 5 };

        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            format!("timeout waiting for job {job_id} completion after 5 attempts")
        );
    }
}
