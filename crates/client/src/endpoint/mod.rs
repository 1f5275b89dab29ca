//! Remote endpoint boundary.
//!
//! The orchestration core only talks to the server through [`RemoteEndpoint`].
//! [`HttpEndpoint`] is the production transport; [`InMemoryEndpoint`] serves tests
//! and local development.

use std::sync::Arc;

use thiserror::Error;

use fusionbrain_core::{
    Availability, JobId, PipelineDescriptor, PipelineId, PipelineParams, PipelineType,
    StatusResult, SubmissionResult,
};

use crate::error::BoxError;

pub mod http;
pub mod in_memory;

pub use http::HttpEndpoint;
pub use in_memory::{InMemoryEndpoint, ScriptedFailure, StatusStep};

/// Failure reported by an endpoint call.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The server answered with a non-success status.
    #[error("failed request to FusionBrain API (status: {status}, operation: {operation})")]
    Server { status: u16, operation: String },

    /// Network, encoding or any other non-server failure.
    #[error(transparent)]
    Transport(BoxError),
}

impl EndpointError {
    pub fn server(status: u16, operation: impl Into<String>) -> Self {
        Self::Server {
            status,
            operation: operation.into(),
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// The four operations exposed by the generation API.
#[async_trait::async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// List pipelines, optionally restricted to one type.
    async fn list_pipelines(
        &self,
        pipeline_type: Option<PipelineType>,
    ) -> Result<Vec<PipelineDescriptor>, EndpointError>;

    async fn availability(&self, pipeline_id: PipelineId) -> Result<Availability, EndpointError>;

    /// Submit a run. `attachments` may be empty.
    async fn submit_run(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: &[Vec<u8>],
    ) -> Result<SubmissionResult, EndpointError>;

    async fn status(&self, job_id: JobId) -> Result<StatusResult, EndpointError>;
}

#[async_trait::async_trait]
impl<T: RemoteEndpoint + ?Sized> RemoteEndpoint for Arc<T> {
    async fn list_pipelines(
        &self,
        pipeline_type: Option<PipelineType>,
    ) -> Result<Vec<PipelineDescriptor>, EndpointError> {
        (**self).list_pipelines(pipeline_type).await
    }

    async fn availability(&self, pipeline_id: PipelineId) -> Result<Availability, EndpointError> {
        (**self).availability(pipeline_id).await
    }

    async fn submit_run(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: &[Vec<u8>],
    ) -> Result<SubmissionResult, EndpointError> {
        (**self).submit_run(pipeline_id, params, attachments).await
    }

    async fn status(&self, job_id: JobId) -> Result<StatusResult, EndpointError> {
        (**self).status(job_id).await
    }
}
