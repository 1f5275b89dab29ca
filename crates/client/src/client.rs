//! High-level client: catalogue queries, submission and completion waits behind
//! one handle.

use std::sync::Arc;

use chrono::Duration as SignedDuration;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

use fusionbrain_core::{
    Availability, JobId, PipelineDescriptor, PipelineId, PipelineParams, PipelineType,
    StatusResult, SubmissionResult,
};

use crate::config::ClientConfig;
use crate::dispatcher::{Dispatcher, WaitHandle};
use crate::endpoint::{HttpEndpoint, RemoteEndpoint};
use crate::error::{ClientError, ClientResult};
use crate::poller::CompletionPoller;
use crate::submit::JobSubmitter;

/// FusionBrain API client.
///
/// Cheap to clone; clones share the endpoint and the wait pool.
#[derive(Debug)]
pub struct FusionBrainClient<E = HttpEndpoint> {
    endpoint: Arc<E>,
    submitter: JobSubmitter<Arc<E>>,
    dispatcher: Dispatcher<Arc<E>>,
}

impl<E> Clone for FusionBrainClient<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            submitter: self.submitter.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl FusionBrainClient<HttpEndpoint> {
    /// Validate `config` and build an HTTP-backed client on the current runtime.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|e| ClientError::failure("invalid client configuration", e))?;
        let endpoint = HttpEndpoint::from_config(config)
            .map_err(|e| ClientError::from_endpoint("failed to build HTTP endpoint", e))?;
        Self::with_endpoint(endpoint, config)
    }
}

impl<E: RemoteEndpoint + 'static> FusionBrainClient<E> {
    /// Build a client around any endpoint, on the current tokio runtime.
    pub fn with_endpoint(endpoint: E, config: &ClientConfig) -> ClientResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ClientError::failure("no tokio runtime available for client", e))?;
        Ok(Self::with_runtime(endpoint, config, runtime))
    }

    /// Build a client whose waits run on `runtime`.
    pub fn with_runtime(endpoint: E, config: &ClientConfig, runtime: Handle) -> Self {
        let endpoint = Arc::new(endpoint);
        let poller = CompletionPoller::new(endpoint.clone(), config.poll_policy());

        Self {
            submitter: JobSubmitter::new(endpoint.clone()),
            dispatcher: Dispatcher::new(poller, config.async_pool_size, runtime),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// List pipelines, optionally filtered by type.
    pub async fn pipelines(
        &self,
        pipeline_type: Option<PipelineType>,
    ) -> ClientResult<Vec<PipelineDescriptor>> {
        debug!(?pipeline_type, "fetching pipelines");
        let pipelines = self
            .endpoint
            .list_pipelines(pipeline_type)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to get pipelines");
                ClientError::from_endpoint("failed to get pipelines", e)
            })?;
        debug!(count = pipelines.len(), "fetched pipelines");
        trace!(?pipelines, "pipeline details");
        Ok(pipelines)
    }

    pub async fn availability(&self, pipeline_id: PipelineId) -> ClientResult<Availability> {
        debug!(pipeline_id = %pipeline_id, "checking pipeline availability");
        let availability = self.endpoint.availability(pipeline_id).await.map_err(|e| {
            error!(pipeline_id = %pipeline_id, error = %e, "failed to get pipeline availability");
            ClientError::from_endpoint("failed to get pipeline availability", e)
        })?;
        debug!(pipeline_id = %pipeline_id, status = ?availability.status, "pipeline availability");
        Ok(availability)
    }

    /// Validate and submit a run. See [`JobSubmitter::submit`].
    pub async fn run_pipeline(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: Option<&[Vec<u8>]>,
    ) -> ClientResult<SubmissionResult> {
        self.submitter.submit(pipeline_id, params, attachments).await
    }

    /// Single status query, no polling.
    pub async fn status(&self, job_id: JobId) -> ClientResult<StatusResult> {
        debug!(job_id = %job_id, "fetching job status");
        let status = self.endpoint.status(job_id).await.map_err(|e| {
            error!(job_id = %job_id, error = %e, "failed to get job status");
            ClientError::from_endpoint("failed to get job status", e)
        })?;
        debug!(job_id = %job_id, status = ?status.status, "job status");
        Ok(status)
    }

    pub fn begin_wait(&self, job_id: JobId, initial_delay: SignedDuration) -> WaitHandle {
        self.dispatcher.begin_wait(job_id, initial_delay)
    }

    pub async fn wait(
        &self,
        job_id: JobId,
        initial_delay: SignedDuration,
    ) -> ClientResult<StatusResult> {
        self.dispatcher.wait(job_id, initial_delay).await
    }

    /// Blocks the calling thread; must not be called from async code.
    pub fn wait_blocking(
        &self,
        job_id: JobId,
        initial_delay: SignedDuration,
    ) -> ClientResult<StatusResult> {
        self.dispatcher.wait_blocking(job_id, initial_delay)
    }

    /// Submit a run and wait for it, starting after the server-suggested delay.
    ///
    /// A negative suggestion from the server is treated as "poll now".
    pub async fn run_and_wait(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: Option<&[Vec<u8>]>,
    ) -> ClientResult<StatusResult> {
        let submitted = self.run_pipeline(pipeline_id, params, attachments).await?;
        let delay = submitted.suggested_delay().max(SignedDuration::zero());
        self.wait(submitted.job_id, delay).await
    }
}
