//! HTTP transport for the FusionBrain key API.

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{error, trace};

use fusionbrain_core::{
    Availability, JobId, PipelineDescriptor, PipelineId, PipelineParams, PipelineType,
    StatusResult, SubmissionResult,
};

use super::{EndpointError, RemoteEndpoint};
use crate::config::ClientConfig;

const API_PATH: &str = "/key/api/v1";
const KEY_HEADER: &str = "X-Key";
const SECRET_HEADER: &str = "X-Secret";

/// `reqwest`-backed endpoint.
///
/// Every request carries the `X-Key`/`X-Secret` credential headers. Any non-2xx
/// answer becomes [`EndpointError::Server`] tagged with the operation name.
#[derive(Clone)]
pub struct HttpEndpoint {
    http: reqwest::Client,
    api_root: String,
    key_header: String,
    secret_header: String,
}

impl core::fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpEndpoint")
            .field("api_root", &self.api_root)
            .finish_non_exhaustive()
    }
}

impl HttpEndpoint {
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(EndpointError::transport)?;

        Ok(Self::with_client(http, base_url, api_key, api_secret))
    }

    /// Use a preconfigured `reqwest::Client` (custom TLS roots, proxies, ...).
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Self {
        Self {
            http,
            api_root: format!("{}{}", base_url.trim_end_matches('/'), API_PATH),
            key_header: format!("Key {api_key}"),
            secret_header: format!("Secret {api_secret}"),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, EndpointError> {
        Self::new(&config.base_url, &config.api_key, &config.api_secret)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_root, path))
            .header(KEY_HEADER, &self.key_header)
            .header(SECRET_HEADER, &self.secret_header)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, EndpointError> {
        let response = request.send().await.map_err(EndpointError::transport)?;
        let status = response.status();

        if !status.is_success() {
            error!(
                status = status.as_u16(),
                operation, "failed request to FusionBrain API"
            );
            return Err(EndpointError::server(status.as_u16(), operation));
        }

        let body = response.json::<T>().await.map_err(EndpointError::transport)?;
        trace!(operation, "decoded response body");
        Ok(body)
    }
}

#[async_trait::async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn list_pipelines(
        &self,
        pipeline_type: Option<PipelineType>,
    ) -> Result<Vec<PipelineDescriptor>, EndpointError> {
        let mut request = self.request(Method::GET, "/pipelines");
        if let Some(t) = pipeline_type {
            request = request.query(&[("type", t.as_str())]);
        }
        self.send(request, "get_pipelines").await
    }

    async fn availability(&self, pipeline_id: PipelineId) -> Result<Availability, EndpointError> {
        let request = self.request(
            Method::GET,
            &format!("/pipeline/{pipeline_id}/availability"),
        );
        self.send(request, "get_pipeline_availability").await
    }

    async fn submit_run(
        &self,
        pipeline_id: PipelineId,
        params: Option<&PipelineParams>,
        attachments: &[Vec<u8>],
    ) -> Result<SubmissionResult, EndpointError> {
        let mut form = Form::new().text("pipeline_id", pipeline_id.to_string());

        if let Some(params) = params {
            let json = serde_json::to_string(params).map_err(EndpointError::transport)?;
            let part = Part::text(json)
                .mime_str("application/json")
                .map_err(EndpointError::transport)?;
            form = form.part("params", part);
        }

        for (i, blob) in attachments.iter().enumerate() {
            let part = Part::bytes(blob.clone()).file_name(format!("file{i}"));
            form = form.part("file", part);
        }

        let request = self.request(Method::POST, "/pipeline/run").multipart(form);
        self.send(request, "run_pipeline").await
    }

    async fn status(&self, job_id: JobId) -> Result<StatusResult, EndpointError> {
        let request = self.request(Method::GET, &format!("/pipeline/status/{job_id}"));
        self.send(request, "get_status").await
    }
}
