use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration as SignedDuration;
use serde::Serialize;
use tracing::info;

use fusionbrain_client::{ClientConfig, FusionBrainClient};
use fusionbrain_core::{JobId, PipelineId, PipelineParams, PipelineType, TextToImageParams};

/// Build an HTTP client from `FUSIONBRAIN_*` variables.
pub fn connect(base_url: Option<String>) -> Result<FusionBrainClient> {
    let mut config = ClientConfig::from_env().context("failed to load client configuration")?;
    if let Some(url) = base_url {
        config = config.with_base_url(url);
    }
    info!(base_url = %config.base_url, "using FusionBrain API");

    FusionBrainClient::from_config(&config).context("failed to build client")
}

pub async fn pipelines(client: &FusionBrainClient, pipeline_type: Option<PipelineType>) -> Result<()> {
    let pipelines = client.pipelines(pipeline_type).await?;

    if pipelines.is_empty() {
        println!("No pipelines found.");
        return Ok(());
    }

    for p in &pipelines {
        println!("  {}  {} v{}  [{}] {:?}", p.id, p.name, p.version, p.pipeline_type, p.status);
        if let Some(description) = p.description_en.as_ref().or(p.description.as_ref()) {
            println!("    {description}");
        }
    }
    Ok(())
}

pub async fn availability(client: &FusionBrainClient, pipeline: PipelineId) -> Result<()> {
    let availability = client.availability(pipeline).await?;
    print_json(&availability)
}

/// Arguments of the `generate` command.
pub struct GenerateRequest {
    pub pipeline: PipelineId,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub style: Option<String>,
    pub negative_prompt: Option<String>,
    pub files: Vec<PathBuf>,
    pub wait: bool,
}

impl GenerateRequest {
    fn params(&self) -> PipelineParams {
        let mut params = TextToImageParams::new(self.prompt.clone()).with_size(self.width, self.height);
        if let Some(style) = &self.style {
            params = params.with_style(style.clone());
        }
        if let Some(negative) = &self.negative_prompt {
            params = params.with_negative_prompt(negative.clone());
        }
        params.into()
    }
}

pub async fn generate(client: &FusionBrainClient, request: GenerateRequest) -> Result<()> {
    let params = request.params();

    let mut attachments = Vec::with_capacity(request.files.len());
    for path in &request.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        attachments.push(bytes);
    }
    let attachments = (!attachments.is_empty()).then_some(attachments);

    if !request.wait {
        let submitted = client
            .run_pipeline(request.pipeline, Some(&params), attachments.as_deref())
            .await?;
        return print_json(&submitted);
    }

    let done = client
        .run_and_wait(request.pipeline, Some(&params), attachments.as_deref())
        .await?;
    print_json(&done)
}

pub async fn status(client: &FusionBrainClient, job: JobId) -> Result<()> {
    let status = client.status(job).await?;
    print_json(&status)
}

pub async fn wait(client: &FusionBrainClient, job: JobId, initial_delay_secs: u64) -> Result<()> {
    let initial_delay = i64::try_from(initial_delay_secs)
        .ok()
        .and_then(SignedDuration::try_seconds)
        .context("initial delay is too large")?;

    let done = client.wait(job, initial_delay).await?;
    print_json(&done)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            pipeline: PipelineId::random(),
            prompt: "a lighthouse".to_string(),
            width: 640,
            height: 480,
            style: Some("UHD".to_string()),
            negative_prompt: None,
            files: Vec::new(),
            wait: true,
        }
    }

    #[test]
    fn generate_request_builds_valid_params() {
        let params = request().params();

        assert!(params.validate().is_ok());
        let PipelineParams::TextToImage(p) = params;
        assert_eq!((p.width, p.height), (640, 480));
        assert_eq!(p.style.as_deref(), Some("UHD"));
        assert_eq!(p.negative_prompt_decoder, None);
    }

    #[test]
    fn generate_request_keeps_invalid_sizes_for_the_validator() {
        let mut req = request();
        req.width = 64;

        let err = req.params().validate().unwrap_err();
        assert!(err.has_field("width"));
    }
}
