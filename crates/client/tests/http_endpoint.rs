use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use fusionbrain_client::{ClientConfig, ClientError, FusionBrainClient};
use fusionbrain_core::{
    Availability, JobId, JobStatus, PipelineDescriptor, PipelineId, PipelineParams, PipelineStatus,
    PipelineType, StatusResult, SubmissionResult, TextToImageParams,
};

const KEY: &str = "test-key";
const SECRET: &str = "test-secret";

/// What the fake server saw on `POST /pipeline/run`.
#[derive(Debug, Default, Clone)]
struct RecordedRun {
    content_type: String,
    pipeline_id: Option<String>,
    params: Option<serde_json::Value>,
    params_content_type: Option<String>,
    file_sizes: Vec<usize>,
}

struct Fake {
    pipeline: PipelineDescriptor,
    job: JobId,
    disabled: bool,
    type_filters: Mutex<Vec<Option<String>>>,
    runs: Mutex<Vec<RecordedRun>>,
    status_calls: AtomicU32,
}

type Shared = Arc<Fake>;

fn authorized(headers: &HeaderMap) -> Result<(), StatusCode> {
    let key = headers.get("X-Key").and_then(|v| v.to_str().ok());
    let secret = headers.get("X-Secret").and_then(|v| v.to_str().ok());
    let expected_key = format!("Key {KEY}");
    let expected_secret = format!("Secret {SECRET}");

    if key == Some(expected_key.as_str()) && secret == Some(expected_secret.as_str()) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn pipelines(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<PipelineDescriptor>>, StatusCode> {
    authorized(&headers)?;
    let filter = query.get("type").cloned();
    fake.type_filters.lock().unwrap().push(filter.clone());

    match filter.as_deref() {
        None | Some("TEXT2IMAGE") => Ok(Json(vec![fake.pipeline.clone()])),
        Some(_) => Ok(Json(Vec::new())),
    }
}

async fn availability(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Availability>, StatusCode> {
    authorized(&headers)?;
    if id == fake.pipeline.id.to_string() {
        Ok(Json(Availability {
            status: fake.pipeline.status,
        }))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn run(
    State(fake): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SubmissionResult>, StatusCode> {
    authorized(&headers)?;

    let mut recorded = RecordedRun {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        ..RecordedRun::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pipeline_id" => {
                recorded.pipeline_id = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            "params" => {
                recorded.params_content_type = field.content_type().map(str::to_string);
                let raw = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                recorded.params =
                    Some(serde_json::from_str(&raw).map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            "file" => {
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                recorded.file_sizes.push(bytes.len());
            }
            _ => return Err(StatusCode::BAD_REQUEST),
        }
    }

    fake.runs.lock().unwrap().push(recorded);

    let mut response = SubmissionResult::accepted(fake.job);
    if fake.disabled {
        response = response.with_pipeline_status(PipelineStatus::DisabledByQueue);
    }
    Ok(Json(response))
}

async fn status(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StatusResult>, StatusCode> {
    authorized(&headers)?;
    if id != fake.job.to_string() {
        return Err(StatusCode::NOT_FOUND);
    }

    let call = fake.status_calls.fetch_add(1, Ordering::SeqCst);
    let snapshot = if call == 0 {
        StatusResult::new(fake.job, JobStatus::Processing)
    } else {
        StatusResult::new(fake.job, JobStatus::Done)
            .with_result(json!({ "files": ["aGVsbG8="], "censored": false }))
            .with_generation_time(7)
    };
    Ok(Json(snapshot))
}

struct TestServer {
    base_url: String,
    fake: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(disabled: bool) -> Self {
        let fake = Arc::new(Fake {
            pipeline: PipelineDescriptor::new(PipelineId::random(), "Kandinsky", PipelineType::Text2Image),
            job: JobId::random(),
            disabled,
            type_filters: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/key/api/v1/pipelines", get(pipelines))
            .route("/key/api/v1/pipeline/:id/availability", get(availability))
            .route("/key/api/v1/pipeline/run", post(run))
            .route("/key/api/v1/pipeline/status/:id", get(status))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            fake,
            handle,
        }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::new(KEY, SECRET)
            .with_base_url(self.base_url.clone())
            .with_max_retries(5)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn client(&self) -> FusionBrainClient {
        FusionBrainClient::from_config(&self.config()).expect("client should build")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn lists_pipelines_with_credentials_and_type_filter() {
    let server = TestServer::spawn(false).await;
    let client = server.client();

    let all = client.pipelines(None).await.unwrap();
    let filtered = client.pipelines(Some(PipelineType::Text2Image)).await.unwrap();

    assert_eq!(all, vec![server.fake.pipeline.clone()]);
    assert_eq!(filtered, all);
    assert_eq!(
        *server.fake.type_filters.lock().unwrap(),
        vec![None, Some("TEXT2IMAGE".to_string())]
    );
}

#[tokio::test]
async fn wrong_credentials_surface_as_server_error() {
    let server = TestServer::spawn(false).await;
    let config = ClientConfig::new("other-key", SECRET).with_base_url(server.base_url.clone());
    let client = FusionBrainClient::from_config(&config).unwrap();

    let err = client.pipelines(None).await.unwrap_err();

    match err {
        ClientError::Server { status, operation } => {
            assert_eq!(status, 401);
            assert_eq!(operation, "get_pipelines");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn availability_for_known_and_unknown_pipelines() {
    let server = TestServer::spawn(false).await;
    let client = server.client();

    let known = client.availability(server.fake.pipeline.id).await.unwrap();
    assert_eq!(known.status, PipelineStatus::Active);

    let err = client.availability(PipelineId::random()).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Server { status: 404, ref operation } if operation == "get_pipeline_availability")
    );
}

#[tokio::test]
async fn run_pipeline_posts_a_multipart_form() {
    let server = TestServer::spawn(false).await;
    let client = server.client();
    let params: PipelineParams = TextToImageParams::new("a red fox in snow")
        .with_size(512, 768)
        .with_style("ANIME")
        .into();
    let files = vec![vec![7u8; 16], vec![9u8; 4]];

    let submitted = client
        .run_pipeline(server.fake.pipeline.id, Some(&params), Some(files.as_slice()))
        .await
        .unwrap();

    assert_eq!(submitted.job_id, server.fake.job);
    assert_eq!(submitted.status, JobStatus::Initial);

    let runs = server.fake.runs.lock().unwrap().clone();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert!(run.content_type.starts_with("multipart/form-data"));
    assert_eq!(run.pipeline_id.as_deref(), Some(server.fake.pipeline.id.to_string().as_str()));
    assert_eq!(run.params_content_type.as_deref(), Some("application/json"));
    assert_eq!(
        run.params,
        Some(json!({
            "type": "GENERATE",
            "width": 512,
            "height": 768,
            "numImages": 1,
            "generateParams": { "query": "a red fox in snow" },
            "style": "ANIME",
        }))
    );
    assert_eq!(run.file_sizes, vec![16, 4]);
}

#[tokio::test]
async fn invalid_params_are_rejected_before_the_request() {
    let server = TestServer::spawn(false).await;
    let client = server.client();
    let params: PipelineParams = TextToImageParams::new("   ").with_size(4096, 1024).into();

    let err = client
        .run_pipeline(server.fake.pipeline.id, Some(&params), None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(server.fake.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn disabled_pipeline_in_run_response_is_rejected() {
    let server = TestServer::spawn(true).await;
    let client = server.client();

    let err = client
        .run_pipeline(server.fake.pipeline.id, None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::PipelineDisabled {
            status: PipelineStatus::DisabledByQueue,
            ..
        }
    ));
}

#[tokio::test]
async fn run_and_wait_polls_until_done() {
    let server = TestServer::spawn(false).await;
    let client = server.client();
    let params: PipelineParams = TextToImageParams::new("harbour at night").into();

    let done = client
        .run_and_wait(server.fake.pipeline.id, Some(&params), None)
        .await
        .unwrap();

    assert_eq!(done.job_id, server.fake.job);
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.generation_time, Some(7));
    assert_eq!(done.result.unwrap()["censored"], json!(false));
    assert_eq!(server.fake.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn status_of_unknown_job_is_a_server_error() {
    let server = TestServer::spawn(false).await;
    let client = server.client();

    let err = client.status(JobId::random()).await.unwrap_err();

    assert!(matches!(err, ClientError::Server { status: 404, ref operation } if operation == "get_status"));
}

#[tokio::test]
async fn unreachable_server_is_a_wrapped_failure() {
    let config = ClientConfig::new(KEY, SECRET).with_base_url("http://127.0.0.1:1");
    let client = FusionBrainClient::from_config(&config).unwrap();

    let err = client.pipelines(None).await.unwrap_err();

    match err {
        ClientError::Failure { message, .. } => assert_eq!(message, "failed to get pipelines"),
        other => panic!("expected wrapped failure, got {other:?}"),
    }
}
