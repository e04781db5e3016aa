mod classifier;
mod config;
mod engine;
mod error;
mod labels;
mod pipeline;
mod preprocess;
mod registry;
mod types;
mod validate;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use metrics::counter;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use config::{ClassifierConfig, Config};
use error::PredictError;
use pipeline::{PredictionPipeline, RawUpload};
use registry::ModelRegistry;
use types::{ErrorBody, HealthResponse, PredictResponse};

/// Upload size cap. Oversized multipart bodies are rejected before decoding.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taxon=debug".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!("Starting classification server with config: {:?}", config);

    let registry = Arc::new(ModelRegistry::new(ClassifierConfig::from(&config)));

    // Eager load; the registry getter stays the idempotent guard.
    tracing::info!("Loading classifier model...");
    registry.get_or_load().await?;
    tracing::info!("Model loaded successfully");

    let pipeline = Arc::new(PredictionPipeline::new(registry));

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let index_page = ServeFile::new(config.static_dir.join("index.html"));
    let app = Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .route_service("/", index_page)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(pipeline, model_name(&config)));

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;
    Ok(())
}

/// What the health endpoint reports as the loaded model.
fn model_name(config: &Config) -> String {
    match &config.model_path {
        Some(path) => path.display().to_string(),
        None => config.model_id.clone(),
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<PredictionPipeline>,
    model_id: String,
}

impl AppState {
    fn new(pipeline: Arc<PredictionPipeline>, model_id: String) -> Self {
        Self { pipeline, model_id }
    }
}

#[tracing::instrument(skip(state, multipart))]
async fn predict_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    counter!("prediction_requests_total").increment(1);

    let upload = read_upload(multipart).await?;
    tracing::info!(
        filename = %upload.filename,
        size = upload.bytes.len(),
        "Processing image"
    );

    let response = state.pipeline.handle(upload).await?;

    tracing::info!(filename = %response.filename, "Classification complete");
    Ok(Json(response))
}

/// Pull the `file` field out of the multipart form.
async fn read_upload(mut multipart: Multipart) -> Result<RawUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart form: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
            return Ok(RawUpload { filename, bytes });
        }
    }

    Err(ApiError::bad_request(
        "missing \"file\" field in multipart form".to_string(),
    ))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.model_id,
    })
}

/// Transport-facing error: a status code plus a human-readable detail body.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail,
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        counter!("prediction_failures_total").increment(1);
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %err, "Classification failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}
