//! HTTP routes.

use crate::error::ApiError;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use comfy_relay_client::{BackendTransport, QueueInfo, ResultDocument};
use comfy_relay_core::JobId;
use comfy_relay_gateway::{Gateway, GenerateRequest, GenerateResult, HealthReport};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the API router over a shared gateway.
pub fn router<T: BackendTransport + 'static>(gateway: Arc<Gateway<T>>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<T>))
        .route("/generate", post(generate::<T>))
        .route("/queue", get(queue::<T>))
        .route("/history/{job_id}", get(history::<T>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn root() -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "service": "ComfyUI API Gateway",
    }))
}

async fn health<T: BackendTransport>(State(gateway): State<Arc<Gateway<T>>>) -> Json<HealthReport> {
    Json(gateway.health().await)
}

async fn generate<T: BackendTransport>(
    State(gateway): State<Arc<Gateway<T>>>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResult>, ApiError> {
    let Json(request) = body?;
    tracing::info!(
        width = request.width,
        height = request.height,
        steps = request.steps,
        "generation requested"
    );

    gateway
        .generate(&request)
        .await
        .map(Json)
        .map_err(|report| ApiError::generation(report.current_context()))
}

async fn queue<T: BackendTransport>(
    State(gateway): State<Arc<Gateway<T>>>,
) -> Result<Json<QueueInfo>, ApiError> {
    gateway
        .queue_status()
        .await
        .map(Json)
        .map_err(|report| ApiError::queue(report.current_context()))
}

async fn history<T: BackendTransport>(
    State(gateway): State<Arc<Gateway<T>>>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultDocument>, ApiError> {
    let job_id: JobId = job_id.parse().map_err(|_| {
        ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            format!("Job {job_id} not found"),
        )
    })?;

    gateway
        .job_history(&job_id)
        .await
        .map(Json)
        .map_err(|report| ApiError::history(report.current_context()))
}
