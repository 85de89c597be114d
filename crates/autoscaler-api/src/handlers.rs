//! REST API handlers.
//!
//! Scaling calls go through `Core`; every response uses the same
//! `{success, data, error}` envelope.

use autoscaler_core::{CoreError, ResourceTree, ScaleRequest};
use autoscaler_types::RequestType;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::warn;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Unacceptable { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Scaling ────────────────────────────────────────────────────

async fn scale(state: ApiState, request_type: RequestType, req: ScaleRequest) -> axum::response::Response {
    let result = match request_type {
        RequestType::Up => state.core.up(req).await,
        RequestType::Down => state.core.down(req).await,
        RequestType::Keep => state.core.keep(req).await,
    };
    match result {
        Ok(response) => ApiResponse::ok(response).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                warn!(%request_type, error = %e, "scaling request failed");
            }
            error_response(&e.to_string(), status).into_response()
        }
    }
}

/// POST /api/v1/up
pub async fn scale_up(State(state): State<ApiState>, Json(req): Json<ScaleRequest>) -> impl IntoResponse {
    scale(state, RequestType::Up, req).await
}

/// POST /api/v1/down
pub async fn scale_down(State(state): State<ApiState>, Json(req): Json<ScaleRequest>) -> impl IntoResponse {
    scale(state, RequestType::Down, req).await
}

/// POST /api/v1/keep
pub async fn scale_keep(State(state): State<ApiState>, Json(req): Json<ScaleRequest>) -> impl IntoResponse {
    scale(state, RequestType::Keep, req).await
}

// ── Jobs ───────────────────────────────────────────────────────

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.core.jobs())
}

/// GET /api/v1/jobs/{name}
pub async fn get_job(State(state): State<ApiState>, Path(name): Path<String>) -> impl IntoResponse {
    match state.core.job(&name) {
        Some(job) => ApiResponse::ok(job).into_response(),
        None => error_response("job not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Inspection ─────────────────────────────────────────────────

#[derive(Serialize)]
struct TreeResponse {
    tree: ResourceTree,
    rendered: String,
}

/// GET /api/v1/resources
pub async fn resource_tree(State(state): State<ApiState>) -> impl IntoResponse {
    let tree = state.core.resource_tree().await;
    let rendered = tree.render();
    ApiResponse::ok(TreeResponse { tree, rendered })
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = autoscaler_core::render_prometheus(&state.core.metrics());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
