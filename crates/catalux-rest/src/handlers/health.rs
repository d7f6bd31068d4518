//! Health check endpoints for liveness and readiness probes.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness probe (is the process serving HTTP?)
//! - `GET /ready` - Readiness probe (has the first snapshot been published?)
//! - `GET /metrics` - Prometheus text exposition

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::state::AppState;

/// Liveness probe. Always 200 while the process runs, including while the
/// first rebuild is still in progress.
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "message": "Service is alive"
        })),
    )
}

/// Readiness probe.
///
/// Returns 503 until a snapshot has been published. Later failed rebuilds
/// do not make the service unready since the previous snapshot keeps serving.
pub async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.service;
    if service.is_ready() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "generation": service.generation(),
                "rebuilding": service.is_rebuilding()
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "message": "No index snapshot has been built yet",
                "rebuilding": service.is_rebuilding()
            })),
        )
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match catalux_core::metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}
