//! Operational endpoints for the index rebuild.
//!
//! - `POST /admin/rebuild` - rebuild from the current sources and publish
//! - `POST /admin/rebuild/cancel` - stop the running rebuild

use axum::{extract::State, http::StatusCode, Json};
use catalux_core::CoreError;
use catalux_index::RebuildReport;
use serde::Serialize;

use super::error_response;
use crate::state::AppState;

/// Runs a rebuild and returns its report once the new snapshot is live.
///
/// Returns 409 when a rebuild is already running and 500 when the sources
/// cannot be read or the configuration is invalid. A failed rebuild leaves
/// the serving snapshot in place.
#[tracing::instrument(skip(state))]
pub async fn trigger_rebuild(
    State(state): State<AppState>,
) -> Result<Json<RebuildReport>, (StatusCode, String)> {
    tracing::info!("rebuild requested");
    state
        .service
        .rebuild()
        .await
        .map(Json)
        .map_err(rebuild_error_response)
}

/// Rebuilds take no request input, so an invalid configuration is a server
/// fault here rather than a bad request.
fn rebuild_error_response(err: CoreError) -> (StatusCode, String) {
    match err {
        CoreError::ValidationError(_) => {
            tracing::error!(error = %err, "rebuild rejected the configuration");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        other => error_response(other),
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub async fn cancel_rebuild(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.service.cancel_rebuild(),
    })
}
