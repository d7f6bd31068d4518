pub mod admin;
pub mod catalog;
pub mod health; // Liveness, readiness and Prometheus scrape

pub use admin::{cancel_rebuild, trigger_rebuild};
pub use catalog::{count, facets, get_product, search, statistics, taxonomy_tree};
pub use health::{health_handler, metrics_handler, ready_handler};

use axum::http::StatusCode;
use catalux_core::CoreError;

/// Maps a service error to the response status and message.
pub(crate) fn error_response(err: CoreError) -> (StatusCode, String) {
    let status = match &err {
        CoreError::IndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::RebuildInProgress => StatusCode::CONFLICT,
        CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}
