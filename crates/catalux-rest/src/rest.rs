use axum::{
    extract::Request,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    classify::ServerErrorsFailureClass,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info_span, Span};

use crate::handlers;
use crate::state::AppState;

/// Builds the router exposing the catalog query API, the rebuild trigger,
/// probes and metrics.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Probes and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // Catalog queries
        .route("/api/v1/search", post(handlers::search))
        .route("/api/v1/count", post(handlers::count))
        .route("/api/v1/facets", post(handlers::facets))
        .route("/api/v1/taxonomy", get(handlers::taxonomy_tree))
        .route("/api/v1/statistics", get(handlers::statistics))
        .route("/api/v1/products/:id", get(handlers::get_product))
        // Operations
        .route("/admin/rebuild", post(handlers::trigger_rebuild))
        .route("/admin/rebuild/cancel", post(handlers::cancel_rebuild))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &Span| {
                    tracing::debug!("started processing request");
                })
                .on_response(|response: &Response, latency: std::time::Duration, _span: &Span| {
                    let status = response.status();
                    let latency_ms = latency.as_millis();

                    if status.is_server_error() {
                        tracing::error!(status = %status, latency_ms = latency_ms, "request failed with server error");
                    } else if status.is_client_error() {
                        tracing::warn!(status = %status, latency_ms = latency_ms, "request failed with client error");
                    } else {
                        tracing::info!(status = %status, latency_ms = latency_ms, "request completed");
                    }
                })
                .on_failure(|failure_class: ServerErrorsFailureClass, latency: std::time::Duration, _span: &Span| {
                    tracing::error!(failure_class = ?failure_class, latency_ms = latency.as_millis(), "request failed");
                }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
