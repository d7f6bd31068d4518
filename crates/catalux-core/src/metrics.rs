//! Central metrics registry and metric definitions
//!
//! Prometheus metrics for rebuilds and query serving. Metrics are registered
//! lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge,
    IntGaugeVec, TextEncoder,
};

use crate::error::{CoreError, CoreResult};

// ===== Rebuild Metrics =====

/// Total number of rebuild attempts by outcome
pub static REBUILDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "catalux_rebuilds_total",
        "Total number of index rebuild attempts",
        &["status"]
    )
    .expect("Failed to register rebuild counter")
});

/// Rebuild duration histogram
pub static REBUILD_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "catalux_rebuild_duration_seconds",
        "Index rebuild duration in seconds",
        // Buckets: 10ms .. 2min
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("Failed to register rebuild duration histogram")
});

/// Generation number of the snapshot currently serving queries
pub static SNAPSHOT_GENERATION: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "catalux_snapshot_generation",
        "Generation of the currently published index snapshot"
    )
    .expect("Failed to register snapshot generation gauge")
});

/// Products in the published snapshot
pub static INDEXED_PRODUCTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "catalux_indexed_products",
        "Number of products in the published snapshot"
    )
    .expect("Failed to register indexed products gauge")
});

/// Filter index entries per filter key in the published snapshot
pub static FILTER_INDEX_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "catalux_filter_index_entries",
        "Filter index entries in the published snapshot",
        &["filter_key"]
    )
    .expect("Failed to register filter index entries gauge")
});

// ===== Query Metrics =====

/// Total number of query operations by operation and status
pub static QUERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "catalux_queries_total",
        "Total number of query operations",
        &["operation", "status"]
    )
    .expect("Failed to register query counter")
});

/// Query latency histogram
pub static QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "catalux_query_duration_seconds",
        "Query latency in seconds",
        &["operation"],
        // Buckets: 100us, 500us, 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 200ms, 500ms, 1s
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0]
    )
    .expect("Failed to register query duration histogram")
});

/// Render the default registry in the Prometheus text exposition format.
pub fn render() -> CoreResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| CoreError::SerializationError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| CoreError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let _ = &*REBUILDS_TOTAL;
        let _ = &*REBUILD_DURATION;
        let _ = &*SNAPSHOT_GENERATION;
        let _ = &*INDEXED_PRODUCTS;
        let _ = &*FILTER_INDEX_ENTRIES;
        let _ = &*QUERIES_TOTAL;
        let _ = &*QUERY_DURATION;
    }

    #[test]
    fn test_query_metrics_render() {
        QUERIES_TOTAL.with_label_values(&["search", "ok"]).inc();
        let _timer = QUERY_DURATION.with_label_values(&["search"]).start_timer();
        drop(_timer);

        let text = render().unwrap();
        assert!(text.contains("catalux_queries_total"));
        assert!(text.contains("catalux_query_duration_seconds"));
    }
}
