//! Shared state handed to every handler.

use std::sync::Arc;

use catalux_service::{CatalogService, QueryConfig};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CatalogService>,
    /// Page size defaults and limits applied to search requests.
    pub query: QueryConfig,
}

impl AppState {
    pub fn new(service: Arc<CatalogService>, query: QueryConfig) -> Self {
        Self { service, query }
    }
}
