//! Catalog query endpoints.
//!
//! Every request is answered from the snapshot that is current when the
//! request starts; a rebuild finishing mid-request does not affect it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use catalux_query::{
    Facet, PageRequest, ProductDetail, QueryContext, SearchPage, SortMode, Statistic,
    TaxonomyTreeNode,
};
use serde::{Deserialize, Serialize};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub context: QueryContext,
    #[serde(default)]
    pub sort: SortMode,
    /// Page size; defaults to `query.default_page_size`, capped at
    /// `query.max_page_size`.
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[tracing::instrument(skip(state, req), fields(sort = ?req.sort, offset = req.offset))]
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchPage>, (StatusCode, String)> {
    let limit = state.query.page_size(req.limit);
    let page = PageRequest::new(req.offset, limit);

    state
        .service
        .search(&req.context, req.sort, page)
        .map(Json)
        .map_err(error_response)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[tracing::instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    Json(context): Json<QueryContext>,
) -> Result<Json<CountResponse>, (StatusCode, String)> {
    let count = state.service.count(&context).map_err(error_response)?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Serialize)]
pub struct FacetsResponse {
    pub facets: Vec<Facet>,
}

#[tracing::instrument(skip_all)]
pub async fn facets(
    State(state): State<AppState>,
    Json(context): Json<QueryContext>,
) -> Result<Json<FacetsResponse>, (StatusCode, String)> {
    let facets = state.service.facets(&context).map_err(error_response)?;
    Ok(Json(FacetsResponse { facets }))
}

#[derive(Debug, Serialize)]
pub struct TaxonomyResponse {
    pub generation: u64,
    pub nodes: Vec<TaxonomyTreeNode>,
}

pub async fn taxonomy_tree(
    State(state): State<AppState>,
) -> Result<Json<TaxonomyResponse>, (StatusCode, String)> {
    let executor = state.service.executor().map_err(error_response)?;
    Ok(Json(TaxonomyResponse {
        generation: executor.snapshot().generation(),
        nodes: executor.taxonomy_tree(),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub statistics: Vec<Statistic>,
}

pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<StatisticsResponse>, (StatusCode, String)> {
    let statistics = state.service.statistics().map_err(error_response)?;
    Ok(Json(StatisticsResponse { statistics }))
}

#[tracing::instrument(skip(state))]
pub async fn get_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProductDetail>, (StatusCode, String)> {
    if id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "product id cannot be empty".to_string(),
        ));
    }

    state
        .service
        .product(&id)
        .map(Json)
        .map_err(error_response)
}
