//! Query executor bound to one index snapshot.
//!
//! Every operation reads only the snapshot it was created with, so a
//! rebuild published mid-request never changes an answer halfway through.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, instrument};

use catalux_core::metrics::{QUERIES_TOTAL, QUERY_DURATION};
use catalux_core::{CoreError, CoreResult};
use catalux_index::IndexSnapshot;

use crate::context::{PageRequest, QueryContext, SearchPage, SortMode};
use crate::facets::{self, Facet};
use crate::predicate::{select, Candidates};
use crate::read_model::{self, ProductDetail, Statistic, TaxonomyTreeNode};

/// Executes queries against a single immutable snapshot.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    snapshot: Arc<IndexSnapshot>,
}

impl QueryExecutor {
    pub fn new(snapshot: Arc<IndexSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Ordered page of matching products.
    #[instrument(skip_all, fields(generation = self.snapshot.generation(), sort = ?sort, offset = page.offset))]
    pub fn search(&self, context: &QueryContext, sort: SortMode, page: PageRequest) -> SearchPage {
        let timer = QUERY_DURATION.with_label_values(&["search"]).start_timer();
        let candidates = select(context, &self.snapshot, None);
        let total = candidates.len();

        let ordinals = self.order(&candidates, sort);
        let products: Vec<_> = ordinals
            .into_iter()
            .skip(page.offset)
            .take(page.limit.unwrap_or(usize::MAX))
            .filter_map(|ordinal| self.snapshot.product(ordinal).cloned())
            .collect();

        let has_more = (page.offset as u64).saturating_add(products.len() as u64) < total;
        debug!(total, returned = products.len(), has_more, "search complete");

        timer.observe_duration();
        QUERIES_TOTAL.with_label_values(&["search", "ok"]).inc();
        SearchPage {
            products,
            has_more,
            total,
        }
    }

    /// Number of matching products; agrees with an unbounded `search`.
    #[instrument(skip_all, fields(generation = self.snapshot.generation()))]
    pub fn count(&self, context: &QueryContext) -> u64 {
        let timer = QUERY_DURATION.with_label_values(&["count"]).start_timer();
        let count = select(context, &self.snapshot, None).len();
        timer.observe_duration();
        QUERIES_TOTAL.with_label_values(&["count", "ok"]).inc();
        count
    }

    #[instrument(skip_all, fields(generation = self.snapshot.generation()))]
    pub fn facets(&self, context: &QueryContext) -> Vec<Facet> {
        let timer = QUERY_DURATION.with_label_values(&["facets"]).start_timer();
        let facets = facets::compute(&self.snapshot, context);
        debug!(facets = facets.len(), "facets computed");
        timer.observe_duration();
        QUERIES_TOTAL.with_label_values(&["facets", "ok"]).inc();
        facets
    }

    pub fn taxonomy_tree(&self) -> Vec<TaxonomyTreeNode> {
        read_model::taxonomy_tree(&self.snapshot)
    }

    pub fn statistics(&self) -> Vec<Statistic> {
        read_model::statistics(&self.snapshot)
    }

    pub fn product(&self, id: &str) -> CoreResult<ProductDetail> {
        read_model::product_detail(&self.snapshot, id)
            .ok_or_else(|| CoreError::not_found("product", id))
    }

    fn order(&self, candidates: &Candidates, sort: SortMode) -> Vec<u32> {
        let mut ordinals: Vec<u32> = candidates.bitmap.iter().collect();
        match sort {
            SortMode::Relevance => {
                // Bitmap iteration is already in product id order.
                if let Some(tiers) = &candidates.tiers {
                    ordinals.sort_by_key(|ordinal| (tiers.get(ordinal).copied(), *ordinal));
                }
            }
            SortMode::PriceAsc => ordinals.sort_by(|a, b| self.compare_price(*a, *b, false)),
            SortMode::PriceDesc => ordinals.sort_by(|a, b| self.compare_price(*a, *b, true)),
        }
        ordinals
    }

    /// Products without a usable price sort last in both directions.
    fn compare_price(&self, a: u32, b: u32, descending: bool) -> Ordering {
        let price = |ordinal: u32| {
            self.snapshot
                .product(ordinal)
                .and_then(|product| product.price)
                .filter(|price| price.is_finite())
        };

        let by_price = match (price(a), price(b)) {
            (Some(x), Some(y)) if descending => y.total_cmp(&x),
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_price.then(a.cmp(&b))
    }
}
