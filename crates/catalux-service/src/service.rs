//! Service layer for catalog queries and index rebuilds.
//! Shared by every API surface.
//!
//! The service owns the *current snapshot pointer*. Readers clone the `Arc`
//! under a short read lock and then work on the immutable snapshot without
//! holding any lock; a rebuild assembles a brand-new snapshot off the async
//! runtime and swaps the pointer only once it is complete. A failed or
//! cancelled rebuild therefore never disturbs the snapshot being served.
//!
//! Each rebuild runs as its own task. Dropping the caller's future (a
//! request timeout, a client disconnect) detaches it without losing the
//! work: the task keeps the single-flight slot until it has published or
//! failed.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::Instrument;

use catalux_core::metrics::{
    FILTER_INDEX_ENTRIES, INDEXED_PRODUCTS, QUERIES_TOTAL, REBUILDS_TOTAL, REBUILD_DURATION,
    SNAPSHOT_GENERATION,
};
use catalux_core::{CoreError, CoreResult};
use catalux_index::{rebuild, CancellationFlag, IndexSnapshot, RebuildOptions, RebuildReport};
use catalux_query::{
    Facet, PageRequest, ProductDetail, QueryContext, QueryExecutor, SearchPage, SortMode,
    Statistic, TaxonomyTreeNode,
};

use crate::config::ServiceConfig;
use crate::source::{CatalogSource, ConfigSource, JsonlCatalogSource, TomlConfigSource};

type SnapshotCell = Arc<RwLock<Option<Arc<IndexSnapshot>>>>;
type RebuildCell = Arc<Mutex<Option<CancellationFlag>>>;

/// Catalog index service: double-buffered snapshot plus rebuild trigger.
pub struct CatalogService {
    catalog: Arc<dyn CatalogSource>,
    config: Arc<dyn ConfigSource>,
    current: SnapshotCell,
    // Cancellation handle of the running rebuild, if any.
    active_rebuild: RebuildCell,
    threads: Option<usize>,
}

/// Clears the active rebuild slot when the rebuild ends, however it ends.
struct RebuildSlot {
    slot: RebuildCell,
}

impl Drop for RebuildSlot {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Everything one rebuild needs, owned by the task that runs it.
struct RebuildJob {
    catalog: Arc<dyn CatalogSource>,
    config: Arc<dyn ConfigSource>,
    current: SnapshotCell,
    threads: Option<usize>,
    cancel: CancellationFlag,
    _slot: RebuildSlot,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogSource>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            catalog,
            config,
            current: Arc::new(RwLock::new(None)),
            active_rebuild: Arc::new(Mutex::new(None)),
            threads: None,
        }
    }

    /// Service reading the files named in the service configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let catalog = Arc::new(JsonlCatalogSource::new(config.sources.catalog_path.clone()));
        let rules = Arc::new(TomlConfigSource::new(config.sources.rules_path.clone()));
        Self::new(catalog, rules).with_threads(config.rebuild.threads)
    }

    /// Worker threads used by rebuilds; `None` uses the global pool.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Snapshot currently serving queries.
    pub fn current(&self) -> CoreResult<Arc<IndexSnapshot>> {
        self.current
            .read()
            .as_ref()
            .cloned()
            .ok_or(CoreError::IndexUnavailable)
    }

    /// True once the first snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.active_rebuild.lock().is_some()
    }

    /// Generation of the serving snapshot, 0 before the first rebuild.
    pub fn generation(&self) -> u64 {
        generation_of(&self.current)
    }

    /// Report of the rebuild that produced the serving snapshot.
    pub fn last_report(&self) -> CoreResult<RebuildReport> {
        Ok(self.current()?.report().clone())
    }

    /// Executor bound to the serving snapshot.
    pub fn executor(&self) -> CoreResult<QueryExecutor> {
        self.current().map(QueryExecutor::new)
    }

    fn executor_for(&self, operation: &str) -> CoreResult<QueryExecutor> {
        self.executor().map_err(|e| {
            QUERIES_TOTAL
                .with_label_values(&[operation, "unavailable"])
                .inc();
            e
        })
    }

    pub fn search(
        &self,
        context: &QueryContext,
        sort: SortMode,
        page: PageRequest,
    ) -> CoreResult<SearchPage> {
        Ok(self.executor_for("search")?.search(context, sort, page))
    }

    pub fn count(&self, context: &QueryContext) -> CoreResult<u64> {
        Ok(self.executor_for("count")?.count(context))
    }

    pub fn facets(&self, context: &QueryContext) -> CoreResult<Vec<Facet>> {
        Ok(self.executor_for("facets")?.facets(context))
    }

    pub fn taxonomy_tree(&self) -> CoreResult<Vec<TaxonomyTreeNode>> {
        Ok(self.executor()?.taxonomy_tree())
    }

    pub fn statistics(&self) -> CoreResult<Vec<Statistic>> {
        Ok(self.executor()?.statistics())
    }

    pub fn product(&self, id: &str) -> CoreResult<ProductDetail> {
        self.executor()?.product(id)
    }

    /// Signals the running rebuild to stop. Returns false when none is running.
    pub fn cancel_rebuild(&self) -> bool {
        match self.active_rebuild.lock().as_ref() {
            Some(cancel) => {
                cancel.cancel();
                tracing::info!("rebuild cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Rebuilds the index from the sources and publishes it.
    ///
    /// # Errors
    ///
    /// - `RebuildInProgress` when another rebuild is running
    /// - `Source` / `ValidationError` when a source cannot be read or the
    ///   configuration is invalid
    /// - `Cancelled` when [`CatalogService::cancel_rebuild`] was called
    ///
    /// On any error the previously published snapshot keeps serving. The
    /// rebuild runs to completion even when the returned future is dropped.
    #[tracing::instrument(skip(self), fields(generation = self.generation() + 1))]
    pub async fn rebuild(&self) -> CoreResult<RebuildReport> {
        let job = self.begin_rebuild()?;
        tokio::spawn(job.run().in_current_span())
            .await
            .map_err(|e| CoreError::internal(format!("rebuild task failed: {e}")))?
    }

    fn begin_rebuild(&self) -> CoreResult<RebuildJob> {
        let mut active = self.active_rebuild.lock();
        if active.is_some() {
            return Err(CoreError::RebuildInProgress);
        }
        let cancel = CancellationFlag::new();
        *active = Some(cancel.clone());
        Ok(RebuildJob {
            catalog: Arc::clone(&self.catalog),
            config: Arc::clone(&self.config),
            current: Arc::clone(&self.current),
            threads: self.threads,
            cancel,
            _slot: RebuildSlot {
                slot: Arc::clone(&self.active_rebuild),
            },
        })
    }
}

impl RebuildJob {
    async fn run(self) -> CoreResult<RebuildReport> {
        let timer = REBUILD_DURATION.start_timer();

        let result = self.execute().await;
        // Releases the slot before the outcome is reported.
        drop(self);

        match &result {
            Ok(report) => {
                timer.observe_duration();
                REBUILDS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    generation = report.generation,
                    products = report.products_indexed,
                    duration_ms = report.duration_ms,
                    "index snapshot published"
                );
            }
            Err(CoreError::Cancelled) => {
                timer.stop_and_discard();
                REBUILDS_TOTAL.with_label_values(&["cancelled"]).inc();
                tracing::warn!("rebuild cancelled, keeping current snapshot");
            }
            Err(e) => {
                timer.stop_and_discard();
                REBUILDS_TOTAL.with_label_values(&["failed"]).inc();
                tracing::warn!(error = %e, "rebuild failed, keeping current snapshot");
            }
        }

        result
    }

    async fn execute(&self) -> CoreResult<RebuildReport> {
        let config = Arc::new(self.config.load_config().await?);
        let products = self.catalog.load_products().await?;

        let options = RebuildOptions {
            generation: generation_of(&self.current) + 1,
            threads: self.threads,
            cancel: self.cancel.clone(),
        };
        let snapshot = tokio::task::spawn_blocking(move || rebuild(config, products, &options))
            .await
            .map_err(|e| CoreError::internal(format!("rebuild task failed: {e}")))??;

        let report = snapshot.report().clone();
        self.publish(Arc::new(snapshot));
        Ok(report)
    }

    /// Atomically replaces the serving snapshot.
    fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        SNAPSHOT_GENERATION.set(snapshot.generation() as i64);
        INDEXED_PRODUCTS.set(snapshot.len() as i64);
        FILTER_INDEX_ENTRIES.reset();
        for (key, field) in snapshot.fields() {
            FILTER_INDEX_ENTRIES
                .with_label_values(&[key.as_str()])
                .set(field.len() as i64);
        }

        let previous = self.current.write().replace(snapshot);
        if let Some(previous) = previous {
            tracing::debug!(generation = previous.generation(), "retired snapshot");
        }
    }
}

fn generation_of(current: &SnapshotCell) -> u64 {
    current
        .read()
        .as_ref()
        .map_or(0, |snapshot| snapshot.generation())
}
