//! Full rebuild of an [`IndexSnapshot`] from a catalog and a configuration.
//!
//! The rebuild runs in three phases:
//!
//! 1. order the catalog by product id and drop duplicate ids,
//! 2. classify every product and extract its filter values on the rayon
//!    pool (each product is independent),
//! 3. merge the per-product results into bitmaps on the calling thread.
//!
//! Nothing is shared with a previously published snapshot, so a failed or
//! cancelled rebuild leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use tracing::{debug, info, warn};

use catalux_core::{ConfigSnapshot, CoreError, CoreResult, FilterValue, Product, ProductId};

use crate::builder::IndexBuilder;
use crate::classifier::{Classifier, TaxonomyAssignment};
use crate::field_index::FieldIndex;
use crate::snapshot::{IndexSnapshot, RebuildReport, SearchText};

/// Cooperative cancellation signal shared between a rebuild and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Parameters of a single rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildOptions {
    /// Generation stamped on the produced snapshot.
    pub generation: u64,
    /// Worker threads for the classification phase; `None` uses the global
    /// rayon pool.
    pub threads: Option<usize>,
    pub cancel: CancellationFlag,
}

impl RebuildOptions {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

struct Classified {
    assignment: TaxonomyAssignment,
    values: Vec<(usize, FilterValue)>,
    text: SearchText,
}

/// Builds a complete snapshot.
///
/// # Errors
///
/// Returns `Cancelled` when `options.cancel` fires before the snapshot is
/// complete, and `Internal` when the worker pool cannot be created or the
/// catalog exceeds the ordinal space.
pub fn rebuild(
    config: Arc<ConfigSnapshot>,
    catalog: Vec<Product>,
    options: &RebuildOptions,
) -> CoreResult<IndexSnapshot> {
    let started_at = Utc::now();
    let timer = Instant::now();
    let received = catalog.len();

    let (products, duplicate_products) = dedupe(catalog);
    for id in &duplicate_products {
        warn!(product_id = %id, "duplicate product id, keeping first occurrence");
    }
    if products.len() > u32::MAX as usize {
        return Err(CoreError::internal(format!(
            "catalog of {} products exceeds the index capacity",
            products.len()
        )));
    }

    let (classifier, skipped_rules) = Classifier::prepare(&config);
    let builder = IndexBuilder::new(&config);
    debug!(
        products = products.len(),
        rules = classifier.len(),
        filters = builder.filters().len(),
        "starting classification"
    );
    options.cancel.check()?;

    let classify_all = || -> CoreResult<Vec<Classified>> {
        products
            .par_iter()
            .map(|product| {
                options.cancel.check()?;
                Ok(Classified {
                    assignment: classifier.classify(product),
                    values: builder.extract(product),
                    text: SearchText::new(product),
                })
            })
            .collect()
    };

    let classified = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| CoreError::internal(format!("failed to create rebuild pool: {e}")))?
            .install(classify_all)?,
        None => classify_all()?,
    };
    options.cancel.check()?;

    let mut all = RoaringBitmap::new();
    let mut ordinals = HashMap::with_capacity(products.len());
    let mut search_text = Vec::with_capacity(products.len());
    let mut assignments = Vec::with_capacity(products.len());
    let mut unclassified = RoaringBitmap::new();
    let mut unclassified_ids = Vec::new();
    let mut suppliers: BTreeMap<_, RoaringBitmap> = BTreeMap::new();
    let mut taxonomy_direct: BTreeMap<_, RoaringBitmap> = BTreeMap::new();
    let mut flags: BTreeMap<String, RoaringBitmap> = classifier
        .flags()
        .iter()
        .map(|flag| (flag.clone(), RoaringBitmap::new()))
        .collect();
    let mut fields: Vec<FieldIndex> = builder
        .filters()
        .iter()
        .cloned()
        .map(FieldIndex::new)
        .collect();

    for (position, (product, item)) in products.iter().zip(classified).enumerate() {
        let ordinal = position as u32;
        all.insert(ordinal);
        ordinals.insert(product.id.clone(), ordinal);

        if let Some(supplier) = &product.supplier {
            suppliers.entry(supplier.clone()).or_default().insert(ordinal);
        }
        if item.assignment.is_unclassified() {
            unclassified.insert(ordinal);
            unclassified_ids.push(product.id.clone());
        }
        for code in &item.assignment.codes {
            taxonomy_direct.entry(code.clone()).or_default().insert(ordinal);
        }
        for (flag, value) in &item.assignment.flags {
            if *value {
                flags.entry(flag.clone()).or_default().insert(ordinal);
            }
        }
        for (slot, value) in item.values {
            fields[slot].insert(ordinal, value);
        }

        search_text.push(item.text);
        assignments.push(item.assignment);
    }

    // Every known node gets a scope, so an empty category still resolves.
    let mut taxonomy_subtree: BTreeMap<_, RoaringBitmap> = config
        .taxonomy()
        .iter()
        .map(|node| (node.code.clone(), RoaringBitmap::new()))
        .collect();
    for (code, members) in &taxonomy_direct {
        for ancestor in config.lineage(code.as_str()) {
            if let Some(scope) = taxonomy_subtree.get_mut(ancestor) {
                *scope |= members;
            }
        }
    }

    let fields: BTreeMap<String, FieldIndex> = fields
        .into_iter()
        .map(|field| (field.key().to_string(), field))
        .collect();
    let filter_entries: BTreeMap<String, u64> = fields
        .iter()
        .map(|(key, field)| (key.clone(), field.len()))
        .collect();

    options.cancel.check()?;

    let report = RebuildReport {
        generation: options.generation,
        started_at,
        duration_ms: timer.elapsed().as_millis() as u64,
        products_indexed: products.len(),
        duplicate_products,
        skipped_rules,
        unclassified: unclassified_ids,
        filter_entries,
    };

    info!(
        generation = report.generation,
        received,
        indexed = report.products_indexed,
        unclassified = report.unclassified.len(),
        duplicates = report.duplicate_products.len(),
        skipped_rules = report.skipped_rules.len(),
        duration_ms = report.duration_ms,
        "index snapshot built"
    );

    Ok(IndexSnapshot {
        generation: options.generation,
        config,
        products,
        ordinals,
        search_text,
        assignments,
        all,
        taxonomy_direct,
        taxonomy_subtree,
        flags,
        suppliers,
        unclassified,
        fields,
        report,
    })
}

/// Orders products by id and keeps the first occurrence of each id.
fn dedupe(mut catalog: Vec<Product>) -> (Vec<Product>, Vec<ProductId>) {
    // Stable, so equal ids keep their input order.
    catalog.sort_by(|a, b| a.id.cmp(&b.id));

    let mut products: Vec<Product> = Vec::with_capacity(catalog.len());
    let mut duplicates = Vec::new();
    for product in catalog {
        match products.last() {
            Some(last) if last.id == product.id => duplicates.push(product.id),
            _ => products.push(product),
        }
    }
    (products, duplicates)
}
