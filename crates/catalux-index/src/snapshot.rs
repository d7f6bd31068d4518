//! Immutable index snapshot served to queries.
//!
//! A snapshot is produced in one piece by [`crate::rebuild`] and never
//! mutated afterwards. Products are addressed by dense `u32` ordinals
//! assigned in ascending product-id order, which doubles as the natural
//! result order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use catalux_core::{ConfigSnapshot, FilterValue, Product, ProductId, SupplierCode, TaxonomyCode};

use crate::classifier::{SkippedRule, TaxonomyAssignment};
use crate::field_index::FieldIndex;

/// Outcome of the rebuild that produced a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub products_indexed: usize,
    /// Later occurrences of an already-seen product id.
    pub duplicate_products: Vec<ProductId>,
    pub skipped_rules: Vec<SkippedRule>,
    /// Products no rule assigned a taxonomy code to.
    pub unclassified: Vec<ProductId>,
    /// Entry count per filter key.
    pub filter_entries: BTreeMap<String, u64>,
}

/// Lower-cased descriptive fields used for text matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchText {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl SearchText {
    pub fn new(product: &Product) -> Self {
        Self {
            id: product.id.as_str().trim().to_lowercase(),
            name: product.name.trim().to_lowercase(),
            description: product
                .description
                .as_deref()
                .map(|d| d.trim().to_lowercase())
                .unwrap_or_default(),
        }
    }

    pub fn fields(&self) -> [&str; 3] {
        [&self.id, &self.name, &self.description]
    }
}

/// Derived, rebuildable index over one catalog + configuration snapshot.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub(crate) generation: u64,
    pub(crate) config: Arc<ConfigSnapshot>,
    pub(crate) products: Vec<Product>,
    pub(crate) ordinals: HashMap<ProductId, u32>,
    pub(crate) search_text: Vec<SearchText>,
    pub(crate) assignments: Vec<TaxonomyAssignment>,
    pub(crate) all: RoaringBitmap,
    pub(crate) taxonomy_direct: BTreeMap<TaxonomyCode, RoaringBitmap>,
    pub(crate) taxonomy_subtree: BTreeMap<TaxonomyCode, RoaringBitmap>,
    pub(crate) flags: BTreeMap<String, RoaringBitmap>,
    pub(crate) suppliers: BTreeMap<SupplierCode, RoaringBitmap>,
    pub(crate) unclassified: RoaringBitmap,
    pub(crate) fields: BTreeMap<String, FieldIndex>,
    pub(crate) report: RebuildReport,
}

impl IndexSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Configuration the snapshot was built from.
    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn report(&self) -> &RebuildReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products in ordinal (= product id) order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, ordinal: u32) -> Option<&Product> {
        self.products.get(ordinal as usize)
    }

    pub fn ordinal(&self, id: &str) -> Option<u32> {
        self.ordinals.get(id).copied()
    }

    pub fn search_text(&self, ordinal: u32) -> Option<&SearchText> {
        self.search_text.get(ordinal as usize)
    }

    pub fn assignment(&self, ordinal: u32) -> Option<&TaxonomyAssignment> {
        self.assignments.get(ordinal as usize)
    }

    /// Assignments in ordinal order.
    pub fn assignments(&self) -> &[TaxonomyAssignment] {
        &self.assignments
    }

    pub fn taxonomy_assignment(&self, id: &str) -> Option<&TaxonomyAssignment> {
        self.ordinal(id).and_then(|ordinal| self.assignment(ordinal))
    }

    /// Every product in the snapshot.
    pub fn all(&self) -> &RoaringBitmap {
        &self.all
    }

    /// Products assigned directly to `code`.
    pub fn taxonomy_direct(&self, code: &str) -> Option<&RoaringBitmap> {
        self.taxonomy_direct.get(code)
    }

    /// Products assigned to `code` or any of its descendants.
    pub fn taxonomy_scope(&self, code: &str) -> Option<&RoaringBitmap> {
        self.taxonomy_subtree.get(code)
    }

    /// Products whose flag is `true`.
    pub fn flag(&self, name: &str) -> Option<&RoaringBitmap> {
        self.flags.get(name)
    }

    pub fn flags(&self) -> &BTreeMap<String, RoaringBitmap> {
        &self.flags
    }

    pub fn supplier(&self, code: &str) -> Option<&RoaringBitmap> {
        self.suppliers.get(code)
    }

    pub fn suppliers(&self) -> &BTreeMap<SupplierCode, RoaringBitmap> {
        &self.suppliers
    }

    pub fn unclassified(&self) -> &RoaringBitmap {
        &self.unclassified
    }

    pub fn field(&self, key: &str) -> Option<&FieldIndex> {
        self.fields.get(key)
    }

    /// Field indexes keyed by filter key.
    pub fn fields(&self) -> &BTreeMap<String, FieldIndex> {
        &self.fields
    }

    pub fn filter_entry(&self, id: &str, key: &str) -> Option<&FilterValue> {
        let ordinal = self.ordinal(id)?;
        self.fields.get(key)?.value(ordinal)
    }

    /// Total number of filter index entries across all keys.
    pub fn filter_entry_count(&self) -> u64 {
        self.fields.values().map(FieldIndex::len).sum()
    }

    /// All filter entries ordered by filter key, then product id.
    pub fn filter_entries(&self) -> impl Iterator<Item = (&ProductId, &str, &FilterValue)> {
        self.fields.iter().flat_map(move |(key, field)| {
            field.entries().filter_map(move |(ordinal, value)| {
                self.product(ordinal)
                    .map(|product| (&product.id, key.as_str(), value))
            })
        })
    }
}
