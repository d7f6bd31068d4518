use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use catalux_core::{Product, SupplierCode, TaxonomyCode};

/// Tri-state constraint on a classification flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    RequireTrue,
    RequireFalse,
    #[default]
    Ignore,
}

/// Selection for one structured filter key.
///
/// Serialized untagged: a JSON boolean, an array of terms, or an object with
/// optional `min` / `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSelection {
    Boolean(bool),
    Values(Vec<String>),
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl FilterSelection {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range { min, max }
    }
}

/// Predicates shared by `search`, `count` and `facets`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContext {
    /// Free-text query over id, name and description.
    pub text: Option<String>,
    /// Taxonomy codes, OR'd; each matches its whole subtree.
    pub taxonomy_codes: Vec<TaxonomyCode>,
    pub flags: BTreeMap<String, FlagState>,
    /// Supplier codes, OR'd.
    pub suppliers: Vec<SupplierCode>,
    /// Structured filter selections keyed by filter key, AND'd.
    pub filters: BTreeMap<String, FilterSelection>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_taxonomy(mut self, code: impl Into<TaxonomyCode>) -> Self {
        self.taxonomy_codes.push(code.into());
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, state: FlagState) -> Self {
        self.flags.insert(name.into(), state);
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<SupplierCode>) -> Self {
        self.suppliers.push(supplier.into());
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, selection: FilterSelection) -> Self {
        self.filters.insert(key.into(), selection);
        self
    }

    /// Normalised text query; blank text counts as no query.
    pub fn text_query(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase)
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
}

/// Page window over an ordered result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: usize,
    /// `None` returns everything after `offset`.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// The whole result set.
    pub fn all() -> Self {
        Self::default()
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub products: Vec<Product>,
    pub has_more: bool,
    /// Size of the full result set.
    pub total: u64,
}
