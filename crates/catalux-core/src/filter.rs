use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::TaxonomyCode;
use crate::taxonomy::default_true;

/// Value kind of a filter definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Boolean,
    Categorical,
    NumericRange,
}

impl FilterKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
            Self::NumericRange => "numeric_range",
        }
    }
}

/// Operator-editable definition of one filterable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Unique filter key used in queries.
    pub key: String,
    /// Display label.
    pub label: String,
    pub kind: FilterKind,
    /// Raw attribute code the value is extracted from.
    pub source_attribute: String,
    /// `None` makes the filter universal; otherwise it is only offered inside
    /// the subtrees of these codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicable_taxonomy: Option<BTreeSet<TaxonomyCode>>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Ascending bucket boundaries for numeric facets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Display order of the facet, lower first.
    #[serde(default)]
    pub sort_order: i32,
}

impl FilterDefinition {
    /// Creates an active, universal filter definition.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        kind: FilterKind,
        source_attribute: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            source_attribute: source_attribute.into(),
            applicable_taxonomy: None,
            active: true,
            buckets: None,
            unit: None,
            sort_order: 0,
        }
    }

    #[must_use]
    pub fn applicable_to<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaxonomyCode>,
    {
        self.applicable_taxonomy = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = Some(buckets);
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Typed value of one filter index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Boolean(bool),
    Numeric(f64),
    Categorical(String),
}

impl FilterValue {
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::Boolean(_) => FilterKind::Boolean,
            Self::Categorical(_) => FilterKind::Categorical,
            Self::Numeric(_) => FilterKind::NumericRange,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Categorical(v) => f.write_str(v),
            Self::Numeric(v) => write!(f, "{v}"),
        }
    }
}
