//! Predicate tree compiled from a [`QueryContext`] and evaluated against an
//! index snapshot.
//!
//! Composition follows the usual boolean operators over bitmaps:
//! - `Must`: logical AND (an empty `Must` matches every product)
//! - `Should`: logical OR
//! - `MustNot`: complement within the snapshot
//!
//! Leaves resolve to the snapshot's precomputed bitmaps, so evaluating a
//! context never scans products. Free text is not part of the tree; it is
//! applied afterwards over the candidate set by [`select`].

use std::collections::HashMap;

use roaring::RoaringBitmap;
use tracing::debug;

use catalux_core::{FilterKind, SupplierCode, TaxonomyCode};
use catalux_index::{IndexSnapshot, SearchText};

use crate::context::{FilterSelection, FlagState, QueryContext};

/// Boolean predicate over the products of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Must(Vec<Predicate>),
    Should(Vec<Predicate>),
    MustNot(Box<Predicate>),
    /// Products in the subtree of a taxonomy code.
    Taxonomy(TaxonomyCode),
    /// Products whose flag is `true`.
    Flag(String),
    Supplier(SupplierCode),
    Boolean {
        key: String,
        value: bool,
    },
    Terms {
        key: String,
        terms: Vec<String>,
    },
    /// Inclusive range; a missing bound is unconstrained.
    Range {
        key: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Predicate {
    /// Compiles every predicate of `context` except the selection for
    /// `exclude_key`.
    ///
    /// Unknown filter keys, unknown flags and selections whose kind does not
    /// match the filter are dropped. Unknown taxonomy and supplier codes are
    /// kept and match nothing.
    pub fn compile(
        context: &QueryContext,
        snapshot: &IndexSnapshot,
        exclude_key: Option<&str>,
    ) -> Self {
        let mut clauses = Vec::new();

        if !context.taxonomy_codes.is_empty() {
            clauses.push(Self::Should(
                context
                    .taxonomy_codes
                    .iter()
                    .cloned()
                    .map(Self::Taxonomy)
                    .collect(),
            ));
        }

        for (name, state) in &context.flags {
            if snapshot.flag(name).is_none() {
                if *state != FlagState::Ignore {
                    debug!(flag = %name, "ignoring unknown flag");
                }
                continue;
            }
            match state {
                FlagState::RequireTrue => clauses.push(Self::Flag(name.clone())),
                FlagState::RequireFalse => {
                    clauses.push(Self::MustNot(Box::new(Self::Flag(name.clone()))))
                }
                FlagState::Ignore => {}
            }
        }

        if !context.suppliers.is_empty() {
            clauses.push(Self::Should(
                context
                    .suppliers
                    .iter()
                    .cloned()
                    .map(Self::Supplier)
                    .collect(),
            ));
        }

        for (key, selection) in &context.filters {
            if exclude_key == Some(key.as_str()) {
                continue;
            }
            if let Some(clause) = Self::filter_clause(snapshot, key, selection) {
                clauses.push(clause);
            }
        }

        Self::Must(clauses)
    }

    fn filter_clause(
        snapshot: &IndexSnapshot,
        key: &str,
        selection: &FilterSelection,
    ) -> Option<Self> {
        let Some(field) = snapshot.field(key) else {
            debug!(filter = %key, "ignoring unknown filter key");
            return None;
        };

        match (field.kind(), selection) {
            (FilterKind::Boolean, FilterSelection::Boolean(value)) => Some(Self::Boolean {
                key: key.to_string(),
                value: *value,
            }),
            (FilterKind::Categorical, FilterSelection::Values(values)) => {
                let terms: Vec<String> = values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                (!terms.is_empty()).then(|| Self::Terms {
                    key: key.to_string(),
                    terms,
                })
            }
            (FilterKind::NumericRange, FilterSelection::Range { min, max }) => {
                let (min, max) = normalize_range(*min, *max);
                if min.is_none() && max.is_none() {
                    return None;
                }
                Some(Self::Range {
                    key: key.to_string(),
                    min,
                    max,
                })
            }
            (kind, _) => {
                debug!(filter = %key, kind = kind.as_str(), "ignoring selection of mismatched kind");
                None
            }
        }
    }

    /// Product ordinals matching the predicate.
    pub fn evaluate(&self, snapshot: &IndexSnapshot) -> RoaringBitmap {
        match self {
            Self::Must(clauses) => {
                let mut iter = clauses.iter();
                let Some(first) = iter.next() else {
                    return snapshot.all().clone();
                };
                let mut bitmap = first.evaluate(snapshot);
                for clause in iter {
                    if bitmap.is_empty() {
                        break;
                    }
                    bitmap &= clause.evaluate(snapshot);
                }
                bitmap
            }
            Self::Should(clauses) => {
                let mut bitmap = RoaringBitmap::new();
                for clause in clauses {
                    bitmap |= clause.evaluate(snapshot);
                }
                bitmap
            }
            Self::MustNot(inner) => snapshot.all() - inner.evaluate(snapshot),
            Self::Taxonomy(code) => snapshot
                .taxonomy_scope(code.as_str())
                .cloned()
                .unwrap_or_default(),
            Self::Flag(name) => snapshot.flag(name).cloned().unwrap_or_default(),
            Self::Supplier(code) => snapshot
                .supplier(code.as_str())
                .cloned()
                .unwrap_or_default(),
            Self::Boolean { key, value } => snapshot
                .field(key)
                .map(|field| field.find_bool(*value))
                .unwrap_or_default(),
            Self::Terms { key, terms } => snapshot
                .field(key)
                .map(|field| field.find_terms(terms))
                .unwrap_or_default(),
            Self::Range { key, min, max } => snapshot
                .field(key)
                .map(|field| field.find_range(*min, *max))
                .unwrap_or_default(),
        }
    }
}

/// Drops non-finite bounds and swaps inverted ones.
pub fn normalize_range(min: Option<f64>, max: Option<f64>) -> (Option<f64>, Option<f64>) {
    let min = min.filter(|v| v.is_finite());
    let max = max.filter(|v| v.is_finite());
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => {
            debug!(min = lo, max = hi, "swapping inverted range bounds");
            (Some(hi), Some(lo))
        }
        bounds => bounds,
    }
}

/// Quality of a text match; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Exact,
    Prefix,
    Substring,
}

/// Best tier of `query` (already lower-cased) over the searchable fields.
pub fn match_tier(text: &SearchText, query: &str) -> Option<MatchTier> {
    text.fields()
        .iter()
        .filter_map(|field| {
            if *field == query {
                Some(MatchTier::Exact)
            } else if field.starts_with(query) {
                Some(MatchTier::Prefix)
            } else if field.contains(query) {
                Some(MatchTier::Substring)
            } else {
                None
            }
        })
        .min()
}

/// Candidate set of a context plus the text tier of each candidate.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub bitmap: RoaringBitmap,
    /// Present only when the context carries a text query.
    pub tiers: Option<HashMap<u32, MatchTier>>,
}

impl Candidates {
    pub fn len(&self) -> u64 {
        self.bitmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }
}

/// Evaluates every predicate of `context`, free text included, except the
/// selection for `exclude_key`.
pub fn select(
    context: &QueryContext,
    snapshot: &IndexSnapshot,
    exclude_key: Option<&str>,
) -> Candidates {
    let structured = Predicate::compile(context, snapshot, exclude_key).evaluate(snapshot);

    match context.text_query() {
        Some(query) => match_text(snapshot, &structured, &query),
        None => Candidates {
            bitmap: structured,
            tiers: None,
        },
    }
}

/// Products of `within` whose search text matches the lowercased `query`,
/// with their match tiers. Each ordinal's text is read once.
pub fn match_text(snapshot: &IndexSnapshot, within: &RoaringBitmap, query: &str) -> Candidates {
    let mut bitmap = RoaringBitmap::new();
    let mut tiers = HashMap::new();
    for ordinal in within.iter() {
        if let Some(tier) = snapshot
            .search_text(ordinal)
            .and_then(|text| match_tier(text, query))
        {
            bitmap.insert(ordinal);
            tiers.insert(ordinal, tier);
        }
    }

    Candidates {
        bitmap,
        tiers: Some(tiers),
    }
}
