//! Facet engine.
//!
//! For every filter applicable to the context's taxonomy scope, counts the
//! candidate products per observed value. Each filter is counted against
//! the candidates of the context *without* its own selection, so choosing
//! one value never hides the alternatives of the same filter.

use std::cmp::Reverse;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use catalux_core::{ConfigSnapshot, FilterDefinition, FilterKind};
use catalux_index::{FieldIndex, IndexSnapshot};

use crate::context::QueryContext;
use crate::predicate::{match_text, Predicate};

/// Value or bucket a facet count refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetBucket {
    Boolean(bool),
    Term(String),
    /// Inclusive numeric interval; the observed range or a configured bucket.
    Range { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: FacetBucket,
    pub count: u64,
}

/// Counts for one filter key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub key: String,
    pub label: String,
    pub kind: FilterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub values: Vec<FacetValue>,
}

impl Facet {
    pub fn count_of(&self, value: &FacetBucket) -> Option<u64> {
        self.values
            .iter()
            .find(|v| &v.value == value)
            .map(|v| v.count)
    }
}

/// Whether `definition` applies to the taxonomy scope of `context`.
pub fn is_applicable(
    config: &ConfigSnapshot,
    definition: &FilterDefinition,
    context: &QueryContext,
) -> bool {
    let Some(applicable) = &definition.applicable_taxonomy else {
        return true;
    };
    if context.taxonomy_codes.is_empty() {
        return true;
    }
    context.taxonomy_codes.iter().any(|selected| {
        applicable
            .iter()
            .any(|code| config.on_same_path(selected.as_str(), code.as_str()))
    })
}

/// Computes the facets of `context`. Filters without any candidate value
/// are left out.
///
/// The structured candidates are evaluated once per distinct exclusion.
/// A text query is then matched once over their union and intersected into
/// every set, so the text scan does not repeat per selected filter.
pub fn compute(snapshot: &IndexSnapshot, context: &QueryContext) -> Vec<Facet> {
    let config = snapshot.config();
    let structured = |exclude_key: Option<&str>| {
        Predicate::compile(context, snapshot, exclude_key).evaluate(snapshot)
    };

    let applicable: Vec<_> = config
        .active_filters()
        .into_iter()
        .filter(|definition| is_applicable(config, definition, context))
        .filter_map(|definition| Some((definition, snapshot.field(&definition.key)?)))
        .collect();

    let mut base = structured(None);
    let mut candidate_sets: Vec<Option<RoaringBitmap>> = applicable
        .iter()
        .map(|(definition, _)| {
            context
                .filters
                .contains_key(&definition.key)
                .then(|| structured(Some(definition.key.as_str())))
        })
        .collect();

    if let Some(query) = context.text_query() {
        let mut scope = base.clone();
        for set in candidate_sets.iter().flatten() {
            scope |= set;
        }
        let text = match_text(snapshot, &scope, &query).bitmap;
        base &= &text;
        for set in candidate_sets.iter_mut().flatten() {
            *set &= &text;
        }
    }

    applicable
        .into_iter()
        .zip(candidate_sets)
        .filter_map(|((definition, field), own)| {
            let values = count_values(field, own.as_ref().unwrap_or(&base));
            (!values.is_empty()).then(|| Facet {
                key: definition.key.clone(),
                label: definition.label.clone(),
                kind: definition.kind,
                unit: definition.unit.clone(),
                values,
            })
        })
        .collect()
}

fn count_values(field: &FieldIndex, candidates: &RoaringBitmap) -> Vec<FacetValue> {
    match field.kind() {
        FilterKind::Boolean => {
            let (yes, no) = field.bool_counts(candidates);
            [(true, yes), (false, no)]
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(value, count)| FacetValue {
                    value: FacetBucket::Boolean(value),
                    count,
                })
                .collect()
        }
        FilterKind::Categorical => {
            let mut terms = field.term_counts(candidates);
            terms.sort_by_key(|(term, count)| (Reverse(*count), *term));
            terms
                .into_iter()
                .map(|(term, count)| FacetValue {
                    value: FacetBucket::Term(term.to_string()),
                    count,
                })
                .collect()
        }
        FilterKind::NumericRange => {
            let Some((min, max, count)) = field.numeric_summary(candidates) else {
                return Vec::new();
            };
            let mut values = vec![FacetValue {
                value: FacetBucket::Range { min, max },
                count,
            }];
            if let Some(boundaries) = &field.definition().buckets {
                values.extend(field.bucket_counts(candidates, boundaries).into_iter().map(
                    |(lo, hi, count)| FacetValue {
                        value: FacetBucket::Range { min: lo, max: hi },
                        count,
                    },
                ));
            }
            values
        }
    }
}
