//! Per-filter-key index providing equality, range and group-by lookups.
//!
//! Each field index owns the filter entries for one filter key, stored
//! densely by product ordinal, together with a secondary structure matching
//! the filter's value kind: two bitmaps for booleans, a term → bitmap map for
//! categorical values and an ordered value → bitmap map for numbers. Range
//! lookups locate their bounds in `O(log n)` instead of scanning every term.
//!
//! Group-by summaries pick one of two paths per call (see [`ScanStrategy`]):
//! intersecting every posting list with the candidate set, or reading the
//! candidates' own values from the dense store. The cheaper one follows
//! whichever of the two sides is smaller, so a narrow candidate set never
//! pays for the number of distinct values in the catalog.

use std::collections::BTreeMap;
use std::ops::Bound;

use ordered_float::OrderedFloat;
use roaring::RoaringBitmap;

use catalux_core::{FilterDefinition, FilterKind, FilterValue};

/// Entries and secondary structures for a single filter key.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    definition: FilterDefinition,
    by_ordinal: Vec<Option<FilterValue>>,
    exists: RoaringBitmap,
    postings: Postings,
}

#[derive(Debug, Clone)]
enum Postings {
    Boolean {
        yes: RoaringBitmap,
        no: RoaringBitmap,
    },
    Categorical {
        terms: BTreeMap<String, RoaringBitmap>,
    },
    Numeric {
        values: BTreeMap<OrderedFloat<f64>, RoaringBitmap>,
    },
}

/// How a group-by summary walks the data for one candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Read each candidate's value from the per-ordinal store.
    Candidates,
    /// Intersect each distinct value's posting list with the candidates.
    Postings,
}

impl FieldIndex {
    pub fn new(definition: FilterDefinition) -> Self {
        let postings = match definition.kind {
            FilterKind::Boolean => Postings::Boolean {
                yes: RoaringBitmap::new(),
                no: RoaringBitmap::new(),
            },
            FilterKind::Categorical => Postings::Categorical {
                terms: BTreeMap::new(),
            },
            FilterKind::NumericRange => Postings::Numeric {
                values: BTreeMap::new(),
            },
        };

        Self {
            definition,
            by_ordinal: Vec::new(),
            exists: RoaringBitmap::new(),
            postings,
        }
    }

    /// Records the value of one product. Only used while a snapshot is being
    /// assembled; a value whose kind does not match the definition is refused.
    pub(crate) fn insert(&mut self, ordinal: u32, value: FilterValue) -> bool {
        if value.kind() != self.definition.kind || self.exists.contains(ordinal) {
            return false;
        }

        match (&mut self.postings, &value) {
            (Postings::Boolean { yes, no }, FilterValue::Boolean(flag)) => {
                if *flag {
                    yes.insert(ordinal);
                } else {
                    no.insert(ordinal);
                }
            }
            (Postings::Categorical { terms }, FilterValue::Categorical(term)) => {
                terms.entry(term.clone()).or_default().insert(ordinal);
            }
            (Postings::Numeric { values }, FilterValue::Numeric(number)) => {
                values.entry(OrderedFloat(*number)).or_default().insert(ordinal);
            }
            _ => return false,
        }

        let slot = ordinal as usize;
        if self.by_ordinal.len() <= slot {
            self.by_ordinal.resize(slot + 1, None);
        }
        self.by_ordinal[slot] = Some(value);
        self.exists.insert(ordinal);
        true
    }

    pub fn definition(&self) -> &FilterDefinition {
        &self.definition
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn kind(&self) -> FilterKind {
        self.definition.kind
    }

    /// Number of entries (products with a value).
    pub fn len(&self) -> u64 {
        self.exists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exists.is_empty()
    }

    /// Products that carry a value for this key.
    pub fn exists(&self) -> &RoaringBitmap {
        &self.exists
    }

    pub fn value(&self, ordinal: u32) -> Option<&FilterValue> {
        self.by_ordinal.get(ordinal as usize)?.as_ref()
    }

    /// Entries in ordinal order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &FilterValue)> {
        self.exists
            .iter()
            .filter_map(move |ordinal| self.value(ordinal).map(|value| (ordinal, value)))
    }

    /// Number of distinct values held by the secondary structure.
    pub fn distinct_values(&self) -> usize {
        match &self.postings {
            Postings::Boolean { yes, no } => {
                usize::from(!yes.is_empty()) + usize::from(!no.is_empty())
            }
            Postings::Categorical { terms } => terms.len(),
            Postings::Numeric { values } => values.len(),
        }
    }

    /// Path a group-by summary takes for `candidates`.
    ///
    /// Reading candidates costs one lookup per candidate; walking postings
    /// costs one bitmap intersection per distinct value. Booleans have at
    /// most two posting lists and always walk them.
    pub fn scan_strategy(&self, candidates: &RoaringBitmap) -> ScanStrategy {
        match self.postings {
            Postings::Boolean { .. } => ScanStrategy::Postings,
            _ if candidates.len() < self.distinct_values() as u64 => ScanStrategy::Candidates,
            _ => ScanStrategy::Postings,
        }
    }

    fn number_at(&self, ordinal: u32) -> Option<f64> {
        match self.value(ordinal)? {
            FilterValue::Numeric(number) => Some(*number),
            _ => None,
        }
    }

    /// Products whose boolean value equals `value`. Empty for other kinds.
    pub fn find_bool(&self, value: bool) -> RoaringBitmap {
        match &self.postings {
            Postings::Boolean { yes, no } => {
                if value {
                    yes.clone()
                } else {
                    no.clone()
                }
            }
            _ => RoaringBitmap::new(),
        }
    }

    /// Products whose categorical value is any of `terms`. Empty for other kinds.
    pub fn find_terms<S: AsRef<str>>(&self, terms: &[S]) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        if let Postings::Categorical { terms: index } = &self.postings {
            for term in terms {
                if let Some(ids) = index.get(term.as_ref()) {
                    bitmap |= ids;
                }
            }
        }
        bitmap
    }

    /// Products whose numeric value lies within the inclusive bounds.
    ///
    /// A missing bound is unconstrained on that side; with both missing every
    /// product carrying a value matches. Callers normalise `lower > upper`
    /// before calling; an inverted range yields no products here.
    pub fn find_range(&self, lower: Option<f64>, upper: Option<f64>) -> RoaringBitmap {
        let Postings::Numeric { values } = &self.postings else {
            return RoaringBitmap::new();
        };

        if lower.is_none() && upper.is_none() {
            return self.exists.clone();
        }
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return RoaringBitmap::new();
            }
        }

        let lower_bound = lower.map_or(Bound::Unbounded, |v| Bound::Included(OrderedFloat(v)));
        let upper_bound = upper.map_or(Bound::Unbounded, |v| Bound::Included(OrderedFloat(v)));

        let mut bitmap = RoaringBitmap::new();
        for (_value, ids) in values.range((lower_bound, upper_bound)) {
            bitmap |= ids;
        }
        bitmap
    }

    /// `(true count, false count)` among `candidates`.
    pub fn bool_counts(&self, candidates: &RoaringBitmap) -> (u64, u64) {
        match &self.postings {
            Postings::Boolean { yes, no } => (
                yes.intersection_len(candidates),
                no.intersection_len(candidates),
            ),
            _ => (0, 0),
        }
    }

    /// Non-zero term counts among `candidates`, in term order.
    pub fn term_counts(&self, candidates: &RoaringBitmap) -> Vec<(&str, u64)> {
        let Postings::Categorical { terms } = &self.postings else {
            return Vec::new();
        };

        if self.scan_strategy(candidates) == ScanStrategy::Candidates {
            let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
            for ordinal in candidates {
                if let Some(FilterValue::Categorical(term)) = self.value(ordinal) {
                    *counts.entry(term.as_str()).or_default() += 1;
                }
            }
            return counts.into_iter().collect();
        }

        terms
            .iter()
            .filter_map(|(term, ids)| {
                let count = ids.intersection_len(candidates);
                (count > 0).then_some((term.as_str(), count))
            })
            .collect()
    }

    /// Observed `(min, max, count)` of numeric values among `candidates`.
    pub fn numeric_summary(&self, candidates: &RoaringBitmap) -> Option<(f64, f64, u64)> {
        let Postings::Numeric { values } = &self.postings else {
            return None;
        };

        if self.scan_strategy(candidates) == ScanStrategy::Candidates {
            return candidates
                .iter()
                .filter_map(|ordinal| self.number_at(ordinal))
                .fold(None, |summary, number| match summary {
                    None => Some((number, number, 1)),
                    Some((min, max, count)) => {
                        Some((min.min(number), max.max(number), count + 1))
                    }
                });
        }

        let count = self.exists.intersection_len(candidates);
        if count == 0 {
            return None;
        }

        let hit = |(value, ids): (&OrderedFloat<f64>, &RoaringBitmap)| {
            (!ids.is_disjoint(candidates)).then_some(value.0)
        };
        let min = values.iter().find_map(hit)?;
        let max = values.iter().rev().find_map(hit)?;
        Some((min, max, count))
    }

    /// Counts among `candidates` for the buckets delimited by `boundaries`.
    ///
    /// Bucket `i` covers `[boundaries[i], boundaries[i + 1])`; the last bucket
    /// also includes its upper boundary. Boundaries are sorted and
    /// de-duplicated first; empty buckets are omitted.
    pub fn bucket_counts(
        &self,
        candidates: &RoaringBitmap,
        boundaries: &[f64],
    ) -> Vec<(f64, f64, u64)> {
        let Postings::Numeric { values } = &self.postings else {
            return Vec::new();
        };

        let mut edges: Vec<f64> = boundaries.iter().copied().filter(|b| b.is_finite()).collect();
        edges.sort_by(f64::total_cmp);
        edges.dedup();
        if edges.len() < 2 {
            return Vec::new();
        }
        let last = edges.len() - 2;

        let counts: Vec<u64> = match self.scan_strategy(candidates) {
            ScanStrategy::Candidates => {
                let mut counts = vec![0; last + 1];
                for number in candidates.iter().filter_map(|ordinal| self.number_at(ordinal)) {
                    if let Some(bucket) = bucket_of(&edges, number) {
                        counts[bucket] += 1;
                    }
                }
                counts
            }
            ScanStrategy::Postings => edges
                .windows(2)
                .enumerate()
                .map(|(i, window)| {
                    let upper = if i == last {
                        Bound::Included(OrderedFloat(window[1]))
                    } else {
                        Bound::Excluded(OrderedFloat(window[1]))
                    };
                    values
                        .range((Bound::Included(OrderedFloat(window[0])), upper))
                        .map(|(_, ids)| ids.intersection_len(candidates))
                        .sum()
                })
                .collect(),
        };

        edges
            .windows(2)
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(window, count)| (window[0], window[1], count))
            .collect()
    }
}

/// Index of the bucket holding `number` for sorted, de-duplicated `edges`.
/// The last bucket is closed on both ends.
fn bucket_of(edges: &[f64], number: f64) -> Option<usize> {
    let above = edges.partition_point(|edge| *edge <= number);
    if above == 0 {
        return None;
    }
    let buckets = edges.len() - 1;
    if above <= buckets {
        Some(above - 1)
    } else if number == edges[buckets] {
        Some(buckets - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> FieldIndex {
        let mut index = FieldIndex::new(FilterDefinition::new(
            "power",
            "Power",
            FilterKind::NumericRange,
            "power",
        ));
        for (ordinal, value) in [(0, 5.0), (1, 12.5), (2, 20.0), (3, 40.0)] {
            assert!(index.insert(ordinal, FilterValue::Numeric(value)));
        }
        index
    }

    #[test]
    fn range_bounds_are_inclusive_and_optional() {
        let index = numeric();
        assert_eq!(index.find_range(Some(10.0), Some(20.0)).iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(index.find_range(Some(13.0), Some(20.0)).iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(index.find_range(None, Some(12.5)).len(), 2);
        assert_eq!(index.find_range(Some(20.0), None).len(), 2);
        assert_eq!(index.find_range(None, None).len(), 4);
        assert!(index.find_range(Some(30.0), Some(10.0)).is_empty());
    }

    #[test]
    fn refuses_mismatched_kinds_and_duplicates() {
        let mut index = numeric();
        assert!(!index.insert(4, FilterValue::Boolean(true)));
        assert!(!index.insert(0, FilterValue::Numeric(99.0)));
        assert_eq!(index.len(), 4);
        assert_eq!(index.value(0), Some(&FilterValue::Numeric(5.0)));
    }

    #[test]
    fn summaries_follow_candidates() {
        let index = numeric();
        let candidates: RoaringBitmap = [1, 2].into_iter().collect();
        assert_eq!(index.numeric_summary(&candidates), Some((12.5, 20.0, 2)));
        assert_eq!(index.numeric_summary(&RoaringBitmap::new()), None);

        let all: RoaringBitmap = (0..4).collect();
        let buckets = index.bucket_counts(&all, &[0.0, 10.0, 20.0, 20.0, 30.0]);
        assert_eq!(buckets, vec![(0.0, 10.0, 1), (10.0, 20.0, 1), (20.0, 30.0, 1)]);
    }

    fn wide() -> FieldIndex {
        let mut index = FieldIndex::new(FilterDefinition::new(
            "flux",
            "Flux",
            FilterKind::NumericRange,
            "FLUX",
        ));
        for ordinal in 0..100u32 {
            assert!(index.insert(ordinal, FilterValue::Numeric(f64::from(ordinal))));
        }
        index
    }

    #[test]
    fn narrow_candidates_read_values_directly() {
        let index = wide();
        let narrow: RoaringBitmap = [3, 17, 42, 250].into_iter().collect();
        assert_eq!(index.scan_strategy(&narrow), ScanStrategy::Candidates);
        assert_eq!(index.numeric_summary(&narrow), Some((3.0, 42.0, 3)));
        assert_eq!(
            index.bucket_counts(&narrow, &[0.0, 10.0, 42.0]),
            vec![(0.0, 10.0, 1), (10.0, 42.0, 2)]
        );
        assert_eq!(index.numeric_summary(&[250].into_iter().collect()), None);
    }

    #[test]
    fn both_scan_paths_agree() {
        let index = wide();
        let below: RoaringBitmap = (0..99).collect();
        let all: RoaringBitmap = (0..100).collect();
        assert_eq!(index.scan_strategy(&below), ScanStrategy::Candidates);
        assert_eq!(index.scan_strategy(&all), ScanStrategy::Postings);

        assert_eq!(index.numeric_summary(&below), Some((0.0, 98.0, 99)));
        assert_eq!(index.numeric_summary(&all), Some((0.0, 99.0, 100)));

        let edges = [0.0, 50.0, 99.0];
        assert_eq!(
            index.bucket_counts(&below, &edges),
            vec![(0.0, 50.0, 50), (50.0, 99.0, 49)]
        );
        assert_eq!(
            index.bucket_counts(&all, &edges),
            vec![(0.0, 50.0, 50), (50.0, 99.0, 50)]
        );
    }

    #[test]
    fn narrow_term_counts_keep_term_order() {
        let mut ip = FieldIndex::new(FilterDefinition::new(
            "ip",
            "IP",
            FilterKind::Categorical,
            "IP_RATING",
        ));
        for ordinal in 0..20u32 {
            ip.insert(ordinal, FilterValue::Categorical(format!("IP{:02}", 20 + ordinal)));
        }
        ip.insert(20, FilterValue::Categorical("IP21".into()));

        let candidates: RoaringBitmap = [20, 5, 1].into_iter().collect();
        assert_eq!(ip.scan_strategy(&candidates), ScanStrategy::Candidates);
        assert_eq!(ip.term_counts(&candidates), vec![("IP21", 2), ("IP25", 1)]);

        let all: RoaringBitmap = (0..21).collect();
        assert_eq!(ip.scan_strategy(&all), ScanStrategy::Postings);
        assert_eq!(ip.term_counts(&all).len(), 20);
    }

    #[test]
    fn boolean_and_term_counts() {
        let mut flags = FieldIndex::new(FilterDefinition::new(
            "dimmable",
            "Dimmable",
            FilterKind::Boolean,
            "DIMMABLE",
        ));
        flags.insert(0, FilterValue::Boolean(true));
        flags.insert(1, FilterValue::Boolean(false));
        flags.insert(2, FilterValue::Boolean(true));
        let candidates: RoaringBitmap = [0, 1].into_iter().collect();
        assert_eq!(flags.bool_counts(&candidates), (1, 1));
        assert_eq!(flags.find_bool(true).len(), 2);

        let mut ip = FieldIndex::new(FilterDefinition::new(
            "ip",
            "IP",
            FilterKind::Categorical,
            "IP_RATING",
        ));
        ip.insert(0, FilterValue::Categorical("IP20".into()));
        ip.insert(1, FilterValue::Categorical("IP65".into()));
        ip.insert(2, FilterValue::Categorical("IP65".into()));
        let candidates: RoaringBitmap = [1, 2].into_iter().collect();
        assert_eq!(ip.term_counts(&candidates), vec![("IP65", 2)]);
        assert_eq!(ip.find_terms(&["IP20", "IP65"]).len(), 3);
    }
}
