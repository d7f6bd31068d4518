//! Taxonomy navigation and monitoring views over a snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use catalux_core::{FilterValue, Product, TaxonomyCode};
use catalux_index::{IndexSnapshot, TaxonomyAssignment};

/// One navigable taxonomy node with its subtree product count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTreeNode {
    pub code: TaxonomyCode,
    pub parent: Option<TaxonomyCode>,
    pub level: u32,
    pub name: String,
    pub product_count: u64,
}

/// Active taxonomy nodes in depth-first order, roots and siblings by code.
///
/// Inactive nodes are omitted but their active descendants are still listed.
pub fn taxonomy_tree(snapshot: &IndexSnapshot) -> Vec<TaxonomyTreeNode> {
    let config = snapshot.config();
    let mut out = Vec::with_capacity(config.taxonomy().len());

    for root in config.roots() {
        for code in config.subtree(root.code.as_str()) {
            let Some(node) = config.node(code.as_str()) else {
                continue;
            };
            if !node.active {
                continue;
            }
            out.push(TaxonomyTreeNode {
                code: node.code.clone(),
                parent: node.parent.clone(),
                level: node.level,
                name: node.name.clone(),
                product_count: snapshot
                    .taxonomy_scope(code.as_str())
                    .map_or(0, |scope| scope.len()),
            });
        }
    }
    out
}

/// Named counter for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub name: String,
    pub value: u64,
}

impl Statistic {
    fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Aggregate counters of a snapshot, in a stable order.
pub fn statistics(snapshot: &IndexSnapshot) -> Vec<Statistic> {
    let config = snapshot.config();
    let report = snapshot.report();
    let unclassified = snapshot.unclassified().len();

    let mut stats = vec![
        Statistic::new("generation", snapshot.generation()),
        Statistic::new("total_products", snapshot.len() as u64),
        Statistic::new(
            "classified_products",
            (snapshot.len() as u64).saturating_sub(unclassified),
        ),
        Statistic::new("unclassified_products", unclassified),
        Statistic::new("taxonomy_nodes", config.taxonomy().len() as u64),
        Statistic::new(
            "active_taxonomy_nodes",
            config.taxonomy().iter().filter(|node| node.active).count() as u64,
        ),
        Statistic::new("classification_rules", config.rules().len() as u64),
        Statistic::new("skipped_rules", report.skipped_rules.len() as u64),
        Statistic::new("filter_definitions", config.filters().len() as u64),
        Statistic::new("suppliers", snapshot.suppliers().len() as u64),
        Statistic::new("filter_index_entries", snapshot.filter_entry_count()),
    ];

    for (key, field) in snapshot.fields() {
        stats.push(Statistic::new(format!("filter_index_entries.{key}"), field.len()));
    }
    for (name, members) in snapshot.flags() {
        stats.push(Statistic::new(format!("flag.{name}"), members.len()));
    }

    stats.push(Statistic::new("duplicate_products", report.duplicate_products.len() as u64));
    stats.push(Statistic::new("rebuild_duration_ms", report.duration_ms));
    stats
}

/// A product together with everything the index derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product: Product,
    pub assignment: TaxonomyAssignment,
    pub filters: BTreeMap<String, FilterValue>,
}

pub fn product_detail(snapshot: &IndexSnapshot, id: &str) -> Option<ProductDetail> {
    let ordinal = snapshot.ordinal(id)?;
    let product = snapshot.product(ordinal)?.clone();
    let assignment = snapshot.assignment(ordinal)?.clone();
    let filters = snapshot
        .fields()
        .iter()
        .filter_map(|(key, field)| field.value(ordinal).map(|v| (key.clone(), v.clone())))
        .collect();

    Some(ProductDetail {
        product,
        assignment,
        filters,
    })
}
