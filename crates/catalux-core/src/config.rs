//! Immutable configuration snapshot for classification and indexing.
//!
//! Taxonomy nodes, classification rules and filter definitions are edited by
//! operators outside of code. A rebuild loads them once into a
//! [`ConfigSnapshot`], validates the structural invariants, and passes the
//! snapshot explicitly to the classifier, the index builder and the facet
//! engine. Edits take effect only at the next rebuild.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::filter::FilterDefinition;
use crate::ids::TaxonomyCode;
use crate::rule::ClassificationRule;
use crate::taxonomy::TaxonomyNode;

/// Serialized form of the operator configuration (one TOML or JSON document).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub taxonomy: Vec<TaxonomyNode>,
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

/// Validated, read-only view of the operator configuration.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    taxonomy: Vec<TaxonomyNode>,
    rules: Vec<ClassificationRule>,
    filters: Vec<FilterDefinition>,
    node_index: HashMap<TaxonomyCode, usize>,
    /// code → [code, parent, grandparent, ...]
    lineage: HashMap<TaxonomyCode, Vec<TaxonomyCode>>,
    children: BTreeMap<TaxonomyCode, Vec<TaxonomyCode>>,
}

impl ConfigSnapshot {
    /// Validates the configuration and builds the lookup tables.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when taxonomy codes, rule names or filter keys
    /// are duplicated, when a parent code does not exist, or when the
    /// taxonomy contains a cycle.
    pub fn new(
        mut taxonomy: Vec<TaxonomyNode>,
        rules: Vec<ClassificationRule>,
        filters: Vec<FilterDefinition>,
    ) -> CoreResult<Self> {
        taxonomy.sort_by(|a, b| a.code.cmp(&b.code));

        let mut node_index = HashMap::with_capacity(taxonomy.len());
        for (position, node) in taxonomy.iter().enumerate() {
            if node_index.insert(node.code.clone(), position).is_some() {
                return Err(CoreError::validation(format!(
                    "duplicate taxonomy code `{}`",
                    node.code
                )));
            }
        }

        let mut children: BTreeMap<TaxonomyCode, Vec<TaxonomyCode>> = BTreeMap::new();
        for node in &taxonomy {
            if let Some(parent) = &node.parent {
                if !node_index.contains_key(parent) {
                    return Err(CoreError::validation(format!(
                        "taxonomy node `{}` references unknown parent `{}`",
                        node.code, parent
                    )));
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.code.clone());
            }
        }

        let mut lineage = HashMap::with_capacity(taxonomy.len());
        for node in &taxonomy {
            let chain = Self::walk_lineage(&taxonomy, &node_index, node)?;
            let depth = (chain.len() - 1) as u32;
            if depth != node.level {
                warn!(
                    code = %node.code,
                    declared = node.level,
                    actual = depth,
                    "taxonomy level does not match tree depth"
                );
            }
            lineage.insert(node.code.clone(), chain);
        }

        let mut rule_names = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(CoreError::validation(format!(
                    "duplicate rule name `{}`",
                    rule.name
                )));
            }
        }

        let mut filter_keys = HashSet::with_capacity(filters.len());
        for filter in &filters {
            if !filter_keys.insert(filter.key.as_str()) {
                return Err(CoreError::validation(format!(
                    "duplicate filter key `{}`",
                    filter.key
                )));
            }
            if let Some(codes) = &filter.applicable_taxonomy {
                for code in codes.iter().filter(|c| !node_index.contains_key(*c)) {
                    warn!(filter = %filter.key, code = %code, "filter applies to unknown taxonomy code");
                }
            }
        }

        Ok(Self {
            taxonomy,
            rules,
            filters,
            node_index,
            lineage,
            children,
        })
    }

    /// Builds a snapshot from its serialized document form.
    pub fn from_document(document: ConfigDocument) -> CoreResult<Self> {
        Self::new(document.taxonomy, document.rules, document.filters)
    }

    fn walk_lineage(
        taxonomy: &[TaxonomyNode],
        node_index: &HashMap<TaxonomyCode, usize>,
        start: &TaxonomyNode,
    ) -> CoreResult<Vec<TaxonomyCode>> {
        let mut chain = vec![start.code.clone()];
        let mut seen = HashSet::new();
        seen.insert(&start.code);

        let mut current = start;
        while let Some(parent) = &current.parent {
            if !seen.insert(parent) {
                return Err(CoreError::validation(format!(
                    "taxonomy cycle detected at `{}`",
                    parent
                )));
            }
            chain.push(parent.clone());
            current = &taxonomy[node_index[parent]];
        }

        Ok(chain)
    }

    /// All taxonomy nodes ordered by code.
    pub fn taxonomy(&self) -> &[TaxonomyNode] {
        &self.taxonomy
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn filters(&self) -> &[FilterDefinition] {
        &self.filters
    }

    pub fn node(&self, code: &str) -> Option<&TaxonomyNode> {
        self.node_index.get(code).map(|&i| &self.taxonomy[i])
    }

    /// True when the code exists and the node is active.
    pub fn is_active_node(&self, code: &str) -> bool {
        self.node(code).is_some_and(|node| node.active)
    }

    /// Direct children of `code`, ordered by code.
    pub fn children(&self, code: &str) -> &[TaxonomyCode] {
        self.children.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Root nodes ordered by code.
    pub fn roots(&self) -> impl Iterator<Item = &TaxonomyNode> {
        self.taxonomy.iter().filter(|node| node.parent.is_none())
    }

    /// `code` followed by its ancestors up to the root. Empty for unknown codes.
    pub fn lineage(&self, code: &str) -> &[TaxonomyCode] {
        self.lineage.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_descendant_or_self(&self, code: &str, ancestor: &str) -> bool {
        self.lineage(code).iter().any(|c| c.as_str() == ancestor)
    }

    /// `code` and all of its descendants. Empty for unknown codes.
    pub fn subtree(&self, code: &str) -> Vec<TaxonomyCode> {
        let Some(node) = self.node(code) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut stack = vec![node.code.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(current.as_str()).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Whether two codes lie on a common root path.
    pub fn on_same_path(&self, a: &str, b: &str) -> bool {
        self.is_descendant_or_self(a, b) || self.is_descendant_or_self(b, a)
    }

    pub fn filter(&self, key: &str) -> Option<&FilterDefinition> {
        self.filters.iter().find(|filter| filter.key == key)
    }

    /// Active filter definitions in display order.
    pub fn active_filters(&self) -> Vec<&FilterDefinition> {
        let mut active: Vec<_> = self.filters.iter().filter(|f| f.active).collect();
        active.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.key.cmp(&b.key)));
        active
    }

    /// Active rules in evaluation order: priority ascending, then name.
    pub fn active_rules_by_priority(&self) -> Vec<&ClassificationRule> {
        let mut active: Vec<_> = self.rules.iter().filter(|r| r.active).collect();
        active.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        active
    }

    /// Distinct flag names declared by active rules.
    pub fn declared_flags(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .filter(|r| r.active)
            .filter_map(|r| r.flag.as_deref())
            .collect()
    }
}
