use serde::{Deserialize, Serialize};

use crate::ids::TaxonomyCode;

/// Node of the human-facing category hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    /// Unique node code.
    pub code: TaxonomyCode,
    /// Parent node code; `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaxonomyCode>,
    /// Depth level as maintained by the operator (roots are level 0).
    #[serde(default)]
    pub level: u32,
    /// Display name.
    pub name: String,
    /// Inactive nodes stay in the tree structurally but are hidden from
    /// navigation and cannot be targeted by rules.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TaxonomyNode {
    /// Creates an active root node.
    #[must_use]
    pub fn root(code: impl Into<TaxonomyCode>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            parent: None,
            level: 0,
            name: name.into(),
            active: true,
        }
    }

    /// Creates an active child node.
    #[must_use]
    pub fn child(
        code: impl Into<TaxonomyCode>,
        parent: impl Into<TaxonomyCode>,
        level: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            parent: Some(parent.into()),
            level,
            name: name.into(),
            active: true,
        }
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

pub(crate) fn default_true() -> bool {
    true
}
