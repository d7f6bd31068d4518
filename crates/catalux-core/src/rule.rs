//! Classification rule definitions.
//!
//! A rule is a pure predicate over one product: all of its conditions must
//! hold for the rule to match. Matching rules contribute a taxonomy code, a
//! flag, or both; they never remove anything a previous rule contributed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::TaxonomyCode;
use crate::product::Product;
use crate::taxonomy::default_true;

/// Operator-editable classification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Unique rule name, used in reports.
    pub name: String,
    /// Taxonomy code assigned on match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TaxonomyCode>,
    /// Flag set to `true` on match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Conjunction of conditions.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Evaluation order, lower first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    /// When this rule matches, later rules are not evaluated for the product.
    #[serde(default)]
    pub stop_processing: bool,
}

impl ClassificationRule {
    /// Creates an active, additive rule without conditions.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            target: None,
            flag: None,
            conditions: Vec::new(),
            priority,
            active: true,
            stop_processing: false,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<TaxonomyCode>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn stopping(mut self) -> Self {
        self.stop_processing = true;
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Single predicate evaluated against a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Product class or group is a member of the given sets.
    ClassMembership {
        #[serde(default)]
        classes: BTreeSet<String>,
        #[serde(default)]
        groups: BTreeSet<String>,
    },
    /// Logical attribute equals the given value.
    AttributeBool { attribute: String, equals: bool },
    /// Numeric attribute compared against a threshold.
    AttributeNumber {
        attribute: String,
        op: CompareOp,
        value: f64,
    },
    /// Categorical attribute code is one of the given codes.
    AttributeCode {
        attribute: String,
        any_of: BTreeSet<String>,
    },
    /// Regular expression over descriptive fields.
    TextPattern {
        pattern: String,
        #[serde(default = "default_text_fields")]
        fields: Vec<TextField>,
    },
}

impl RuleCondition {
    #[must_use]
    pub fn in_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ClassMembership {
            classes: classes.into_iter().map(Into::into).collect(),
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn in_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ClassMembership {
            classes: BTreeSet::new(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn attribute_is(attribute: impl Into<String>, equals: bool) -> Self {
        Self::AttributeBool {
            attribute: attribute.into(),
            equals,
        }
    }

    #[must_use]
    pub fn attribute_cmp(attribute: impl Into<String>, op: CompareOp, value: f64) -> Self {
        Self::AttributeNumber {
            attribute: attribute.into(),
            op,
            value,
        }
    }

    #[must_use]
    pub fn text(pattern: impl Into<String>) -> Self {
        Self::TextPattern {
            pattern: pattern.into(),
            fields: default_text_fields(),
        }
    }
}

/// Comparison operator for numeric conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Applies `lhs <op> rhs`.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
        }
    }
}

/// Descriptive product field a text pattern can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Id,
    Name,
    Description,
}

impl TextField {
    pub fn extract(self, product: &Product) -> Option<&str> {
        match self {
            Self::Id => Some(product.id.as_str()),
            Self::Name => Some(product.name.as_str()),
            Self::Description => product.description.as_deref(),
        }
    }
}

fn default_text_fields() -> Vec<TextField> {
    vec![TextField::Name, TextField::Description]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_ops() {
        assert!(CompareOp::Gte.apply(10.0, 10.0));
        assert!(!CompareOp::Gt.apply(10.0, 10.0));
        assert!(CompareOp::Ne.apply(1.0, 2.0));
        assert!(CompareOp::Lte.apply(-1.0, 0.0));
    }

    #[test]
    fn conditions_parse_from_toml() {
        let rule: ClassificationRule = toml::from_str(
            r#"
            name = "ceiling"
            target = "LUM-CEIL"
            priority = 30

            [[conditions]]
            kind = "class_membership"
            classes = ["X"]

            [[conditions]]
            kind = "attribute_bool"
            attribute = "ceiling_mount"
            equals = true
            "#,
        )
        .unwrap();

        assert!(rule.active);
        assert!(!rule.stop_processing);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[0], RuleCondition::in_classes(["X"]));
    }

    #[test]
    fn text_pattern_defaults_to_name_and_description() {
        let cond: RuleCondition =
            toml::from_str("kind = \"text_pattern\"\npattern = \"(?i)downlight\"").unwrap();
        match cond {
            RuleCondition::TextPattern { fields, .. } => {
                assert_eq!(fields, vec![TextField::Name, TextField::Description]);
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }
}
