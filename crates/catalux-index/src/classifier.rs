//! Rule-based taxonomy classifier.
//!
//! Rules are compiled once per rebuild from the configuration snapshot and
//! then evaluated independently per product, so classification can run on
//! any number of worker threads without shared mutable state.
//!
//! Evaluation is additive: every matching rule contributes its taxonomy code
//! and/or flag, and nothing a previous rule contributed is ever removed. The
//! only exception is a rule marked `stop_processing`, whose match ends
//! evaluation for that product.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use catalux_core::{
    ClassificationRule, CompareOp, ConfigSnapshot, Product, RuleCondition, TaxonomyCode,
    TextField,
};

/// Per-product classification result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyAssignment {
    /// Taxonomy codes the product belongs to.
    pub codes: BTreeSet<TaxonomyCode>,
    /// Every flag declared by a valid rule, `true` when at least one
    /// matching rule set it.
    pub flags: BTreeMap<String, bool>,
}

impl TaxonomyAssignment {
    /// Products without any taxonomy code are invisible to navigation.
    pub fn is_unclassified(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// Rule that could not be compiled and was left out of the rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule: String,
    pub reason: String,
}

/// Compiled, priority-ordered rule set.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
    flags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    target: Option<TaxonomyCode>,
    flag: Option<String>,
    conditions: Vec<Condition>,
    stop_processing: bool,
}

#[derive(Debug, Clone)]
enum Condition {
    Membership {
        classes: BTreeSet<String>,
        groups: BTreeSet<String>,
    },
    Logical {
        attribute: String,
        equals: bool,
    },
    Number {
        attribute: String,
        op: CompareOp,
        value: f64,
    },
    Code {
        attribute: String,
        any_of: BTreeSet<String>,
    },
    Pattern {
        regex: Regex,
        fields: Vec<TextField>,
    },
}

impl Classifier {
    /// Compiles the active rules of `config` in evaluation order.
    ///
    /// Malformed rules are skipped and returned alongside the classifier; they
    /// never abort the rebuild.
    pub fn prepare(config: &ConfigSnapshot) -> (Self, Vec<SkippedRule>) {
        let mut rules = Vec::new();
        let mut skipped = Vec::new();
        let mut flags = BTreeSet::new();

        for rule in config.active_rules_by_priority() {
            match compile_rule(config, rule) {
                Ok(compiled) => {
                    if let Some(flag) = &compiled.flag {
                        flags.insert(flag.clone());
                    }
                    rules.push(compiled);
                }
                Err(reason) => {
                    warn!(rule = %rule.name, %reason, "skipping malformed classification rule");
                    skipped.push(SkippedRule {
                        rule: rule.name.clone(),
                        reason,
                    });
                }
            }
        }

        (Self { rules, flags }, skipped)
    }

    /// Number of rules that will be evaluated.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Flags declared by the compiled rules.
    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Evaluates every rule against one product.
    pub fn classify(&self, product: &Product) -> TaxonomyAssignment {
        let mut assignment = TaxonomyAssignment {
            codes: BTreeSet::new(),
            flags: self.flags.iter().map(|f| (f.clone(), false)).collect(),
        };

        for rule in &self.rules {
            if !rule.conditions.iter().all(|c| c.matches(product)) {
                continue;
            }
            if let Some(code) = &rule.target {
                assignment.codes.insert(code.clone());
            }
            if let Some(flag) = &rule.flag {
                assignment.flags.insert(flag.clone(), true);
            }
            if rule.stop_processing {
                break;
            }
        }

        assignment
    }
}

fn compile_rule(config: &ConfigSnapshot, rule: &ClassificationRule) -> Result<CompiledRule, String> {
    if rule.target.is_none() && rule.flag.is_none() {
        return Err("rule sets neither a taxonomy code nor a flag".to_string());
    }

    if let Some(target) = &rule.target {
        match config.node(target.as_str()) {
            None => return Err(format!("unknown taxonomy code `{target}`")),
            Some(node) if !node.active => {
                return Err(format!("taxonomy code `{target}` is inactive"))
            }
            Some(_) => {}
        }
    }

    let flag = match rule.flag.as_deref().map(str::trim) {
        Some("") => return Err("empty flag name".to_string()),
        other => other.map(str::to_string),
    };

    if rule.conditions.is_empty() {
        return Err("rule has no conditions".to_string());
    }

    let conditions = rule
        .conditions
        .iter()
        .map(compile_condition)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        target: rule.target.clone(),
        flag,
        conditions,
        stop_processing: rule.stop_processing,
    })
}

fn compile_condition(condition: &RuleCondition) -> Result<Condition, String> {
    match condition {
        RuleCondition::ClassMembership { classes, groups } => {
            if classes.is_empty() && groups.is_empty() {
                return Err("class membership lists no classes or groups".to_string());
            }
            Ok(Condition::Membership {
                classes: classes.clone(),
                groups: groups.clone(),
            })
        }
        RuleCondition::AttributeBool { attribute, equals } => Ok(Condition::Logical {
            attribute: attribute.clone(),
            equals: *equals,
        }),
        RuleCondition::AttributeNumber {
            attribute,
            op,
            value,
        } => {
            if !value.is_finite() {
                return Err(format!("threshold for `{attribute}` is not finite"));
            }
            Ok(Condition::Number {
                attribute: attribute.clone(),
                op: *op,
                value: *value,
            })
        }
        RuleCondition::AttributeCode { attribute, any_of } => {
            if any_of.is_empty() {
                return Err(format!("code condition on `{attribute}` lists no codes"));
            }
            Ok(Condition::Code {
                attribute: attribute.clone(),
                any_of: any_of.clone(),
            })
        }
        RuleCondition::TextPattern { pattern, fields } => {
            if fields.is_empty() {
                return Err("text pattern targets no fields".to_string());
            }
            let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;
            Ok(Condition::Pattern {
                regex,
                fields: fields.clone(),
            })
        }
    }
}

impl Condition {
    fn matches(&self, product: &Product) -> bool {
        match self {
            Self::Membership { classes, groups } => {
                product
                    .class_code
                    .as_deref()
                    .is_some_and(|class| classes.contains(class))
                    || product
                        .group_code
                        .as_deref()
                        .is_some_and(|group| groups.contains(group))
            }
            Self::Logical { attribute, equals } => product
                .attribute(attribute)
                .and_then(|raw| raw.as_logical())
                .is_some_and(|value| value == *equals),
            Self::Number {
                attribute,
                op,
                value,
            } => product
                .attribute(attribute)
                .and_then(|raw| raw.as_number())
                .is_some_and(|actual| op.apply(actual, *value)),
            Self::Code { attribute, any_of } => product
                .attribute(attribute)
                .and_then(|raw| raw.as_code())
                .is_some_and(|code| any_of.contains(code)),
            Self::Pattern { regex, fields } => fields
                .iter()
                .filter_map(|field| field.extract(product))
                .any(|text| regex.is_match(text)),
        }
    }
}
