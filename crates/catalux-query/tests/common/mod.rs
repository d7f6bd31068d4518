#![allow(dead_code)]

use std::sync::Arc;

use catalux_core::{
    ClassificationRule, ConfigSnapshot, FilterDefinition, FilterKind, Product, RawAttribute,
    RuleCondition, TaxonomyNode,
};
use catalux_index::{rebuild, RebuildOptions};
use catalux_query::QueryExecutor;

pub fn config() -> Arc<ConfigSnapshot> {
    let taxonomy = vec![
        TaxonomyNode::root("LUM", "Luminaires"),
        TaxonomyNode::child("LUM-CEIL", "LUM", 1, "Ceiling"),
        TaxonomyNode::child("LUM-CEIL-PANEL", "LUM-CEIL", 2, "Panels"),
        TaxonomyNode::child("LUM-SPOT", "LUM", 1, "Spots"),
        TaxonomyNode::root("ACC", "Accessories"),
    ];
    let rules = vec![
        ClassificationRule::new("panels", 10)
            .with_target("LUM-CEIL-PANEL")
            .with_condition(RuleCondition::in_classes(["PANEL"])),
        ClassificationRule::new("ceiling", 30)
            .with_target("LUM-CEIL")
            .with_condition(RuleCondition::in_classes(["X"]))
            .with_condition(RuleCondition::attribute_is("ceiling_mount", true)),
        ClassificationRule::new("spots", 20)
            .with_target("LUM-SPOT")
            .with_condition(RuleCondition::in_classes(["SPOT"])),
        ClassificationRule::new("accessories", 40)
            .with_target("ACC")
            .with_condition(RuleCondition::in_groups(["ACCESSORY"])),
        ClassificationRule::new("emergency", 50)
            .with_flag("emergency")
            .with_condition(RuleCondition::attribute_is("EMERGENCY", true)),
    ];
    let filters = vec![
        FilterDefinition::new("ip", "IP rating", FilterKind::Categorical, "IP_RATING"),
        FilterDefinition::new("power", "Power", FilterKind::NumericRange, "power")
            .with_buckets(vec![0.0, 10.0, 20.0, 50.0]),
        FilterDefinition::new("dimmable", "Dimmable", FilterKind::Boolean, "DIMMABLE"),
        FilterDefinition::new("beam", "Beam angle", FilterKind::NumericRange, "BEAM")
            .applicable_to(["LUM-SPOT"]),
        FilterDefinition::new("legacy", "Legacy", FilterKind::Boolean, "LEGACY").inactive(),
    ];
    Arc::new(ConfigSnapshot::new(taxonomy, rules, filters).unwrap())
}

pub fn catalog() -> Vec<Product> {
    vec![
        Product::new("P1", "LED panel 600")
            .with_class("X")
            .with_supplier("ACME")
            .with_price(89.0)
            .with_attribute("ceiling_mount", RawAttribute::logical(true))
            .with_attribute("power", RawAttribute::scalar(36.0))
            .with_attribute("DIMMABLE", RawAttribute::logical(true))
            .with_attribute("EMERGENCY", RawAttribute::logical(true)),
        Product::new("P2", "Panel IP65")
            .with_class("PANEL")
            .with_supplier("BRIGHT")
            .with_price(120.0)
            .with_attribute("IP_RATING", RawAttribute::code("IP65"))
            .with_attribute("power", RawAttribute::range(Some(18.0), Some(24.0)))
            .with_attribute("DIMMABLE", RawAttribute::code("no")),
        Product::new("P3", "Mini spot")
            .with_class("SPOT")
            .with_supplier("ACME")
            .with_price(19.5)
            .with_description("Compact LED spot for panel ceilings")
            .with_attribute("IP_RATING", RawAttribute::code("IP20"))
            .with_attribute("power", RawAttribute::scalar(12.5))
            .with_attribute("BEAM", RawAttribute::scalar(36.0))
            .with_attribute("DIMMABLE", RawAttribute::logical(true)),
        Product::new("P4", "Mounting bracket")
            .with_group("ACCESSORY")
            .with_attribute("IP_RATING", RawAttribute::code("IP20")),
        Product::new("P5", "Unsorted lamp")
            .with_attribute("power", RawAttribute::scalar(5.0)),
    ]
}

pub fn executor() -> QueryExecutor {
    let snapshot = rebuild(config(), catalog(), &RebuildOptions::new(1)).unwrap();
    QueryExecutor::new(Arc::new(snapshot))
}

pub fn ids(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.id.as_str()).collect()
}
