// Property-based tests for index rebuilds
//
// Properties tested:
// 1. Idempotence: rebuilding the same inputs twice yields identical indexes
// 2. Input order independence: shuffling the catalog does not change results
// 3. Taxonomy validity: every assigned code exists and is active
// 4. Subtree scopes: a node's scope is the union of its subtree's direct members
// 5. Filter entries carry the kind of their filter definition

use std::collections::BTreeSet;
use std::sync::Arc;

use catalux_core::{
    ClassificationRule, CompareOp, ConfigSnapshot, FilterDefinition, FilterKind, Product,
    RawAttribute, RuleCondition, TaxonomyNode,
};
use catalux_index::{rebuild, IndexSnapshot, RebuildOptions};
use proptest::prelude::*;
use roaring::RoaringBitmap;

const CLASSES: [&str; 4] = ["PANEL", "SPOT", "WALL", "MISC"];

fn config() -> Arc<ConfigSnapshot> {
    let taxonomy = vec![
        TaxonomyNode::root("LUM", "Luminaires"),
        TaxonomyNode::child("LUM-CEIL", "LUM", 1, "Ceiling"),
        TaxonomyNode::child("LUM-CEIL-PANEL", "LUM-CEIL", 2, "Panels"),
        TaxonomyNode::child("LUM-SPOT", "LUM", 1, "Spots"),
        TaxonomyNode::child("LUM-WALL", "LUM", 1, "Wall"),
        TaxonomyNode::child("LUM-RETIRED", "LUM", 1, "Retired").inactive(),
    ];
    let rules = vec![
        ClassificationRule::new("panels", 10)
            .with_target("LUM-CEIL-PANEL")
            .with_condition(RuleCondition::in_classes(["PANEL"])),
        ClassificationRule::new("spots", 20)
            .with_target("LUM-SPOT")
            .with_condition(RuleCondition::in_classes(["SPOT"])),
        ClassificationRule::new("wall", 30)
            .with_target("LUM-WALL")
            .with_condition(RuleCondition::in_classes(["WALL"])),
        ClassificationRule::new("retired", 40)
            .with_target("LUM-RETIRED")
            .with_condition(RuleCondition::in_classes(["MISC"])),
        ClassificationRule::new("bright", 50)
            .with_target("LUM-CEIL")
            .with_condition(RuleCondition::attribute_cmp("POWER", CompareOp::Gte, 50.0)),
        ClassificationRule::new("dimmable", 60)
            .with_flag("dimmable")
            .with_condition(RuleCondition::attribute_is("DIMMABLE", true)),
    ];
    let filters = vec![
        FilterDefinition::new("power", "Power", FilterKind::NumericRange, "POWER"),
        FilterDefinition::new("ip", "IP rating", FilterKind::Categorical, "IP_RATING"),
        FilterDefinition::new("dimmable", "Dimmable", FilterKind::Boolean, "DIMMABLE"),
    ];
    Arc::new(ConfigSnapshot::new(taxonomy, rules, filters).unwrap())
}

fn arb_product() -> impl Strategy<Value = Product> {
    (
        0u32..40,
        prop::option::of(0usize..CLASSES.len()),
        prop::option::of(0.0f64..100.0),
        prop::option::of(prop::sample::select(vec!["IP20", "IP44", "IP65"])),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(id, class, power, ip, dimmable)| {
            let mut product = Product::new(format!("P{id:03}"), format!("Product {id}"));
            if let Some(class) = class {
                product = product.with_class(CLASSES[class]);
            }
            if let Some(power) = power {
                product = product.with_attribute("POWER", RawAttribute::scalar(power));
            }
            if let Some(ip) = ip {
                product = product.with_attribute("IP_RATING", RawAttribute::code(ip));
            }
            if let Some(dimmable) = dimmable {
                product = product.with_attribute("DIMMABLE", RawAttribute::logical(dimmable));
            }
            product
        })
}

fn fingerprint(snapshot: &IndexSnapshot) -> Vec<String> {
    let mut lines: Vec<String> = snapshot
        .products()
        .iter()
        .zip(snapshot.assignments())
        .map(|(product, assignment)| format!("{} {:?}", product.id, assignment))
        .collect();
    lines.extend(
        snapshot
            .filter_entries()
            .map(|(id, key, value)| format!("{id} {key}={value}")),
    );
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rebuild_is_idempotent(catalog in prop::collection::vec(arb_product(), 0..60)) {
        let first = rebuild(config(), catalog.clone(), &RebuildOptions::new(1)).unwrap();
        let second = rebuild(config(), catalog, &RebuildOptions::new(2)).unwrap();

        prop_assert_eq!(fingerprint(&first), fingerprint(&second));
        prop_assert_eq!(first.report().duplicate_products.clone(), second.report().duplicate_products.clone());
    }

    #[test]
    fn prop_rebuild_ignores_input_order(catalog in prop::collection::vec(arb_product(), 0..60)) {
        // Duplicate ids resolve by input order, so compare on unique catalogs only.
        let mut seen = BTreeSet::new();
        let unique: Vec<Product> = catalog
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        let mut reversed = unique.clone();
        reversed.reverse();

        let forward = rebuild(config(), unique, &RebuildOptions::new(1)).unwrap();
        let backward = rebuild(config(), reversed, &RebuildOptions::new(1)).unwrap();
        prop_assert_eq!(fingerprint(&forward), fingerprint(&backward));
    }

    #[test]
    fn prop_assigned_codes_exist_and_are_active(catalog in prop::collection::vec(arb_product(), 0..60)) {
        let snapshot = rebuild(config(), catalog, &RebuildOptions::new(1)).unwrap();

        for assignment in snapshot.assignments() {
            for code in &assignment.codes {
                prop_assert!(snapshot.config().is_active_node(code.as_str()), "code {} not active", code);
            }
        }
        prop_assert!(snapshot.taxonomy_direct("LUM-RETIRED").is_none());
    }

    #[test]
    fn prop_scope_is_union_of_subtree(catalog in prop::collection::vec(arb_product(), 0..60)) {
        let snapshot = rebuild(config(), catalog, &RebuildOptions::new(1)).unwrap();

        for node in snapshot.config().taxonomy() {
            let mut expected = RoaringBitmap::new();
            for code in snapshot.config().subtree(node.code.as_str()) {
                if let Some(direct) = snapshot.taxonomy_direct(code.as_str()) {
                    expected |= direct;
                }
            }
            prop_assert_eq!(snapshot.taxonomy_scope(node.code.as_str()), Some(&expected));
        }

        let classified = snapshot.all() - snapshot.unclassified();
        prop_assert_eq!(snapshot.taxonomy_scope("LUM").unwrap(), &classified);
    }

    #[test]
    fn prop_filter_entries_match_definition_kind(catalog in prop::collection::vec(arb_product(), 0..60)) {
        let snapshot = rebuild(config(), catalog, &RebuildOptions::new(1)).unwrap();

        for (_, key, value) in snapshot.filter_entries() {
            let definition = snapshot.config().filter(key).unwrap();
            prop_assert_eq!(value.kind(), definition.kind);
        }
        prop_assert_eq!(
            snapshot.filter_entry_count(),
            snapshot.report().filter_entries.values().sum::<u64>()
        );
    }
}
