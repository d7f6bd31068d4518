//! Filter index builder: raw attribute → typed filter value.

use catalux_core::{ConfigSnapshot, FilterDefinition, FilterKind, FilterValue, Product, RawAttribute};

/// Extracts typed filter values from products for the active filter set.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    filters: Vec<FilterDefinition>,
}

impl IndexBuilder {
    /// Captures the active filter definitions of `config`, ordered by key.
    pub fn new(config: &ConfigSnapshot) -> Self {
        let mut filters: Vec<_> = config
            .filters()
            .iter()
            .filter(|f| f.active)
            .cloned()
            .collect();
        filters.sort_by(|a, b| a.key.cmp(&b.key));
        Self { filters }
    }

    pub fn filters(&self) -> &[FilterDefinition] {
        &self.filters
    }

    /// Extracts at most one value per filter for `product`.
    ///
    /// The returned slots index into [`IndexBuilder::filters`]. A filter whose
    /// source attribute is missing or unparsable yields no slot.
    pub fn extract(&self, product: &Product) -> Vec<(usize, FilterValue)> {
        self.filters
            .iter()
            .enumerate()
            .filter_map(|(slot, definition)| {
                product
                    .attribute(&definition.source_attribute)
                    .and_then(|raw| convert(definition.kind, raw))
                    .map(|value| (slot, value))
            })
            .collect()
    }
}

/// Converts one raw attribute according to the filter's value kind.
pub fn convert(kind: FilterKind, raw: &RawAttribute) -> Option<FilterValue> {
    match kind {
        FilterKind::Boolean => raw.as_logical().map(FilterValue::Boolean),
        FilterKind::Categorical => raw
            .as_code()
            .map(|code| FilterValue::Categorical(code.to_string())),
        FilterKind::NumericRange => raw.as_number().map(FilterValue::Numeric),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalux_core::TaxonomyNode;

    fn builder() -> IndexBuilder {
        let filters = vec![
            FilterDefinition::new("power", "Power", FilterKind::NumericRange, "power"),
            FilterDefinition::new("ip", "IP rating", FilterKind::Categorical, "IP_RATING"),
            FilterDefinition::new("dimmable", "Dimmable", FilterKind::Boolean, "DIMMABLE"),
            FilterDefinition::new("legacy", "Legacy", FilterKind::Boolean, "OLD").inactive(),
        ];
        let config =
            ConfigSnapshot::new(vec![TaxonomyNode::root("LUM", "Luminaires")], vec![], filters)
                .unwrap();
        IndexBuilder::new(&config)
    }

    #[test]
    fn extracts_typed_values_for_active_filters() {
        let builder = builder();
        let keys: Vec<_> = builder.filters().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["dimmable", "ip", "power"]);

        let product = Product::new("P2", "Spot")
            .with_attribute("IP_RATING", RawAttribute::code("IP65"))
            .with_attribute("power", RawAttribute::scalar(12.5))
            .with_attribute("DIMMABLE", RawAttribute::code("no"))
            .with_attribute("OLD", RawAttribute::logical(true));

        let values = builder.extract(&product);
        assert_eq!(
            values,
            vec![
                (0, FilterValue::Boolean(false)),
                (1, FilterValue::Categorical("IP65".to_string())),
                (2, FilterValue::Numeric(12.5)),
            ]
        );
    }

    #[test]
    fn missing_or_unparsable_attributes_yield_no_entry() {
        let product = Product::new("P3", "Plain")
            .with_attribute("DIMMABLE", RawAttribute::code("sometimes"))
            .with_attribute("IP_RATING", RawAttribute::logical(true));
        assert!(builder().extract(&product).is_empty());
    }

    #[test]
    fn numeric_range_prefers_lower_bound() {
        let raw = RawAttribute {
            value: Some(18.0),
            min: Some(12.0),
            max: Some(24.0),
            ..RawAttribute::default()
        };
        assert_eq!(
            convert(FilterKind::NumericRange, &raw),
            Some(FilterValue::Numeric(12.0))
        );
    }
}
