use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, SupplierCode};

/// Product record as supplied by the catalog source.
///
/// Immutable from the index's point of view for the duration of a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Long description used for text matching and pattern rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Supplier that delivers this product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<SupplierCode>,
    /// Unit price, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Image reference for the presentation layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Technical classification class (e.g. an ETIM class id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_code: Option<String>,
    /// Technical classification group the class belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_code: Option<String>,
    /// Raw technical attributes keyed by attribute code.
    #[serde(default)]
    pub attributes: BTreeMap<String, RawAttribute>,
}

impl Product {
    /// Creates a product with only an id and a name.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            supplier: None,
            price: None,
            image: None,
            class_code: None,
            group_code: None,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_supplier(mut self, supplier: impl Into<SupplierCode>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_class(mut self, class_code: impl Into<String>) -> Self {
        self.class_code = Some(class_code.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group_code: impl Into<String>) -> Self {
        self.group_code = Some(group_code.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, code: impl Into<String>, value: RawAttribute) -> Self {
        self.attributes.insert(code.into(), value);
        self
    }

    /// Returns the raw attribute stored under `code`.
    pub fn attribute(&self, code: &str) -> Option<&RawAttribute> {
        self.attributes.get(code)
    }
}

/// Semi-structured raw attribute value.
///
/// The catalog may encode one attribute as a logical value, a discrete code,
/// a scalar, a (half-)bounded range, or several of these at once. Bare JSON
/// booleans, numbers and strings deserialize into the matching single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAttributeRepr")]
pub struct RawAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl RawAttribute {
    #[must_use]
    pub fn logical(value: bool) -> Self {
        Self {
            logical: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn code(value: impl Into<String>) -> Self {
        Self {
            code: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    /// Logical interpretation of the raw value.
    ///
    /// The logical field wins. Otherwise the code is parsed
    /// (`true/false/yes/no/y/n/1/0/on/off`, case-insensitive), then a scalar
    /// of exactly `1` or `0`.
    pub fn as_logical(&self) -> Option<bool> {
        if let Some(value) = self.logical {
            return Some(value);
        }

        if let Some(code) = self.code.as_deref() {
            match code.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "on" => return Some(true),
                "false" | "no" | "n" | "0" | "off" => return Some(false),
                _ => {}
            }
        }

        match self.value {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        }
    }

    /// Canonical numeric value: range lower bound, else scalar, else range
    /// upper bound. Non-finite numbers are ignored.
    pub fn as_number(&self) -> Option<f64> {
        [self.min, self.value, self.max]
            .into_iter()
            .flatten()
            .find(|v| v.is_finite())
    }

    /// Discrete code or label, trimmed. Empty codes count as absent.
    pub fn as_code(&self) -> Option<&str> {
        self.code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttributeRepr {
    Logical(bool),
    Scalar(f64),
    Code(String),
    Structured {
        #[serde(default)]
        logical: Option<bool>,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl From<RawAttributeRepr> for RawAttribute {
    fn from(repr: RawAttributeRepr) -> Self {
        match repr {
            RawAttributeRepr::Logical(value) => Self::logical(value),
            RawAttributeRepr::Scalar(value) => Self::scalar(value),
            RawAttributeRepr::Code(value) => Self::code(value),
            RawAttributeRepr::Structured {
                logical,
                code,
                value,
                min,
                max,
                unit,
            } => Self {
                logical,
                code,
                value,
                min,
                max,
                unit,
            },
        }
    }
}
