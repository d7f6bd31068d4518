//! Core domain types for the Catalux classification and faceted search index.

pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod metrics;
pub mod product;
pub mod rule;
pub mod taxonomy;

pub use config::{ConfigDocument, ConfigSnapshot};
pub use error::{CoreError, CoreResult};
pub use filter::{FilterDefinition, FilterKind, FilterValue};
pub use ids::{ProductId, SupplierCode, TaxonomyCode};
pub use product::{Product, RawAttribute};
pub use rule::{ClassificationRule, CompareOp, RuleCondition, TextField};
pub use taxonomy::TaxonomyNode;
