//! Classification and filter indexing for Catalux.
//!
//! [`rebuild`] turns a catalog plus a [`catalux_core::ConfigSnapshot`] into an
//! immutable [`IndexSnapshot`]: per-product taxonomy assignments, taxonomy
//! and flag bitmaps, and one [`FieldIndex`] per active filter.

pub mod builder;
pub mod classifier;
pub mod field_index;
pub mod rebuild;
pub mod snapshot;

pub use builder::{convert, IndexBuilder};
pub use classifier::{Classifier, SkippedRule, TaxonomyAssignment};
pub use field_index::{FieldIndex, ScanStrategy};
pub use rebuild::{rebuild, CancellationFlag, RebuildOptions};
pub use snapshot::{IndexSnapshot, RebuildReport, SearchText};
