//! Query execution for Catalux: predicate evaluation, faceting, ranked
//! search and the read models served to clients.

pub mod context;
pub mod executor;
pub mod facets;
pub mod predicate;
pub mod read_model;

pub use context::{FilterSelection, FlagState, PageRequest, QueryContext, SearchPage, SortMode};
pub use executor::QueryExecutor;
pub use facets::{Facet, FacetBucket, FacetValue};
pub use predicate::{match_text, normalize_range, Candidates, MatchTier, Predicate};
pub use read_model::{ProductDetail, Statistic, TaxonomyTreeNode};
