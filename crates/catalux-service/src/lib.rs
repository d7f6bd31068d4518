//! Catalux service layer: configuration, upstream sources and the
//! double-buffered catalog index shared by the API surfaces.

pub mod config;
pub mod service;
pub mod source;

pub use config::{ConfigError, QueryConfig, ServiceConfig};
pub use service::CatalogService;
pub use source::{
    parse_jsonl, CatalogSource, ConfigSource, JsonlCatalogSource, MemoryCatalogSource,
    StaticConfigSource, TomlConfigSource,
};
