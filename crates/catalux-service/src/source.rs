//! Upstream collaborators read at every rebuild.
//!
//! The catalog and the classification configuration are owned outside this
//! service. Both are read-only from here: a rebuild asks each source for a
//! fresh copy and never writes anything back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use catalux_core::{ConfigDocument, ConfigSnapshot, CoreError, CoreResult, Product};

/// Supplies the full product catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_products(&self) -> CoreResult<Vec<Product>>;
}

/// Supplies the taxonomy, rules and filter definitions.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_config(&self) -> CoreResult<ConfigSnapshot>;
}

/// Catalog stored as one JSON product per line.
#[derive(Debug, Clone)]
pub struct JsonlCatalogSource {
    path: PathBuf,
}

impl JsonlCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses JSON-lines catalog content. Blank lines are skipped; a malformed
/// line fails the whole catalog.
pub fn parse_jsonl(contents: &str) -> CoreResult<Vec<Product>> {
    let mut products = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let product: Product = serde_json::from_str(line).map_err(|e| {
            CoreError::DeserializationError(format!("line {}: {}", line_num + 1, e))
        })?;
        products.push(product);
    }
    Ok(products)
}

#[async_trait]
impl CatalogSource for JsonlCatalogSource {
    async fn load_products(&self) -> CoreResult<Vec<Product>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::source("catalog", format!("{}: {}", self.path.display(), e))
        })?;

        let products = parse_jsonl(&contents).map_err(|e| {
            CoreError::source("catalog", format!("{}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), products = products.len(), "catalog loaded");
        Ok(products)
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogSource {
    products: Vec<Product>,
}

impl MemoryCatalogSource {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalogSource {
    async fn load_products(&self) -> CoreResult<Vec<Product>> {
        Ok(self.products.clone())
    }
}

/// Classification configuration stored as a TOML document with
/// `[[taxonomy]]`, `[[rules]]` and `[[filters]]` arrays.
#[derive(Debug, Clone)]
pub struct TomlConfigSource {
    path: PathBuf,
}

impl TomlConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for TomlConfigSource {
    async fn load_config(&self) -> CoreResult<ConfigSnapshot> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::source("config", format!("{}: {}", self.path.display(), e))
        })?;

        let document: ConfigDocument = toml::from_str(&contents).map_err(|e| {
            CoreError::source("config", format!("{}: {}", self.path.display(), e))
        })?;

        ConfigSnapshot::from_document(document)
    }
}

/// Fixed in-memory configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    document: ConfigDocument,
}

impl StaticConfigSource {
    pub fn new(document: ConfigDocument) -> Self {
        Self { document }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load_config(&self) -> CoreResult<ConfigSnapshot> {
        ConfigSnapshot::from_document(self.document.clone())
    }
}
