//! Configuration management for the Catalux service.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)
//!
//! This is the *service* configuration (ports, file locations, page sizes).
//! Taxonomy, rules and filter definitions live in their own document, loaded
//! through a [`crate::ConfigSource`] at every rebuild.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "catalux.toml";

/// Main configuration structure for the Catalux service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub rebuild: RebuildConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Locations of the catalog and the classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// JSON-lines product catalog (default: "catalog.jsonl")
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// TOML document with taxonomy, rules and filters (default: "classification.toml")
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
}

/// Rebuild behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildConfig {
    /// Worker threads for classification; unset uses one per core
    #[serde(default)]
    pub threads: Option<usize>,

    /// Build the first snapshot while the server starts (default: true)
    #[serde(default = "default_true")]
    pub on_startup: bool,
}

/// Query limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size when a request gives none (default: 20)
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for requested page sizes (default: 200)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.jsonl")
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("classification.toml")
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            rules_path: default_rules_path(),
        }
    }
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            threads: None,
            on_startup: default_true(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl QueryConfig {
    /// Page size for a request: the default when absent, capped at the maximum.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist or has invalid TOML syntax.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Reads the file named by `CATALUX_CONFIG`, else `catalux.toml` if it
    /// exists, else the defaults. Environment variables override the result:
    /// - `CATALUX_HOST` - Server host address
    /// - `CATALUX_PORT` - HTTP port
    /// - `CATALUX_CATALOG_PATH` - JSON-lines catalog
    /// - `CATALUX_RULES_PATH` - Classification configuration
    /// - `CATALUX_LOG_LEVEL` / `CATALUX_LOG_FORMAT` - Logging
    /// - `CATALUX_REBUILD_THREADS` - Rebuild worker threads
    /// - `CATALUX_MAX_PAGE_SIZE` - Page size cap
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CATALUX_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CATALUX_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("CATALUX_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(path) = std::env::var("CATALUX_CATALOG_PATH") {
            self.sources.catalog_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("CATALUX_RULES_PATH") {
            self.sources.rules_path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("CATALUX_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("CATALUX_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(threads) = std::env::var("CATALUX_REBUILD_THREADS") {
            if let Ok(threads) = threads.parse() {
                self.rebuild.threads = Some(threads);
            }
        }

        if let Ok(size) = std::env::var("CATALUX_MAX_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                self.query.max_page_size = size;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "server.timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.sources.catalog_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "sources.catalog_path cannot be empty".to_string(),
            ));
        }

        if self.sources.rules_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "sources.rules_path cannot be empty".to_string(),
            ));
        }

        if self.rebuild.threads == Some(0) {
            return Err(ConfigError::ValidationError(
                "rebuild.threads must be > 0 when set".to_string(),
            ));
        }

        if self.query.max_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "query.max_page_size must be > 0".to_string(),
            ));
        }

        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return Err(ConfigError::ValidationError(
                "query.default_page_size must be between 1 and query.max_page_size".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sources.catalog_path, PathBuf::from("catalog.jsonl"));
        assert!(config.rebuild.on_startup);
        assert_eq!(config.rebuild.threads, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_is_clamped() {
        let query = QueryConfig::default();
        assert_eq!(query.page_size(None), 20);
        assert_eq!(query.page_size(Some(5)), 5);
        assert_eq!(query.page_size(Some(10_000)), 200);
    }

    #[test]
    fn test_config_validation_page_sizes() {
        let mut config = ServiceConfig::default();
        config.query.default_page_size = 500;

        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("query.default_page_size"));
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = ServiceConfig::default();
        config.logging.format = "xml".to_string();

        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("logging.format must be"));
    }

    #[test]
    fn test_config_validation_zero_threads() {
        let mut config = ServiceConfig::default();
        config.rebuild.threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [sources]
            catalog_path = "/data/catalog.jsonl"

            [rebuild]
            threads = 4
            on_startup = false

            [query]
            max_page_size = 50
        "#;

        let config: ServiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.timeout_seconds, 30);
        assert_eq!(config.sources.catalog_path, PathBuf::from("/data/catalog.jsonl"));
        assert_eq!(config.sources.rules_path, PathBuf::from("classification.toml"));
        assert_eq!(config.rebuild.threads, Some(4));
        assert!(!config.rebuild.on_startup);
        assert_eq!(config.query.max_page_size, 50);
        assert_eq!(config.query.default_page_size, 20);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = ServiceConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlError { .. }));
        assert!(err.to_string().contains("broken.toml"));

        let missing = ServiceConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::IoError { .. }));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("CATALUX_HOST", "192.168.1.100");
        std::env::set_var("CATALUX_PORT", "9999");
        std::env::set_var("CATALUX_REBUILD_THREADS", "3");
        std::env::set_var("CATALUX_MAX_PAGE_SIZE", "not-a-number");

        let mut config = ServiceConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.server.host, "192.168.1.100");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.rebuild.threads, Some(3));
        assert_eq!(config.query.max_page_size, 200);

        // Clean up
        std::env::remove_var("CATALUX_HOST");
        std::env::remove_var("CATALUX_PORT");
        std::env::remove_var("CATALUX_REBUILD_THREADS");
        std::env::remove_var("CATALUX_MAX_PAGE_SIZE");
    }
}
