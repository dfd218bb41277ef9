//! Storage configuration.
//!
//! [`StorageConfig`] is what a [`crate::Storage`] handle is built from. The
//! CLI assembles it from flags and environment variables, optionally layered
//! over a TOML file:
//!
//! ```toml
//! prefix = "test_"
//! namespace = "public"
//! identity_column = "__id"
//! batch_size = 500
//! tables = ["test_articles", "test_comments"]
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

/// Default number of rows per INSERT in plain insert mode.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Predicate over store-visible table names.
pub type TableFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Configuration of a storage handle.
#[derive(Clone)]
pub struct StorageConfig {
    /// Prefix added to logical table names to form store-visible names.
    pub prefix: String,
    /// Database schema holding the tables; `None` uses the store default.
    pub namespace: Option<String>,
    /// Engine-assigned identity column, enables auto-increment.
    pub identity_column: Option<String>,
    /// Restricts which store-visible tables are considered to exist.
    pub table_filter: Option<TableFilter>,
    /// Rows per INSERT in plain insert mode.
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            namespace: None,
            identity_column: None,
            table_filter: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("prefix", &self.prefix)
            .field("namespace", &self.namespace)
            .field("identity_column", &self.identity_column)
            .field("table_filter", &self.table_filter.as_ref().map(|_| "<fn>"))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_identity_column(mut self, column: impl Into<String>) -> Self {
        self.identity_column = Some(column.into());
        self
    }

    pub fn with_table_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.table_filter = Some(Arc::new(filter));
        self
    }

    /// Set the batch size; zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

// ============================================================================
// Config file
// ============================================================================

/// Error loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Contents of a TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub connection_string: Option<String>,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub identity_column: Option<String>,
    pub batch_size: Option<usize>,
    /// Allow-list of store-visible table names.
    pub tables: Option<Vec<String>>,
}

impl FileConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Build a storage config from the file's values.
    pub fn to_storage_config(&self) -> StorageConfig {
        let mut config = StorageConfig::new();
        if let Some(prefix) = &self.prefix {
            config = config.with_prefix(prefix.clone());
        }
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if let Some(column) = &self.identity_column {
            config = config.with_identity_column(column.clone());
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(tables) = &self.tables {
            let allowed = tables.clone();
            config = config.with_table_filter(move |name| allowed.iter().any(|t| t == name));
        }
        config
    }
}
