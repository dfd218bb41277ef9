//! Error types for storage operations.

use tableschema_core::{CastError, SchemaError, UnsupportedType};
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `create` on a table that already exists.
    #[error("Table \"{0}\" already exists")]
    AlreadyExists(String),

    /// `delete`/`describe`/`read`/`write` on a table that does not exist.
    #[error("Table \"{0}\" does not exist")]
    NotFound(String),

    /// A logical or native type outside the mapping.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedType),

    /// A row value that does not cast to its field's type.
    #[error(transparent)]
    Cast(#[from] CastError),

    /// Update keys that are empty or name unknown fields.
    #[error("Invalid update key \"{field}\" for table \"{table}\"")]
    InvalidKey { table: String, field: String },

    /// The identity column has no value left after its current maximum.
    #[error("Identity column of table \"{table}\" is exhausted")]
    IdentityOverflow { table: String },

    /// Error reported by the relational store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Descriptor parse or validation problem.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            // Reflection hit a column type outside the native enumeration.
            StoreError::UnsupportedType(unsupported) => StorageError::UnsupportedType(unsupported),
            other => StorageError::Store(other),
        }
    }
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
