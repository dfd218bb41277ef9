//! Relational store abstraction.
//!
//! [`RelationalStore`] is the narrow interface the storage engine needs from
//! a SQL database: table listing, DDL, column and key reflection, equality-filtered
//! reads, inserts, updates and transaction control. Two implementations are
//! provided:
//!
//! - [`PostgresStore`] - PostgreSQL over `tokio-postgres`
//! - [`MemoryStore`] - in-process tables, used by tests and dry runs
//!
//! Table names passed to the store are store-visible names (prefix already
//! applied); `namespace` is the database schema, `None` meaning the store's
//! default.

use async_trait::async_trait;
use postgresql_types::ConversionError;
use tableschema_core::{NativeType, UnsupportedType, Value};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryStoreError};
pub use postgres::PostgresStore;

// ============================================================================
// Column and predicate types
// ============================================================================

/// A column as reflected from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeColumn {
    pub name: String,
    pub native_type: NativeType,
    pub nullable: bool,
}

impl NativeColumn {
    pub fn new(name: impl Into<String>, native_type: NativeType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            native_type,
            nullable,
        }
    }
}

/// Column definition used on the create side.
pub type ColumnDef = NativeColumn;

/// A foreign key between two tables of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    /// Store-visible name of the referenced table
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Columns and constraints of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableLayout {
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// A column paired with a value: one equality predicate or one assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub column: String,
    pub native_type: NativeType,
    pub value: Value,
}

impl ColumnValue {
    pub fn new(column: &NativeColumn, value: Value) -> Self {
        Self {
            column: column.name.clone(),
            native_type: column.native_type,
            value,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a relational store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Value could not be converted to or from a PostgreSQL value.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Reflected column type outside the native enumeration.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedType),

    /// In-memory store error.
    #[error("{0}")]
    Memory(#[from] MemoryStoreError),
}

// ============================================================================
// Store trait
// ============================================================================

/// Operations the storage engine performs against a relational database.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Names of the tables in `namespace`.
    async fn table_names(&self, namespace: Option<&str>) -> Result<Vec<String>, StoreError>;

    /// Create a table with the given columns, primary key (may be empty) and
    /// foreign keys.
    async fn create_table(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        layout: &TableLayout,
    ) -> Result<(), StoreError>;

    /// Create a (non-unique) index over `columns`.
    async fn create_index(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        index_name: &str,
        columns: &[String],
    ) -> Result<(), StoreError>;

    /// Drop a table.
    async fn drop_table(&mut self, namespace: Option<&str>, table: &str) -> Result<(), StoreError>;

    /// Columns of a table in store order. Empty when the table does not exist.
    async fn reflect_columns(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<NativeColumn>, StoreError>;

    /// Primary key columns of a table in key order.
    async fn reflect_primary_key(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Foreign keys of a table, in creation order.
    async fn reflect_foreign_keys(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyDef>, StoreError>;

    /// Rows matching every predicate in `filter` (null-safe equality), projected
    /// onto `columns`. An empty filter selects all rows.
    async fn select(
        &self,
        namespace: Option<&str>,
        table: &str,
        columns: &[String],
        filter: &[ColumnValue],
    ) -> Result<Vec<Vec<Value>>, StoreError>;

    /// Maximum of an integer column, `None` for an empty table.
    async fn max_value(
        &self,
        namespace: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<Option<i64>, StoreError>;

    /// Insert rows whose values follow `columns` order. Returns rows inserted.
    async fn insert(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        columns: &[NativeColumn],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64, StoreError>;

    /// Apply `assignments` to rows matching `filter`. Returns rows affected.
    async fn update(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        assignments: &[ColumnValue],
        filter: &[ColumnValue],
    ) -> Result<u64, StoreError>;

    async fn begin(&mut self) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}
