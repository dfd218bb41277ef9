//! tableschema-sql
//!
//! Store Table Schema descriptors and rows in SQL databases.
//!
//! # Features
//!
//! - Type mapping: Table Schema field types to native column types and back
//! - Table lifecycle: create, delete and describe tables from descriptors,
//!   including primary and foreign keys
//! - Reads: every row of a table, ordered as its described fields
//! - Writes: plain batched inserts, or insert-or-update keyed by caller fields,
//!   with an optional engine-assigned identity column
//!
//! # Example
//!
//! ```rust
//! use tableschema_sql::{MemoryStore, RawRow, Storage, StorageConfig, WriteOptions};
//! use tableschema_core::SchemaDescriptor;
//!
//! # tokio_test::block_on(async {
//! let schema = SchemaDescriptor::from_json(
//!     r#"{"fields": [{"name": "id", "type": "integer"}, {"name": "name", "type": "string"}]}"#,
//! ).unwrap();
//!
//! let config = StorageConfig::new().with_prefix("demo_").with_identity_column("__id");
//! let mut storage = Storage::new(MemoryStore::new(), config);
//! storage.create("people", &schema).await.unwrap();
//!
//! let rows = vec![RawRow::from(vec!["1".to_string(), "alice".to_string()])];
//! let outcomes = storage.write("people", rows, WriteOptions::upsert(["id"])).await.unwrap();
//! assert_eq!(outcomes[0].identity, Some(1));
//! # });
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! tableschema-sql create articles --schema articles.json
//! tableschema-sql write articles --input articles.csv --update-keys id
//! tableschema-sql describe articles
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod input;
pub mod storage;
pub mod store;
pub mod upsert;

pub use catalog::TableCatalog;
pub use codec::{cast_row, RawRow};
pub use config::{FileConfig, StorageConfig, TableFilter, DEFAULT_BATCH_SIZE};
pub use convert::SchemaConverter;
pub use error::{Result, StorageError};
pub use storage::{CreateOptions, Storage};
pub use store::{
    ColumnDef, ColumnValue, ForeignKeyDef, MemoryStore, MemoryStoreError, NativeColumn,
    PostgresStore, RelationalStore, StoreError, TableLayout,
};
pub use upsert::{RowWriter, WriteOptions, WriteOutcome};
