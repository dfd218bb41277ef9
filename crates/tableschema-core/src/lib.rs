//! Core types for tableschema-sql.
//!
//! This crate provides the storage-independent half of the system:
//!
//! - [`LogicalType`] - The Table Schema field type vocabulary
//! - [`NativeType`] - The closed set of relational column types we create and reflect
//! - [`mapping`] - Bidirectional mapping between the two
//! - [`SchemaDescriptor`] - Table Schema descriptors (fields, primary and foreign keys, missing values)
//! - [`Value`] / [`Record`] - Typed values produced by casting
//! - [`cast`] - Table Schema casting rules for raw (JSON/CSV) values
//!
//! # Architecture
//!
//! ```text
//! tableschema-core (this crate)
//!    │
//!    ├─── postgresql-types   (DDL and value conversion for PostgreSQL)
//!    │
//!    └─── tableschema-sql    (catalog, table lifecycle, row codec, upsert engine)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tableschema_core::{mapping, LogicalType, NativeType};
//!
//! let native = mapping::to_native(LogicalType::Integer).unwrap();
//! assert_eq!(native, NativeType::Integer);
//! assert_eq!(mapping::to_logical(native).unwrap(), LogicalType::Integer);
//! ```

pub mod cast;
pub mod mapping;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use cast::{cast_column_value, cast_value, CastError};
pub use mapping::UnsupportedType;
pub use schema::{
    Constraints, FieldDescriptor, FieldNames, ForeignKey, ForeignKeyReference, PrimaryKey,
    ReferenceTarget, SchemaDescriptor, SchemaError,
};
pub use types::{LogicalType, NativeType};
pub use values::{Record, Value};
