//! PostgreSQL type conversions for tableschema-core types.
//!
//! This crate provides the PostgreSQL half of the relational mapping:
//!
//! - [`ddl`] - SQL generation (CREATE/DROP/INSERT/SELECT/UPDATE) from `NativeType` columns
//! - [`schema`] - `information_schema.columns.data_type` → `NativeType`
//! - [`forward`] - `Value` → PostgreSQL parameter conversion
//! - [`reverse`] - PostgreSQL row value → `Value` conversion
//!
//! # Example
//!
//! ```
//! use postgresql_types::{PostgreSQLDdl, ToDdl};
//! use tableschema_core::NativeType;
//!
//! let ddl = PostgreSQLDdl;
//! assert_eq!(ddl.to_ddl(&NativeType::DoublePrecision), "DOUBLE PRECISION");
//! ```

pub mod ddl;
pub mod forward;
pub mod reverse;
pub mod schema;

pub use ddl::{quote_identifier, ForeignKeyClause, PostgreSQLDdl, ToDdl};
pub use forward::PostgreSQLValue;
pub use reverse::{row_value, ConversionError};
pub use schema::postgresql_column_to_native_type;
