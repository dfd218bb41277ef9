//! PostgreSQL schema column type conversion.
//!
//! This module maps PostgreSQL data type names (as returned by
//! `information_schema.columns.data_type`) to `NativeType` for table
//! reflection. Names outside the native enumeration are rejected rather than
//! approximated, so that reflection never silently changes a column's type.

use tableschema_core::{NativeType, UnsupportedType};

/// Convert a PostgreSQL INFORMATION_SCHEMA column type to NativeType.
///
/// # Example
///
/// ```
/// use postgresql_types::postgresql_column_to_native_type;
/// use tableschema_core::NativeType;
///
/// let native = postgresql_column_to_native_type("integer").unwrap();
/// assert_eq!(native, NativeType::Integer);
///
/// assert!(postgresql_column_to_native_type("money").is_err());
/// ```
pub fn postgresql_column_to_native_type(data_type: &str) -> Result<NativeType, UnsupportedType> {
    match data_type.to_lowercase().as_str() {
        // Numeric types
        "integer" | "int" | "int4" => Ok(NativeType::Integer),
        "bigint" | "int8" => Ok(NativeType::BigInt),
        "double precision" | "float8" => Ok(NativeType::DoublePrecision),

        // Boolean
        "boolean" | "bool" => Ok(NativeType::Boolean),

        // String types
        "text" => Ok(NativeType::Text),
        "character varying" | "varchar" => Ok(NativeType::Varchar),
        "uuid" => Ok(NativeType::Uuid),

        // JSON types
        "json" => Ok(NativeType::Json),
        "jsonb" => Ok(NativeType::Jsonb),

        // Date/Time types
        "date" => Ok(NativeType::Date),
        "time" | "time without time zone" => Ok(NativeType::Time),
        "timestamp" | "timestamp without time zone" => Ok(NativeType::Timestamp),

        other => Err(UnsupportedType::UnknownNative(other.to_string())),
    }
}
