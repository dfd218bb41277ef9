//! Logical ↔ native type mapping.
//!
//! Both directions are total over the closed enumerations and return
//! [`UnsupportedType`] for anything outside the mapped subset.
//!
//! `array` and `geojson` are stored as `JSONB` and reflect back as `object`;
//! every other mapped logical type round-trips exactly.

use crate::types::{LogicalType, NativeType};

/// A type outside the mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedType {
    /// Logical type with no native column type
    #[error("Type \"{0}\" is not supported")]
    Logical(LogicalType),

    /// Native column type with no logical type
    #[error("Column type \"{0}\" is not supported")]
    Native(NativeType),

    /// Logical type name that is not part of Table Schema
    #[error("Type \"{0}\" is not a Table Schema type")]
    UnknownLogical(String),

    /// Native type name that is not part of the native enumeration
    #[error("Column type \"{0}\" is not supported")]
    UnknownNative(String),

    /// Field of a descriptor whose logical type has no native column type
    #[error("Type \"{field_type}\" of field \"{field}\" is not supported")]
    Field {
        field: String,
        field_type: LogicalType,
    },

    /// Reflected column whose native type has no logical type
    #[error("Type \"{native_type}\" of column \"{column}\" is not supported")]
    Column {
        column: String,
        native_type: NativeType,
    },
}

/// Logical types whose mapping round-trips exactly.
pub const BIJECTIVE: [LogicalType; 8] = [
    LogicalType::String,
    LogicalType::Integer,
    LogicalType::Number,
    LogicalType::Boolean,
    LogicalType::Object,
    LogicalType::Date,
    LogicalType::Time,
    LogicalType::Datetime,
];

/// Native column type used when creating a column of the given logical type.
pub fn to_native(logical: LogicalType) -> Result<NativeType, UnsupportedType> {
    match logical {
        LogicalType::String => Ok(NativeType::Text),
        LogicalType::Integer => Ok(NativeType::Integer),
        LogicalType::Number => Ok(NativeType::DoublePrecision),
        LogicalType::Boolean => Ok(NativeType::Boolean),
        LogicalType::Object | LogicalType::Array | LogicalType::Geojson => Ok(NativeType::Jsonb),
        LogicalType::Date => Ok(NativeType::Date),
        LogicalType::Time => Ok(NativeType::Time),
        LogicalType::Datetime => Ok(NativeType::Timestamp),
        LogicalType::Year
        | LogicalType::Yearmonth
        | LogicalType::Duration
        | LogicalType::Geopoint
        | LogicalType::Any => Err(UnsupportedType::Logical(logical)),
    }
}

/// Logical type reported for a reflected column of the given native type.
pub fn to_logical(native: NativeType) -> Result<LogicalType, UnsupportedType> {
    match native {
        NativeType::Text | NativeType::Varchar | NativeType::Uuid => Ok(LogicalType::String),
        NativeType::Integer => Ok(LogicalType::Integer),
        NativeType::DoublePrecision => Ok(LogicalType::Number),
        NativeType::Boolean => Ok(LogicalType::Boolean),
        NativeType::Json | NativeType::Jsonb => Ok(LogicalType::Object),
        NativeType::Date => Ok(LogicalType::Date),
        NativeType::Time => Ok(LogicalType::Time),
        NativeType::Timestamp => Ok(LogicalType::Datetime),
        NativeType::BigInt => Err(UnsupportedType::Native(native)),
    }
}
