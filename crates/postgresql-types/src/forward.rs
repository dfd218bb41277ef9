//! Forward conversion: Value → PostgreSQL value
//!
//! Converts cast values into parameters for tokio-postgres statements. The
//! target column's `NativeType` is needed because tokio-postgres checks the
//! Rust type of every parameter against the inferred SQL type, nulls
//! included.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tableschema_core::{NativeType, Value};
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use crate::reverse::ConversionError;

/// PostgreSQL value wrapper for type-safe conversions.
#[derive(Debug, Clone, PartialEq)]
pub enum PostgreSQLValue {
    /// Null value of a column type
    Null(NativeType),
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Text/string value
    Text(String),
    /// UUID value
    Uuid(Uuid),
    /// JSON value
    Json(serde_json::Value),
    /// Date value (no time)
    Date(NaiveDate),
    /// Time value (no date)
    Time(NaiveTime),
    /// Timestamp without timezone
    Timestamp(NaiveDateTime),
}

impl PostgreSQLValue {
    /// Convert a cast value for a column of the given native type.
    pub fn from_value(value: Value, native: NativeType) -> Result<Self, ConversionError> {
        match (native, value) {
            (native, Value::Null) => Ok(PostgreSQLValue::Null(native)),

            (NativeType::Boolean, Value::Boolean(b)) => Ok(PostgreSQLValue::Bool(b)),

            (NativeType::Integer, Value::Integer(i)) => i32::try_from(i)
                .map(PostgreSQLValue::Int32)
                .map_err(|_| ConversionError::OutOfRange {
                    value: i.to_string(),
                    target: native,
                }),
            (NativeType::BigInt, Value::Integer(i)) => Ok(PostgreSQLValue::Int64(i)),

            (NativeType::DoublePrecision, Value::Number(f)) => Ok(PostgreSQLValue::Float64(f)),
            (NativeType::DoublePrecision, Value::Integer(i)) => {
                Ok(PostgreSQLValue::Float64(i as f64))
            }

            (NativeType::Text | NativeType::Varchar, Value::String(s)) => {
                Ok(PostgreSQLValue::Text(s))
            }
            (NativeType::Uuid, Value::String(s)) => Uuid::parse_str(&s)
                .map(PostgreSQLValue::Uuid)
                .map_err(|_| ConversionError::TypeMismatch {
                    expected: native.to_string(),
                    actual: s,
                }),

            (NativeType::Json | NativeType::Jsonb, Value::Json(j)) => Ok(PostgreSQLValue::Json(j)),

            (NativeType::Date, Value::Date(d)) => Ok(PostgreSQLValue::Date(d)),
            (NativeType::Time, Value::Time(t)) => Ok(PostgreSQLValue::Time(t)),
            (NativeType::Timestamp, Value::Datetime(dt)) => Ok(PostgreSQLValue::Timestamp(dt)),

            (native, other) => Err(ConversionError::TypeMismatch {
                expected: native.to_string(),
                actual: format!("{other:?}"),
            }),
        }
    }

    /// Box into a statement parameter.
    pub fn into_boxed(self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            PostgreSQLValue::Null(native) => null_of(native),
            PostgreSQLValue::Bool(b) => Box::new(b),
            PostgreSQLValue::Int32(i) => Box::new(i),
            PostgreSQLValue::Int64(i) => Box::new(i),
            PostgreSQLValue::Float64(f) => Box::new(f),
            PostgreSQLValue::Text(s) => Box::new(s),
            PostgreSQLValue::Uuid(u) => Box::new(u),
            PostgreSQLValue::Json(j) => Box::new(j),
            PostgreSQLValue::Date(d) => Box::new(d),
            PostgreSQLValue::Time(t) => Box::new(t),
            PostgreSQLValue::Timestamp(ts) => Box::new(ts),
        }
    }
}

/// Typed NULL parameter for a column type.
fn null_of(native: NativeType) -> Box<dyn ToSql + Sync + Send> {
    match native {
        NativeType::Boolean => Box::new(None::<bool>),
        NativeType::Integer => Box::new(None::<i32>),
        NativeType::BigInt => Box::new(None::<i64>),
        NativeType::DoublePrecision => Box::new(None::<f64>),
        NativeType::Text | NativeType::Varchar => Box::new(None::<String>),
        NativeType::Uuid => Box::new(None::<Uuid>),
        NativeType::Json | NativeType::Jsonb => Box::new(None::<serde_json::Value>),
        NativeType::Date => Box::new(None::<NaiveDate>),
        NativeType::Time => Box::new(None::<NaiveTime>),
        NativeType::Timestamp => Box::new(None::<NaiveDateTime>),
    }
}
