//! Reverse conversion: PostgreSQL value → Value
//!
//! This module converts values read from a `tokio_postgres::Row` back into
//! tableschema-core's `Value`, dispatching on the column's wire type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tableschema_core::{NativeType, Value};
use thiserror::Error;
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use uuid::Uuid;

/// Errors that can occur converting between `Value` and PostgreSQL values.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The column type is not supported
    #[error("Unsupported PostgreSQL type: {0}")]
    UnsupportedType(String),

    /// A value does not fit the column type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A number outside the column's range
    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: NativeType },

    /// Reading the column failed
    #[error("Failed to read column: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Read column `index` of `row` as a `Value`.
pub fn row_value(row: &Row, index: usize) -> Result<Value, ConversionError> {
    let column = &row.columns()[index];
    let pg_type = column.type_();

    let value = match *pg_type {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.map(Value::Boolean),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)?
            .map(|i| Value::Integer(i as i64)),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(index)?
            .map(|i| Value::Integer(i as i64)),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(Value::Integer),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)?
            .map(|f| Value::Number(f as f64)),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.map(Value::Number),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.map(Value::String)
        }
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(index)?
            .map(|u| Value::String(u.to_string())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .map(Value::Json),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(index)?.map(Value::Date),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(index)?.map(Value::Time),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(Value::Datetime),
        _ => return Err(ConversionError::UnsupportedType(pg_type.to_string())),
    };

    Ok(value.unwrap_or(Value::Null))
}
