//! Table Schema casting rules.
//!
//! Raw values arrive either as strings (CSV) or as JSON values (JSON
//! documents, programmatic callers). [`cast_value`] converts one raw value to
//! the [`Value`] dictated by its field descriptor.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as Json;

use crate::schema::FieldDescriptor;
use crate::types::{LogicalType, NativeType};
use crate::values::Value;

const TRUE_VALUES: [&str; 4] = ["true", "True", "TRUE", "1"];
const FALSE_VALUES: [&str; 4] = ["false", "False", "FALSE", "0"];

const DEFAULT_DATE: &str = "%Y-%m-%d";
const DEFAULT_TIME: &str = "%H:%M:%S";
const DEFAULT_DATETIME: &str = "%Y-%m-%dT%H:%M:%SZ";

const ANY_DATE: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];
const ANY_TIME: [&str; 3] = ["%H:%M:%S", "%H:%M", "%I:%M %p"];
const ANY_DATETIME: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A raw value that cannot be cast to its field's type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to cast value {value} of field \"{field}\": {reason}")]
pub struct CastError {
    /// Field name
    pub field: String,
    /// Offending raw value, JSON-encoded
    pub value: String,
    /// What went wrong
    pub reason: String,
}

impl CastError {
    fn new(field: &FieldDescriptor, raw: &Json, reason: impl Into<String>) -> Self {
        Self {
            field: field.name.clone(),
            value: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// Cast a raw value to the field's logical type.
///
/// JSON null and strings listed in `missing_values` become [`Value::Null`],
/// which is rejected for `required` fields.
pub fn cast_value(
    field: &FieldDescriptor,
    raw: &Json,
    missing_values: &[String],
) -> Result<Value, CastError> {
    if let Some(null) = cast_missing(field, raw, missing_values)? {
        return Ok(null);
    }

    match field.field_type {
        LogicalType::String => match raw {
            Json::String(s) => Ok(Value::String(s.clone())),
            _ => Err(CastError::new(field, raw, "expected a string")),
        },

        LogicalType::Integer | LogicalType::Year => match raw {
            Json::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| CastError::new(field, raw, "expected an integer")),
            Json::String(s) => s
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| CastError::new(field, raw, "expected an integer")),
            _ => Err(CastError::new(field, raw, "expected an integer")),
        },

        LogicalType::Number => match raw {
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| CastError::new(field, raw, "expected a number")),
            Json::String(s) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| CastError::new(field, raw, "expected a number")),
            _ => Err(CastError::new(field, raw, "expected a number")),
        },

        LogicalType::Boolean => match raw {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::String(s) if TRUE_VALUES.contains(&s.as_str()) => Ok(Value::Boolean(true)),
            Json::String(s) if FALSE_VALUES.contains(&s.as_str()) => Ok(Value::Boolean(false)),
            _ => Err(CastError::new(field, raw, "expected a boolean")),
        },

        LogicalType::Object | LogicalType::Geojson => {
            cast_json(field, raw, Json::is_object, "expected a JSON object")
        }

        LogicalType::Array => cast_json(field, raw, Json::is_array, "expected a JSON array"),

        LogicalType::Date => {
            let s = expect_str(field, raw)?;
            parse_temporal(field, s, DEFAULT_DATE, &ANY_DATE, |s, f| {
                NaiveDate::parse_from_str(s, f).ok()
            })
            .map(Value::Date)
            .ok_or_else(|| CastError::new(field, raw, "expected a date"))
        }

        LogicalType::Time => {
            let s = expect_str(field, raw)?;
            parse_temporal(field, s, DEFAULT_TIME, &ANY_TIME, |s, f| {
                NaiveTime::parse_from_str(s, f).ok()
            })
            .map(Value::Time)
            .ok_or_else(|| CastError::new(field, raw, "expected a time"))
        }

        LogicalType::Datetime => {
            let s = expect_str(field, raw)?;
            parse_datetime(field, s)
                .map(Value::Datetime)
                .ok_or_else(|| CastError::new(field, raw, "expected a datetime"))
        }

        // No relational mapping; kept verbatim so that casting stays total.
        LogicalType::Yearmonth
        | LogicalType::Duration
        | LogicalType::Geopoint
        | LogicalType::Any => match raw {
            Json::String(s) => Ok(Value::String(s.clone())),
            other => Ok(Value::Json(other.clone())),
        },
    }
}

/// Cast a raw value for a stored column of the given native type.
///
/// JSON columns accept any JSON container, objects and arrays alike, whatever
/// logical type the column reflects as. Other columns cast by the field's
/// logical type.
pub fn cast_column_value(
    field: &FieldDescriptor,
    native_type: NativeType,
    raw: &Json,
    missing_values: &[String],
) -> Result<Value, CastError> {
    match native_type {
        NativeType::Json | NativeType::Jsonb => {
            if let Some(null) = cast_missing(field, raw, missing_values)? {
                return Ok(null);
            }
            cast_json(
                field,
                raw,
                |v| v.is_object() || v.is_array(),
                "expected a JSON object or array",
            )
        }
        _ => cast_value(field, raw, missing_values),
    }
}

/// `Some(Value::Null)` for a missing value, `None` for anything else.
fn cast_missing(
    field: &FieldDescriptor,
    raw: &Json,
    missing_values: &[String],
) -> Result<Option<Value>, CastError> {
    let is_missing = match raw {
        Json::Null => true,
        Json::String(s) => missing_values.iter().any(|m| m == s),
        _ => false,
    };
    if !is_missing {
        return Ok(None);
    }
    if field.is_required() {
        return Err(CastError::new(field, raw, "field is required"));
    }
    Ok(Some(Value::Null))
}

fn expect_str<'a>(field: &FieldDescriptor, raw: &'a Json) -> Result<&'a str, CastError> {
    raw.as_str()
        .ok_or_else(|| CastError::new(field, raw, "expected a string"))
}

fn cast_json(
    field: &FieldDescriptor,
    raw: &Json,
    shape: fn(&Json) -> bool,
    reason: &str,
) -> Result<Value, CastError> {
    let value = match raw {
        Json::String(s) => {
            serde_json::from_str::<Json>(s).map_err(|e| CastError::new(field, raw, e.to_string()))?
        }
        other => other.clone(),
    };
    if shape(&value) {
        Ok(Value::Json(value))
    } else {
        Err(CastError::new(field, raw, reason))
    }
}

/// Resolve the field format into strftime patterns and try them in order.
fn parse_temporal<T>(
    field: &FieldDescriptor,
    s: &str,
    default: &str,
    any: &[&str],
    parse: impl Fn(&str, &str) -> Option<T>,
) -> Option<T> {
    match field.format.as_deref() {
        None | Some("default") => parse(s, default),
        Some("any") => any.iter().find_map(|f| parse(s, f)),
        Some(pattern) => parse(s, pattern.strip_prefix("fmt:").unwrap_or(pattern)),
    }
}

fn parse_datetime(field: &FieldDescriptor, s: &str) -> Option<NaiveDateTime> {
    if field.format.as_deref() == Some("any") {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_utc());
        }
    }
    parse_temporal(field, s, DEFAULT_DATETIME, &ANY_DATETIME, |s, f| {
        NaiveDateTime::parse_from_str(s, f).ok()
    })
}
