//! Raw rows → typed records.

use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tableschema_core::{
    cast_column_value, cast_value, CastError, FieldDescriptor, Record, SchemaDescriptor, Value,
};

use crate::store::NativeColumn;

/// A row as supplied by the caller, before casting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawRow {
    /// Values in field order.
    Positional(Vec<Json>),
    /// Values by field name; absent fields are null.
    Keyed(Map<String, Json>),
}

impl From<Vec<Json>> for RawRow {
    fn from(values: Vec<Json>) -> Self {
        RawRow::Positional(values)
    }
}

impl From<Vec<String>> for RawRow {
    fn from(values: Vec<String>) -> Self {
        RawRow::Positional(values.into_iter().map(Json::String).collect())
    }
}

impl From<Map<String, Json>> for RawRow {
    fn from(values: Map<String, Json>) -> Self {
        RawRow::Keyed(values)
    }
}

/// Cast a raw row against a descriptor.
///
/// The resulting record holds every field of `schema`, in field order.
pub fn cast_row(schema: &SchemaDescriptor, raw: RawRow) -> Result<Record, CastError> {
    cast_fields(schema, raw, |_, field, value| {
        cast_value(field, value, &schema.missing_values)
    })
}

/// Cast a raw row for writing into stored columns.
///
/// `columns` are the table's field columns in `schema` order. Values of JSON
/// columns are cast as any JSON container; see [`cast_column_value`].
pub fn cast_stored_row(
    schema: &SchemaDescriptor,
    columns: &[NativeColumn],
    raw: RawRow,
) -> Result<Record, CastError> {
    cast_fields(schema, raw, |idx, field, value| match columns.get(idx) {
        Some(column) => cast_column_value(field, column.native_type, value, &schema.missing_values),
        None => cast_value(field, value, &schema.missing_values),
    })
}

fn cast_fields(
    schema: &SchemaDescriptor,
    raw: RawRow,
    cast: impl Fn(usize, &FieldDescriptor, &Json) -> Result<Value, CastError>,
) -> Result<Record, CastError> {
    let mut record = Record::new();
    match raw {
        RawRow::Positional(values) => {
            if values.len() != schema.fields.len() {
                let position = values.len().min(schema.fields.len());
                return Err(CastError {
                    field: schema
                        .fields
                        .get(position)
                        .map(|f| f.name.clone())
                        .unwrap_or_else(|| format!("#{position}")),
                    value: values.get(position).cloned().unwrap_or(Json::Null).to_string(),
                    reason: format!(
                        "row has {} values but the schema has {} fields",
                        values.len(),
                        schema.fields.len()
                    ),
                });
            }
            for (idx, (field, raw_value)) in schema.fields.iter().zip(&values).enumerate() {
                record.push(field.name.clone(), cast(idx, field, raw_value)?);
            }
        }
        RawRow::Keyed(values) => {
            for (idx, field) in schema.fields.iter().enumerate() {
                let raw_value = values.get(&field.name).unwrap_or(&Json::Null);
                record.push(field.name.clone(), cast(idx, field, raw_value)?);
            }
        }
    }
    Ok(record)
}
