//! Table Schema descriptors.
//!
//! A [`SchemaDescriptor`] is the portable description of a table: an ordered
//! list of fields, an optional primary key and the strings treated as
//! missing values when casting. It is (de)serialized in the Table Schema JSON
//! layout:
//!
//! ```json
//! {
//!   "fields": [
//!     {"name": "id", "type": "integer", "constraints": {"required": true}},
//!     {"name": "name", "type": "string"}
//!   ],
//!   "primaryKey": "id",
//!   "foreignKeys": [
//!     {"fields": "parent", "reference": {"resource": "self", "fields": "id"}}
//!   ]
//! }
//! ```
//!
//! Foreign keys reference either the table itself (`"resource": "self"`) or
//! another table of the same storage (`"resource": "<bucket>"` plus the
//! table's logical name in `bucket`).

use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for descriptor operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading descriptor file
    #[error("Failed to read descriptor file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing JSON
    #[error("Failed to parse descriptor: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Two fields share a name
    #[error("Field '{0}' is defined more than once")]
    DuplicateField(String),

    /// A field reference (primary key, key set) names no field
    #[error("Field '{0}' not found in descriptor")]
    FieldNotFound(String),

    /// Descriptor without fields
    #[error("Descriptor has no fields")]
    NoFields,

    /// Foreign key resource other than `self` or `<bucket>`
    #[error("Foreign key resource \"{0}\" is not supported; only \"self\" and \"<bucket>\" references are")]
    UnsupportedReference(String),

    /// Foreign key whose field lists differ in length or are empty
    #[error("Foreign key on ({0}) does not match its referenced fields")]
    ForeignKeyMismatch(String),
}

// ============================================================================
// Fields
// ============================================================================

/// Field constraints. Only `required` affects the relational mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    /// Field must not be null
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// A single field of a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,

    /// Logical type
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: LogicalType,

    /// Format hint (date/time patterns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Field constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

fn default_field_type() -> LogicalType {
    LogicalType::String
}

impl FieldDescriptor {
    /// Create a new optional field.
    pub fn new(name: impl Into<String>, field_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            field_type,
            format: None,
            constraints: None,
        }
    }

    /// Create a new field with `required: true`.
    pub fn required(name: impl Into<String>, field_type: LogicalType) -> Self {
        Self {
            constraints: Some(Constraints { required: true }),
            ..Self::new(name, field_type)
        }
    }

    /// Set the format hint.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether the field carries a `required` constraint.
    pub fn is_required(&self) -> bool {
        self.constraints.as_ref().is_some_and(|c| c.required)
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Field names of a key: a single name or a list of names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldNames {
    Single(String),
    Composite(Vec<String>),
}

/// Primary key of a descriptor.
pub type PrimaryKey = FieldNames;

impl FieldNames {
    /// Build from column names, `None` when there are none.
    pub fn from_columns(columns: Vec<String>) -> Option<Self> {
        if columns.is_empty() {
            None
        } else {
            Some(Self::from(columns))
        }
    }

    /// Field names of the key.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            FieldNames::Single(name) => vec![name.as_str()],
            FieldNames::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Owned field names of the key.
    pub fn to_vec(&self) -> Vec<String> {
        self.fields().into_iter().map(str::to_string).collect()
    }
}

impl From<Vec<String>> for FieldNames {
    /// Collapses a single name the way descriptors spell it.
    fn from(mut columns: Vec<String>) -> Self {
        match columns.len() {
            1 => FieldNames::Single(columns.remove(0)),
            _ => FieldNames::Composite(columns),
        }
    }
}

impl From<&str> for FieldNames {
    fn from(name: &str) -> Self {
        FieldNames::Single(name.to_string())
    }
}

pub const SELF_RESOURCE: &str = "self";
pub const BUCKET_RESOURCE: &str = "<bucket>";

/// Table a foreign key points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget<'a> {
    /// The descriptor's own table
    SelfTable,
    /// Another table, by logical name
    Bucket(&'a str),
}

/// Referenced side of a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyReference {
    /// `self` or `<bucket>`
    pub resource: String,

    /// Referenced fields
    pub fields: FieldNames,

    /// Logical name of the referenced table for `<bucket>` references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

impl ForeignKeyReference {
    pub fn target(&self) -> Result<ReferenceTarget<'_>, SchemaError> {
        match (self.resource.as_str(), self.bucket.as_deref()) {
            (SELF_RESOURCE, _) => Ok(ReferenceTarget::SelfTable),
            (BUCKET_RESOURCE, Some(bucket)) => Ok(ReferenceTarget::Bucket(bucket)),
            (other, _) => Err(SchemaError::UnsupportedReference(other.to_string())),
        }
    }
}

/// A foreign key of a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing fields of this descriptor
    pub fields: FieldNames,

    /// Referenced table and fields
    pub reference: ForeignKeyReference,
}

impl ForeignKey {
    /// Reference to fields of the same table.
    pub fn to_self(fields: impl Into<FieldNames>, referenced: impl Into<FieldNames>) -> Self {
        Self {
            fields: fields.into(),
            reference: ForeignKeyReference {
                resource: SELF_RESOURCE.to_string(),
                fields: referenced.into(),
                bucket: None,
            },
        }
    }

    /// Reference to fields of another table.
    pub fn to_bucket(
        fields: impl Into<FieldNames>,
        bucket: impl Into<String>,
        referenced: impl Into<FieldNames>,
    ) -> Self {
        Self {
            fields: fields.into(),
            reference: ForeignKeyReference {
                resource: BUCKET_RESOURCE.to_string(),
                fields: referenced.into(),
                bucket: Some(bucket.into()),
            },
        }
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Table Schema descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDescriptor {
    /// Ordered fields
    pub fields: Vec<FieldDescriptor>,

    /// Primary key
    #[serde(
        rename = "primaryKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub primary_key: Option<PrimaryKey>,

    /// Foreign keys
    #[serde(
        rename = "foreignKeys",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub foreign_keys: Vec<ForeignKey>,

    /// Raw strings cast to null
    #[serde(
        rename = "missingValues",
        default = "default_missing_values",
        skip_serializing_if = "is_default_missing_values"
    )]
    pub missing_values: Vec<String>,
}

fn default_missing_values() -> Vec<String> {
    vec![String::new()]
}

fn is_default_missing_values(values: &[String]) -> bool {
    values == default_missing_values().as_slice()
}

impl SchemaDescriptor {
    /// Create a descriptor from fields, without primary key.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            fields,
            primary_key: None,
            foreign_keys: Vec::new(),
            missing_values: default_missing_values(),
        }
    }

    /// Set the primary key.
    pub fn with_primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Parse and validate a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let descriptor: Self = serde_json::from_str(json)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Load a descriptor from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a foreign key.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Check field name uniqueness and key references.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields);
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        if let Some(pk) = &self.primary_key {
            for name in pk.fields() {
                if !seen.contains(name) {
                    return Err(SchemaError::FieldNotFound(name.to_string()));
                }
            }
        }
        for fk in &self.foreign_keys {
            let fields = fk.fields.fields();
            if let Some(missing) = fields.iter().find(|name| !seen.contains(*name)) {
                return Err(SchemaError::FieldNotFound(missing.to_string()));
            }
            let referenced = fk.reference.fields.fields();
            if fields.is_empty() || fields.len() != referenced.len() {
                return Err(SchemaError::ForeignKeyMismatch(fields.join(", ")));
            }
            if fk.reference.target()? == ReferenceTarget::SelfTable {
                if let Some(missing) = referenced.iter().find(|name| !seen.contains(*name)) {
                    return Err(SchemaError::FieldNotFound(missing.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let json = r#"{
            "fields": [
                {"name": "id", "type": "integer", "constraints": {"required": true}},
                {"name": "name", "type": "string"},
                {"name": "created", "type": "date", "format": "%d/%m/%Y"}
            ],
            "primaryKey": "id"
        }"#;
        let descriptor = SchemaDescriptor::from_json(json).unwrap();

        let names: Vec<_> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "created"]);
        assert!(descriptor.fields[0].is_required());
        assert!(!descriptor.fields[1].is_required());
        assert_eq!(descriptor.fields[2].format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(
            descriptor.primary_key,
            Some(PrimaryKey::Single("id".to_string()))
        );
        assert_eq!(descriptor.missing_values, vec![String::new()]);
    }

    #[test]
    fn test_field_type_defaults_to_string() {
        let descriptor = SchemaDescriptor::from_json(r#"{"fields": [{"name": "x"}]}"#).unwrap();
        assert_eq!(descriptor.fields[0].field_type, LogicalType::String);
    }

    #[test]
    fn test_unknown_type_fails_to_parse() {
        let json = r#"{"fields": [{"name": "name", "type": "not_supported"}]}"#;
        let err = SchemaDescriptor::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::JsonError(_)));
        assert!(err.to_string().contains("not_supported"));
    }

    #[test]
    fn test_duplicate_field() {
        let json = r#"{"fields": [{"name": "a", "type": "string"}, {"name": "a", "type": "integer"}]}"#;
        let err = SchemaDescriptor::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField(name) if name == "a"));
    }

    #[test]
    fn test_primary_key_must_reference_field() {
        let json = r#"{"fields": [{"name": "a", "type": "string"}], "primaryKey": ["a", "b"]}"#;
        let err = SchemaDescriptor::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::FieldNotFound(name) if name == "b"));
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(matches!(
            SchemaDescriptor::from_json(r#"{"fields": []}"#),
            Err(SchemaError::NoFields)
        ));
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let descriptor = SchemaDescriptor::new(vec![
            FieldDescriptor::required("id", LogicalType::Integer),
            FieldDescriptor::new("name", LogicalType::String),
        ]);
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "fields": [
                    {"name": "id", "type": "integer", "constraints": {"required": true}},
                    {"name": "name", "type": "string"}
                ]
            })
        );
    }

    #[test]
    fn test_primary_key_from_columns() {
        assert_eq!(PrimaryKey::from_columns(vec![]), None);
        assert_eq!(
            PrimaryKey::from_columns(vec!["id".to_string()]),
            Some(PrimaryKey::Single("id".to_string()))
        );
        let composite = PrimaryKey::from_columns(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(composite.fields(), vec!["a", "b"]);
        assert_eq!(composite.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_custom_missing_values() {
        let json = r#"{"fields": [{"name": "a"}], "missingValues": ["", "NA"]}"#;
        let descriptor = SchemaDescriptor::from_json(json).unwrap();
        assert_eq!(descriptor.missing_values, vec!["".to_string(), "NA".to_string()]);
    }

    #[test]
    fn test_parse_foreign_keys() {
        let json = r#"{
            "fields": [
                {"name": "id", "type": "string"},
                {"name": "parent", "type": "string"},
                {"name": "owner", "type": "integer"}
            ],
            "primaryKey": "id",
            "foreignKeys": [
                {"fields": "parent", "reference": {"resource": "self", "fields": "id"}},
                {"fields": ["owner"], "reference": {"resource": "<bucket>", "bucket": "people", "fields": ["id"]}}
            ]
        }"#;
        let descriptor = SchemaDescriptor::from_json(json).unwrap();
        assert_eq!(
            descriptor.foreign_keys,
            vec![
                ForeignKey::to_self("parent", "id"),
                ForeignKey {
                    fields: FieldNames::Composite(vec!["owner".to_string()]),
                    reference: ForeignKeyReference {
                        resource: "<bucket>".to_string(),
                        fields: FieldNames::Composite(vec!["id".to_string()]),
                        bucket: Some("people".to_string()),
                    },
                },
            ]
        );
        assert_eq!(
            descriptor.foreign_keys[1].reference.target().unwrap(),
            ReferenceTarget::Bucket("people")
        );
    }

    #[test]
    fn test_foreign_key_serializes_in_descriptor_layout() {
        let descriptor = SchemaDescriptor::new(vec![
            FieldDescriptor::new("id", LogicalType::Integer),
            FieldDescriptor::new("owner", LogicalType::Integer),
        ])
        .with_foreign_key(ForeignKey::to_bucket("owner", "people", "id"));
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            value["foreignKeys"],
            serde_json::json!([
                {"fields": "owner", "reference": {"resource": "<bucket>", "fields": "id", "bucket": "people"}}
            ])
        );
    }

    #[test]
    fn test_foreign_key_resource_must_be_self_or_bucket() {
        let json = r#"{
            "fields": [{"name": "id", "type": "integer"}],
            "foreignKeys": [{"fields": "id", "reference": {"resource": "http://example.com/data.json", "fields": "id"}}]
        }"#;
        let err = SchemaDescriptor::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedReference(r) if r == "http://example.com/data.json"));

        // A bucket reference without a bucket name is rejected the same way.
        let json = r#"{
            "fields": [{"name": "id", "type": "integer"}],
            "foreignKeys": [{"fields": "id", "reference": {"resource": "<bucket>", "fields": "id"}}]
        }"#;
        assert!(matches!(
            SchemaDescriptor::from_json(json).unwrap_err(),
            SchemaError::UnsupportedReference(_)
        ));
    }

    #[test]
    fn test_foreign_key_fields_must_exist_and_match() {
        let base = SchemaDescriptor::new(vec![
            FieldDescriptor::new("id", LogicalType::Integer),
            FieldDescriptor::new("parent", LogicalType::Integer),
        ]);

        let unknown = base.clone().with_foreign_key(ForeignKey::to_self("nope", "id"));
        assert!(matches!(unknown.validate(), Err(SchemaError::FieldNotFound(f)) if f == "nope"));

        let unknown_target = base.clone().with_foreign_key(ForeignKey::to_self("parent", "nope"));
        assert!(matches!(
            unknown_target.validate(),
            Err(SchemaError::FieldNotFound(f)) if f == "nope"
        ));

        let mismatch = base.clone().with_foreign_key(ForeignKey::to_bucket(
            "parent",
            "other",
            vec!["a".to_string(), "b".to_string()],
        ));
        assert!(matches!(mismatch.validate(), Err(SchemaError::ForeignKeyMismatch(_))));

        // Fields of another table are not known here.
        let bucket = base.with_foreign_key(ForeignKey::to_bucket("parent", "other", "anything"));
        assert!(bucket.validate().is_ok());
    }
}
