//! Descriptor ↔ column conversion.

use tableschema_core::mapping::{to_logical, to_native};
use tableschema_core::{
    Constraints, FieldDescriptor, FieldNames, ForeignKey, NativeType, PrimaryKey, ReferenceTarget,
    SchemaDescriptor, UnsupportedType,
};

use crate::error::Result;
use crate::store::{ColumnDef, ForeignKeyDef, TableLayout};

/// Converts schema descriptors to column definitions and back.
///
/// When an identity column is configured it is prepended to every created
/// table as `INTEGER NOT NULL` and skipped on reflection. Foreign keys to a
/// `<bucket>` resolve to the prefixed store name of that bucket.
#[derive(Debug, Clone, Default)]
pub struct SchemaConverter {
    prefix: String,
    identity_column: Option<String>,
}

impl SchemaConverter {
    pub fn new(prefix: impl Into<String>, identity_column: Option<String>) -> Self {
        Self {
            prefix: prefix.into(),
            identity_column,
        }
    }

    pub fn identity_column(&self) -> Option<&str> {
        self.identity_column.as_deref()
    }

    /// Column definitions and constraints of the logical table `table`.
    pub fn descriptor_to_columns(
        &self,
        table: &str,
        schema: &SchemaDescriptor,
    ) -> Result<TableLayout> {
        let mut columns = Vec::with_capacity(schema.fields.len() + 1);
        if let Some(identity) = &self.identity_column {
            columns.push(ColumnDef::new(identity.clone(), NativeType::Integer, false));
        }
        for field in &schema.fields {
            let native_type = to_native(field.field_type).map_err(|_| UnsupportedType::Field {
                field: field.name.clone(),
                field_type: field.field_type,
            })?;
            columns.push(ColumnDef::new(
                field.name.clone(),
                native_type,
                !field.is_required(),
            ));
        }

        let primary_key = schema
            .primary_key
            .as_ref()
            .map(FieldNames::to_vec)
            .unwrap_or_default();

        let mut foreign_keys = Vec::with_capacity(schema.foreign_keys.len());
        for fk in &schema.foreign_keys {
            let referenced = match fk.reference.target()? {
                ReferenceTarget::SelfTable => table,
                ReferenceTarget::Bucket(bucket) => bucket,
            };
            foreign_keys.push(ForeignKeyDef {
                columns: fk.fields.to_vec(),
                referenced_table: format!("{}{}", self.prefix, referenced),
                referenced_columns: fk.reference.fields.to_vec(),
            });
        }

        Ok(TableLayout {
            columns,
            primary_key,
            foreign_keys,
        })
    }

    /// Descriptor of the logical table `table`, fields in store column order.
    ///
    /// Fails on the first column whose native type has no logical type.
    /// Foreign keys touching the identity column are not part of the
    /// descriptor and are skipped.
    pub fn columns_to_descriptor(
        &self,
        table: &str,
        layout: &TableLayout,
    ) -> std::result::Result<SchemaDescriptor, UnsupportedType> {
        let mut fields = Vec::with_capacity(layout.columns.len());
        for column in &layout.columns {
            if self.is_identity(&column.name) {
                continue;
            }
            let field_type =
                to_logical(column.native_type).map_err(|_| UnsupportedType::Column {
                    column: column.name.clone(),
                    native_type: column.native_type,
                })?;
            let mut field = FieldDescriptor::new(column.name.clone(), field_type);
            if !column.nullable {
                field.constraints = Some(Constraints { required: true });
            }
            fields.push(field);
        }

        let key: Vec<String> = layout
            .primary_key
            .iter()
            .filter(|name| !self.is_identity(name))
            .cloned()
            .collect();

        let mut descriptor = SchemaDescriptor::new(fields);
        descriptor.primary_key = PrimaryKey::from_columns(key);
        descriptor.foreign_keys = layout
            .foreign_keys
            .iter()
            .filter(|fk| {
                !fk.columns
                    .iter()
                    .chain(&fk.referenced_columns)
                    .any(|name| self.is_identity(name))
            })
            .map(|fk| self.reflect_foreign_key(table, fk))
            .collect();
        Ok(descriptor)
    }

    fn reflect_foreign_key(&self, table: &str, fk: &ForeignKeyDef) -> ForeignKey {
        let fields = FieldNames::from(fk.columns.clone());
        let referenced = FieldNames::from(fk.referenced_columns.clone());
        if fk.referenced_table == format!("{}{}", self.prefix, table) {
            return ForeignKey::to_self(fields, referenced);
        }
        // A table outside the prefix keeps its store name.
        let bucket = fk
            .referenced_table
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(&fk.referenced_table);
        ForeignKey::to_bucket(fields, bucket, referenced)
    }

    fn is_identity(&self, name: &str) -> bool {
        self.identity_column.as_deref() == Some(name)
    }
}
