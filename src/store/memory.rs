//! In-process relational store.
//!
//! Tables live in a `BTreeMap` keyed by `(namespace, table)`. Column types,
//! NOT NULL, primary key uniqueness and foreign keys are enforced the way
//! PostgreSQL enforces them for the native types we create, so the storage
//! engine behaves the same against both stores. Foreign keys must reference
//! the primary key of their table and are checked when each statement ends. Transactions snapshot the
//! whole map on `begin` and restore it on `rollback`.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tableschema_core::{NativeType, Value};
use thiserror::Error;
use tracing::debug;

use super::{
    ColumnValue, ForeignKeyDef, NativeColumn, RelationalStore, StoreError, TableLayout,
};

const DEFAULT_NAMESPACE: &str = "public";

/// Errors raised by [`MemoryStore`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryStoreError {
    #[error("relation \"{0}\" already exists")]
    TableExists(String),

    #[error("relation \"{0}\" does not exist")]
    TableNotFound(String),

    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    ColumnNotFound { table: String, column: String },

    #[error("null value in column \"{column}\" of relation \"{table}\" violates not-null constraint")]
    NotNullViolation { table: String, column: String },

    #[error("duplicate key value violates primary key of relation \"{0}\"")]
    UniqueViolation(String),

    #[error("value {value} does not fit column \"{column}\" of type {native_type}")]
    TypeMismatch {
        column: String,
        native_type: NativeType,
        value: String,
    },

    #[error("there is no unique constraint matching given keys for referenced table \"{referenced_table}\"")]
    InvalidForeignKey {
        table: String,
        referenced_table: String,
    },

    #[error("insert or update on table \"{table}\" violates foreign key constraint referencing \"{referenced_table}\"")]
    ForeignKeyViolation {
        table: String,
        referenced_table: String,
    },

    #[error("cannot drop table \"{table}\" because table \"{referenced_by}\" depends on it")]
    DependentObjects { table: String, referenced_by: String },

    #[error("column \"{0}\" is not an integer column")]
    NotInteger(String),

    #[error("there is already a transaction in progress")]
    TransactionInProgress,

    #[error("there is no transaction in progress")]
    NoTransaction,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<NativeColumn>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyDef>,
    indexes: Vec<(String, Vec<String>)>,
    rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    fn position(&self, table: &str, column: &str) -> Result<usize, MemoryStoreError> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| MemoryStoreError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    fn matches(&self, row: &[Value], filter: &[(usize, Value)]) -> bool {
        filter.iter().all(|(idx, value)| &row[*idx] == value)
    }

    fn resolve_filter(
        &self,
        table: &str,
        filter: &[ColumnValue],
    ) -> Result<Vec<(usize, Value)>, MemoryStoreError> {
        filter
            .iter()
            .map(|predicate| {
                let idx = self.position(table, &predicate.column)?;
                let value = coerce(&self.columns[idx], predicate.value.clone())?;
                Ok((idx, value))
            })
            .collect()
    }

    fn check_row(&self, table: &str, row: &[Value]) -> Result<(), MemoryStoreError> {
        for (column, value) in self.columns.iter().zip(row) {
            if value.is_null() && !column.nullable {
                return Err(MemoryStoreError::NotNullViolation {
                    table: table.to_string(),
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn positions(&self, table: &str, columns: &[String]) -> Result<Vec<usize>, MemoryStoreError> {
        columns.iter().map(|c| self.position(table, c)).collect()
    }

    fn check_primary_key(&self, table: &str, rows: &[Vec<Value>]) -> Result<(), MemoryStoreError> {
        if self.primary_key.is_empty() {
            return Ok(());
        }
        let positions = self.positions(table, &self.primary_key)?;
        let mut seen = HashSet::new();
        for row in rows {
            let key = positions
                .iter()
                .map(|idx| row[*idx].to_string())
                .collect::<Vec<_>>();
            if !seen.insert(key) {
                return Err(MemoryStoreError::UniqueViolation(table.to_string()));
            }
        }
        Ok(())
    }
}

/// Normalize a value to what the column stores, rejecting values of another type.
fn coerce(column: &NativeColumn, value: Value) -> Result<Value, MemoryStoreError> {
    let mismatch = |value: &Value| MemoryStoreError::TypeMismatch {
        column: column.name.clone(),
        native_type: column.native_type,
        value: format!("{value:?}"),
    };
    match (column.native_type, value) {
        (_, Value::Null) => Ok(Value::Null),
        (NativeType::Integer, Value::Integer(i)) => {
            if i32::try_from(i).is_ok() {
                Ok(Value::Integer(i))
            } else {
                Err(mismatch(&Value::Integer(i)))
            }
        }
        (NativeType::BigInt, Value::Integer(i)) => Ok(Value::Integer(i)),
        (NativeType::DoublePrecision, Value::Number(f)) => Ok(Value::Number(f)),
        (NativeType::DoublePrecision, Value::Integer(i)) => Ok(Value::Number(i as f64)),
        (NativeType::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(b)),
        (NativeType::Text | NativeType::Varchar | NativeType::Uuid, Value::String(s)) => {
            Ok(Value::String(s))
        }
        (NativeType::Json | NativeType::Jsonb, Value::Json(j)) => Ok(Value::Json(j)),
        (NativeType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (NativeType::Time, Value::Time(t)) => Ok(Value::Time(t)),
        (NativeType::Timestamp, Value::Datetime(dt)) => Ok(Value::Datetime(dt)),
        (_, other) => Err(mismatch(&other)),
    }
}

type Tables = BTreeMap<(String, String), MemoryTable>;

/// Check every foreign key from or to `table_key` as if the table held `rows`.
fn check_foreign_keys(
    tables: &Tables,
    table_key: &(String, String),
    rows: &[Vec<Value>],
) -> Result<(), MemoryStoreError> {
    let (namespace, table) = table_key;
    let target = tables
        .get(table_key)
        .ok_or_else(|| MemoryStoreError::TableNotFound(table.clone()))?;

    for fk in &target.foreign_keys {
        let (referenced, referenced_rows) = if fk.referenced_table == *table {
            (target, rows)
        } else {
            let referenced = tables
                .get(&(namespace.clone(), fk.referenced_table.clone()))
                .ok_or_else(|| MemoryStoreError::TableNotFound(fk.referenced_table.clone()))?;
            (referenced, referenced.rows.as_slice())
        };
        let from = target.positions(table, &fk.columns)?;
        let to = referenced.positions(&fk.referenced_table, &fk.referenced_columns)?;
        if rows.iter().any(|row| !is_referenced(row, &from, referenced_rows, &to)) {
            return Err(MemoryStoreError::ForeignKeyViolation {
                table: table.clone(),
                referenced_table: fk.referenced_table.clone(),
            });
        }
    }

    for ((other_namespace, other_table), other) in tables {
        if other_namespace != namespace || other_table == table {
            continue;
        }
        for fk in other.foreign_keys.iter().filter(|fk| fk.referenced_table == *table) {
            let from = other.positions(other_table, &fk.columns)?;
            let to = target.positions(table, &fk.referenced_columns)?;
            if other.rows.iter().any(|row| !is_referenced(row, &from, rows, &to)) {
                return Err(MemoryStoreError::ForeignKeyViolation {
                    table: other_table.clone(),
                    referenced_table: table.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Whether `row` satisfies a foreign key; keys with a null part always do.
fn is_referenced(row: &[Value], from: &[usize], referenced_rows: &[Vec<Value>], to: &[usize]) -> bool {
    let key: Vec<&Value> = from.iter().map(|idx| &row[*idx]).collect();
    if key.iter().any(|value| value.is_null()) {
        return true;
    }
    referenced_rows
        .iter()
        .any(|candidate| to.iter().zip(&key).all(|(idx, value)| &candidate[*idx] == *value))
}

/// In-process implementation of [`RelationalStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table, `None` when it does not exist.
    pub fn row_count(&self, namespace: Option<&str>, table: &str) -> Option<usize> {
        self.tables.get(&key(namespace, table)).map(|t| t.rows.len())
    }

    /// Index names of a table, in creation order.
    pub fn index_names(&self, namespace: Option<&str>, table: &str) -> Vec<String> {
        self.tables
            .get(&key(namespace, table))
            .map(|t| t.indexes.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn table(&self, namespace: Option<&str>, table: &str) -> Result<&MemoryTable, MemoryStoreError> {
        self.tables
            .get(&key(namespace, table))
            .ok_or_else(|| MemoryStoreError::TableNotFound(table.to_string()))
    }

    fn table_mut(
        &mut self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<&mut MemoryTable, MemoryStoreError> {
        self.tables
            .get_mut(&key(namespace, table))
            .ok_or_else(|| MemoryStoreError::TableNotFound(table.to_string()))
    }
}

fn key(namespace: Option<&str>, table: &str) -> (String, String) {
    (
        namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
        table.to_string(),
    )
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn table_names(&self, namespace: Option<&str>) -> Result<Vec<String>, StoreError> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        Ok(self
            .tables
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, table)| table.clone())
            .collect())
    }

    async fn create_table(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        layout: &TableLayout,
    ) -> Result<(), StoreError> {
        let table_key = key(namespace, table);
        if self.tables.contains_key(&table_key) {
            return Err(MemoryStoreError::TableExists(table.to_string()).into());
        }
        let mut created = MemoryTable {
            columns: layout.columns.clone(),
            primary_key: layout.primary_key.clone(),
            foreign_keys: layout.foreign_keys.clone(),
            ..Default::default()
        };
        // Primary key columns are implicitly NOT NULL.
        for column in created.columns.iter_mut() {
            if layout.primary_key.contains(&column.name) {
                column.nullable = false;
            }
        }
        created.positions(table, &layout.primary_key)?;

        for fk in &layout.foreign_keys {
            created.positions(table, &fk.columns)?;
            let referenced = if fk.referenced_table == table {
                &created
            } else {
                self.table(namespace, &fk.referenced_table)?
            };
            referenced.positions(&fk.referenced_table, &fk.referenced_columns)?;

            let mut wanted = fk.referenced_columns.clone();
            wanted.sort();
            let mut unique = referenced.primary_key.clone();
            unique.sort();
            if wanted.is_empty() || wanted != unique || fk.columns.len() != wanted.len() {
                return Err(MemoryStoreError::InvalidForeignKey {
                    table: table.to_string(),
                    referenced_table: fk.referenced_table.clone(),
                }
                .into());
            }
        }
        debug!("Memory store: created table {}", table);
        self.tables.insert(table_key, created);
        Ok(())
    }

    async fn create_index(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        index_name: &str,
        columns: &[String],
    ) -> Result<(), StoreError> {
        let target = self.table_mut(namespace, table)?;
        for column in columns {
            target.position(table, column)?;
        }
        target
            .indexes
            .push((index_name.to_string(), columns.to_vec()));
        Ok(())
    }

    async fn drop_table(&mut self, namespace: Option<&str>, table: &str) -> Result<(), StoreError> {
        let table_key = key(namespace, table);
        if !self.tables.contains_key(&table_key) {
            return Err(MemoryStoreError::TableNotFound(table.to_string()).into());
        }
        let dependent = self.tables.iter().find(|((ns, name), other)| {
            *ns == table_key.0
                && name != table
                && other.foreign_keys.iter().any(|fk| fk.referenced_table == table)
        });
        if let Some(((_, referenced_by), _)) = dependent {
            return Err(MemoryStoreError::DependentObjects {
                table: table.to_string(),
                referenced_by: referenced_by.clone(),
            }
            .into());
        }
        self.tables.remove(&table_key);
        Ok(())
    }

    async fn reflect_columns(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<NativeColumn>, StoreError> {
        Ok(self
            .tables
            .get(&key(namespace, table))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn reflect_primary_key(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tables
            .get(&key(namespace, table))
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn reflect_foreign_keys(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyDef>, StoreError> {
        Ok(self
            .tables
            .get(&key(namespace, table))
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn select(
        &self,
        namespace: Option<&str>,
        table: &str,
        columns: &[String],
        filter: &[ColumnValue],
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let source = self.table(namespace, table)?;
        let positions = columns
            .iter()
            .map(|c| source.position(table, c))
            .collect::<Result<Vec<_>, _>>()?;
        let filter = source.resolve_filter(table, filter)?;

        Ok(source
            .rows
            .iter()
            .filter(|row| source.matches(row, &filter))
            .map(|row| positions.iter().map(|idx| row[*idx].clone()).collect())
            .collect())
    }

    async fn max_value(
        &self,
        namespace: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<Option<i64>, StoreError> {
        let source = self.table(namespace, table)?;
        let idx = source.position(table, column)?;
        if !matches!(
            source.columns[idx].native_type,
            NativeType::Integer | NativeType::BigInt
        ) {
            return Err(MemoryStoreError::NotInteger(column.to_string()).into());
        }
        Ok(source.rows.iter().filter_map(|row| row[idx].as_i64()).max())
    }

    async fn insert(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        columns: &[NativeColumn],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64, StoreError> {
        let table_key = key(namespace, table);
        let target = self.table(namespace, table)?;
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let positions = target.positions(table, &names)?;

        let count = rows.len();
        let mut staged = target.rows.clone();
        for values in rows {
            let mut row = vec![Value::Null; target.columns.len()];
            for (idx, value) in positions.iter().zip(values) {
                row[*idx] = coerce(&target.columns[*idx], value)?;
            }
            target.check_row(table, &row)?;
            staged.push(row);
        }
        target.check_primary_key(table, &staged)?;
        check_foreign_keys(&self.tables, &table_key, &staged)?;

        self.table_mut(namespace, table)?.rows = staged;
        debug!("Memory store: inserted {} rows into {}", count, table);
        Ok(count as u64)
    }

    async fn update(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        assignments: &[ColumnValue],
        filter: &[ColumnValue],
    ) -> Result<u64, StoreError> {
        let table_key = key(namespace, table);
        let target = self.table(namespace, table)?;
        let filter = target.resolve_filter(table, filter)?;
        let assignments = assignments
            .iter()
            .map(|a| {
                let idx = target.position(table, &a.column)?;
                let value = coerce(&target.columns[idx], a.value.clone())?;
                Ok((idx, value))
            })
            .collect::<Result<Vec<_>, MemoryStoreError>>()?;

        let mut staged = target.rows.clone();
        let mut affected = 0u64;
        for row in staged.iter_mut() {
            if !target.matches(row, &filter) {
                continue;
            }
            for (idx, value) in &assignments {
                row[*idx] = value.clone();
            }
            target.check_row(table, row)?;
            affected += 1;
        }
        target.check_primary_key(table, &staged)?;
        check_foreign_keys(&self.tables, &table_key, &staged)?;

        self.table_mut(namespace, table)?.rows = staged;
        Ok(affected)
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(MemoryStoreError::TransactionInProgress.into());
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| MemoryStoreError::NoTransaction.into())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let snapshot = self.snapshot.take().ok_or(MemoryStoreError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }
}
