//! Insert-or-update write path.
//!
//! A [`RowWriter`] casts incoming rows against the table's reflected schema
//! and column types and writes them, yielding one [`WriteOutcome`] per input row, in input
//! order, from [`RowWriter::next`]. Work is driven by consumption:
//!
//! - with update keys, each `next` call reconciles exactly one row: an
//!   equality SELECT on the key columns, then an UPDATE of the non-key
//!   columns of the matching rows or an INSERT of a new row;
//! - without update keys, `next` casts and inserts a chunk of up to
//!   `batch_size` rows when its buffer of outcomes is empty.
//!
//! Dropping the writer stops all further writes. The writer does not manage
//! transactions; [`crate::Storage::write`] wraps it in one.

use std::collections::VecDeque;

use tableschema_core::{Record, SchemaDescriptor, Value};
use tracing::debug;

use crate::codec::{cast_stored_row, RawRow};
use crate::error::{Result, StorageError};
use crate::store::{ColumnValue, NativeColumn, RelationalStore};

/// Per-row result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Whether an existing row was updated rather than a new one inserted.
    pub updated: bool,
    /// Identity of the written row; `None` without an identity column.
    pub identity: Option<i64>,
}

impl WriteOutcome {
    pub fn inserted(identity: Option<i64>) -> Self {
        Self {
            updated: false,
            identity,
        }
    }

    pub fn updated(identity: Option<i64>) -> Self {
        Self {
            updated: true,
            identity,
        }
    }
}

/// Options of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Fields identifying a row. `None` inserts every row.
    pub update_keys: Option<Vec<String>>,
}

impl WriteOptions {
    pub fn insert() -> Self {
        Self::default()
    }

    pub fn upsert<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            update_keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }
}

/// Where a writer writes and what the table looks like.
pub(crate) struct WriteTarget {
    pub namespace: Option<String>,
    pub table: String,
    pub schema: SchemaDescriptor,
    /// Field columns, in schema order.
    pub columns: Vec<NativeColumn>,
    pub identity: Option<NativeColumn>,
}

/// Lazy stream of write outcomes.
pub struct RowWriter<'a, S: RelationalStore + ?Sized, I> {
    store: &'a mut S,
    target: WriteTarget,
    rows: I,
    update_keys: Option<Vec<String>>,
    batch_size: usize,
    /// Last identity assigned; seeded from the table on first use.
    last_identity: Option<i64>,
    ready: VecDeque<WriteOutcome>,
    finished: bool,
}

impl<'a, S, I> RowWriter<'a, S, I>
where
    S: RelationalStore + ?Sized,
    I: Iterator<Item = RawRow>,
{
    pub(crate) fn new(
        store: &'a mut S,
        target: WriteTarget,
        rows: I,
        update_keys: Option<Vec<String>>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            target,
            rows,
            update_keys,
            batch_size: batch_size.max(1),
            last_identity: None,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Process input until the next outcome is available.
    ///
    /// Returns `None` once every row has been written. After an error the
    /// writer is finished and returns `None`.
    pub async fn next(&mut self) -> Option<Result<WriteOutcome>> {
        if let Some(outcome) = self.ready.pop_front() {
            return Some(Ok(outcome));
        }
        if self.finished {
            return None;
        }

        let step = match self.update_keys.clone() {
            Some(keys) => self.upsert_next(&keys).await,
            None => self.insert_chunk().await,
        };
        match step {
            Ok(()) => match self.ready.pop_front() {
                Some(outcome) => Some(Ok(outcome)),
                None => {
                    self.finished = true;
                    None
                }
            },
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Drive the writer to completion.
    pub async fn collect(mut self) -> Result<Vec<WriteOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome?);
        }
        Ok(outcomes)
    }

    /// Reconcile one row; queues its outcome, or nothing at end of input.
    async fn upsert_next(&mut self, keys: &[String]) -> Result<()> {
        let Some(raw) = self.rows.next() else {
            return Ok(());
        };
        let record = self.cast(raw)?;
        let namespace = self.target.namespace.clone();
        let namespace = namespace.as_deref();

        let filter: Vec<ColumnValue> = record
            .project(keys)
            .into_iter()
            .filter_map(|(name, value)| {
                let column = self.target.columns.iter().find(|c| c.name == name)?;
                Some(ColumnValue::new(column, value))
            })
            .collect();

        let selected = match &self.target.identity {
            Some(identity) => vec![identity.name.clone()],
            None => keys.to_vec(),
        };
        let existing = self
            .store
            .select(namespace, &self.target.table, &selected, &filter)
            .await?;

        if let Some(first) = existing.first() {
            let assignments: Vec<ColumnValue> = self
                .target
                .columns
                .iter()
                .filter(|c| !keys.contains(&c.name))
                .map(|c| ColumnValue::new(c, field_value(&record, &c.name)))
                .collect();
            if !assignments.is_empty() {
                let affected = self
                    .store
                    .update(namespace, &self.target.table, &assignments, &filter)
                    .await?;
                debug!("Updated {} rows of {}", affected, self.target.table);
            }
            let identity = match &self.target.identity {
                Some(_) => first.first().and_then(Value::as_i64),
                None => None,
            };
            self.ready.push_back(WriteOutcome::updated(identity));
        } else {
            let identity = self.assign_identity().await?;
            let (columns, values) = self.insert_layout(record, identity);
            self.store
                .insert(namespace, &self.target.table, &columns, vec![values])
                .await?;
            self.ready.push_back(WriteOutcome::inserted(identity));
        }
        Ok(())
    }

    /// Cast and insert up to `batch_size` rows; queues their outcomes.
    async fn insert_chunk(&mut self) -> Result<()> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut outcomes = Vec::new();

        while values.len() < self.batch_size {
            let Some(raw) = self.rows.next() else {
                break;
            };
            let record = self.cast(raw)?;
            let identity = self.assign_identity().await?;
            let (row_columns, row) = self.insert_layout(record, identity);
            columns = row_columns;
            values.push(row);
            outcomes.push(WriteOutcome::inserted(identity));
        }

        if values.is_empty() {
            return Ok(());
        }
        let count = values.len();
        self.store
            .insert(
                self.target.namespace.as_deref(),
                &self.target.table,
                &columns,
                values,
            )
            .await?;
        debug!("Flushed {} rows into {}", count, self.target.table);
        self.ready.extend(outcomes);
        Ok(())
    }

    /// Next identity value, `None` without an identity column.
    async fn assign_identity(&mut self) -> Result<Option<i64>> {
        let Some(identity) = &self.target.identity else {
            return Ok(None);
        };
        let last = match self.last_identity {
            Some(last) => last,
            None => self
                .store
                .max_value(
                    self.target.namespace.as_deref(),
                    &self.target.table,
                    &identity.name,
                )
                .await?
                .unwrap_or(0),
        };
        let next = last
            .checked_add(1)
            .ok_or_else(|| StorageError::IdentityOverflow {
                table: self.target.table.clone(),
            })?;
        self.last_identity = Some(next);
        Ok(Some(next))
    }

    fn cast(&self, raw: RawRow) -> Result<Record> {
        Ok(cast_stored_row(&self.target.schema, &self.target.columns, raw)?)
    }

    /// Columns and values of an INSERT for one record.
    fn insert_layout(&self, record: Record, identity: Option<i64>) -> (Vec<NativeColumn>, Vec<Value>) {
        let mut columns = Vec::with_capacity(self.target.columns.len() + 1);
        let mut values = Vec::with_capacity(self.target.columns.len() + 1);
        if let (Some(column), Some(id)) = (&self.target.identity, identity) {
            columns.push(column.clone());
            values.push(Value::Integer(id));
        }
        for column in &self.target.columns {
            columns.push(column.clone());
            values.push(field_value(&record, &column.name));
        }
        (columns, values)
    }
}

fn field_value(record: &Record, name: &str) -> Value {
    record.get(name).cloned().unwrap_or(Value::Null)
}

/// Check update keys against the table's fields.
pub(crate) fn validate_keys(table: &str, schema: &SchemaDescriptor, keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        return Err(StorageError::InvalidKey {
            table: table.to_string(),
            field: String::new(),
        });
    }
    for key in keys {
        if schema.get_field(key).is_none() {
            return Err(StorageError::InvalidKey {
                table: table.to_string(),
                field: key.clone(),
            });
        }
    }
    Ok(())
}
