//! Table lifecycle, reads and writes over a relational store.

use tableschema_core::{SchemaDescriptor, SchemaError, Value};
use tracing::{debug, info, warn};

use crate::catalog::TableCatalog;
use crate::codec::RawRow;
use crate::config::StorageConfig;
use crate::convert::SchemaConverter;
use crate::error::{Result, StorageError};
use crate::store::{RelationalStore, TableLayout};
use crate::upsert::{validate_keys, RowWriter, WriteOptions, WriteOutcome, WriteTarget};

/// Options for [`Storage::create_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Drop an existing table instead of failing.
    pub force: bool,
    /// One index per field group.
    pub indexes: Vec<Vec<String>>,
}

/// Storage handle: Table Schema tables in a relational store.
///
/// Every table name taken or returned is a logical name; the store-visible
/// name is the configured prefix followed by it.
pub struct Storage<S: RelationalStore> {
    store: S,
    config: StorageConfig,
    catalog: TableCatalog,
    converter: SchemaConverter,
}

impl<S: RelationalStore> Storage<S> {
    pub fn new(store: S, config: StorageConfig) -> Self {
        let catalog = TableCatalog::new(config.prefix.clone(), config.table_filter.clone());
        let converter = SchemaConverter::new(config.prefix.clone(), config.identity_column.clone());
        Self {
            store,
            config,
            catalog,
            converter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref()
    }

    /// Forget the cached table listing.
    pub fn invalidate(&mut self) {
        self.catalog.invalidate();
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Sorted logical names of the visible tables.
    pub async fn tables(&mut self) -> Result<Vec<String>> {
        let namespace = self.config.namespace.as_deref();
        Ok(self.catalog.list_tables(&self.store, namespace).await?.to_vec())
    }

    pub async fn exists(&mut self, name: &str) -> Result<bool> {
        let namespace = self.config.namespace.as_deref();
        Ok(self.catalog.exists(&self.store, namespace, name).await?)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a table; fails with `AlreadyExists` when present.
    pub async fn create(&mut self, name: &str, schema: &SchemaDescriptor) -> Result<()> {
        self.create_with(name, schema, &CreateOptions::default()).await
    }

    /// Create a table with options.
    pub async fn create_with(
        &mut self,
        name: &str,
        schema: &SchemaDescriptor,
        options: &CreateOptions,
    ) -> Result<()> {
        schema.validate()?;
        if let Some(identity) = self.converter.identity_column() {
            if schema.get_field(identity).is_some() {
                return Err(SchemaError::DuplicateField(identity.to_string()).into());
            }
        }
        for group in &options.indexes {
            for field in group {
                if schema.get_field(field).is_none() {
                    return Err(SchemaError::FieldNotFound(field.clone()).into());
                }
            }
        }
        let layout = self.converter.descriptor_to_columns(name, schema)?;

        if self.exists(name).await? {
            if !options.force {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            self.delete(name).await?;
        }

        let table = self.catalog.store_name(name);
        let namespace = self.config.namespace.as_deref();
        self.store
            .create_table(namespace, &table, &layout)
            .await?;
        self.catalog.invalidate();

        for (idx, group) in options.indexes.iter().filter(|g| !g.is_empty()).enumerate() {
            let index_name = format!("{table}_{}_idx", idx + 1);
            self.store
                .create_index(namespace, &table, &index_name, group)
                .await?;
        }
        info!("Created table {} ({} fields)", table, schema.fields.len());
        Ok(())
    }

    /// Create several tables in order; stops at the first failure.
    pub async fn create_many(&mut self, tables: &[(&str, &SchemaDescriptor)]) -> Result<()> {
        for (name, schema) in tables {
            self.create(name, schema).await?;
        }
        Ok(())
    }

    /// Delete a table; fails with `NotFound` when absent.
    pub async fn delete(&mut self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let table = self.catalog.store_name(name);
        let namespace = self.config.namespace.as_deref();
        self.store.drop_table(namespace, &table).await?;
        self.catalog.invalidate();
        info!("Deleted table {}", table);
        Ok(())
    }

    /// Delete every visible table, referencing tables before the tables
    /// they reference.
    pub async fn delete_all(&mut self) -> Result<()> {
        let mut remaining = Vec::new();
        for name in self.tables().await? {
            let table = self.catalog.store_name(&name);
            let referenced: Vec<String> = self
                .store
                .reflect_foreign_keys(self.namespace(), &table)
                .await?
                .into_iter()
                .map(|fk| fk.referenced_table)
                .filter(|referenced| *referenced != table)
                .collect();
            remaining.push((name, table, referenced));
        }

        while !remaining.is_empty() {
            // On a reference cycle the first delete reports the store's error.
            let next = remaining
                .iter()
                .position(|(_, table, _)| {
                    !remaining
                        .iter()
                        .any(|(_, _, referenced)| referenced.contains(table))
                })
                .unwrap_or(0);
            let (name, _, _) = remaining.remove(next);
            self.delete(&name).await?;
        }
        Ok(())
    }

    /// Reflect a table's descriptor from the store.
    pub async fn describe(&self, name: &str) -> Result<SchemaDescriptor> {
        let layout = self.reflect(name).await?;
        Ok(self.converter.columns_to_descriptor(name, &layout)?)
    }

    async fn reflect(&self, name: &str) -> Result<TableLayout> {
        let table = self.catalog.store_name(name);
        if self.catalog.logical_name(&table).is_none() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let columns = self.store.reflect_columns(self.namespace(), &table).await?;
        if columns.is_empty() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let primary_key = self
            .store
            .reflect_primary_key(self.namespace(), &table)
            .await?;
        let foreign_keys = self
            .store
            .reflect_foreign_keys(self.namespace(), &table)
            .await?;
        Ok(TableLayout {
            columns,
            primary_key,
            foreign_keys,
        })
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// All rows, each ordered as the table's described fields.
    pub async fn read(&self, name: &str) -> Result<Vec<Vec<Value>>> {
        let schema = self.describe(name).await?;
        let columns: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        let table = self.catalog.store_name(name);
        let rows = self
            .store
            .select(self.namespace(), &table, &columns, &[])
            .await?;
        debug!("Read {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Iterator over all rows; see [`Storage::read`].
    pub async fn iter(&self, name: &str) -> Result<std::vec::IntoIter<Vec<Value>>> {
        Ok(self.read(name).await?.into_iter())
    }

    /// Lazy writer over `rows`. Nothing is written until it is consumed, and
    /// no transaction is opened.
    pub async fn writer<I>(
        &mut self,
        name: &str,
        rows: I,
        options: WriteOptions,
    ) -> Result<RowWriter<'_, S, I::IntoIter>>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let layout = self.reflect(name).await?;
        let schema = self.converter.columns_to_descriptor(name, &layout)?;
        if let Some(keys) = &options.update_keys {
            validate_keys(name, &schema, keys)?;
        }

        let identity = self
            .converter
            .identity_column()
            .and_then(|id| layout.columns.iter().find(|c| c.name == id).cloned());
        let field_columns = layout
            .columns
            .into_iter()
            .filter(|c| Some(c.name.as_str()) != self.converter.identity_column())
            .collect();

        let target = WriteTarget {
            namespace: self.config.namespace.clone(),
            table: self.catalog.store_name(name),
            schema,
            columns: field_columns,
            identity,
        };
        Ok(RowWriter::new(
            &mut self.store,
            target,
            rows.into_iter(),
            options.update_keys,
            self.config.batch_size,
        ))
    }

    /// Write rows inside one transaction and return every outcome.
    ///
    /// On any error the transaction is rolled back and the table is left
    /// unchanged.
    pub async fn write<I>(
        &mut self,
        name: &str,
        rows: I,
        options: WriteOptions,
    ) -> Result<Vec<WriteOutcome>>
    where
        I: IntoIterator<Item = RawRow>,
    {
        self.store.begin().await?;
        let result = match self.writer(name, rows, options).await {
            Ok(writer) => writer.collect().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcomes) => {
                self.store.commit().await?;
                let updated = outcomes.iter().filter(|o| o.updated).count();
                info!(
                    "Wrote {} rows to {} ({} updated)",
                    outcomes.len(),
                    self.catalog.store_name(name),
                    updated
                );
                Ok(outcomes)
            }
            Err(e) => {
                warn!("Write to {} failed, rolling back: {}", name, e);
                if let Err(rollback_err) = self.store.rollback().await {
                    warn!("Rollback of write to {} failed: {}", name, rollback_err);
                }
                Err(e)
            }
        }
    }
}
