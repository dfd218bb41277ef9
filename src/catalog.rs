//! Cached listing of the logical tables visible through a storage handle.

use tracing::debug;

use crate::config::TableFilter;
use crate::store::{RelationalStore, StoreError};

/// Logical table names present in the store.
///
/// A store table is visible when its name starts with the prefix and passes
/// the filter (applied to the store-visible name). The listing is cached
/// until [`TableCatalog::invalidate`]; mutations made through other handles
/// are not observed until then.
pub struct TableCatalog {
    prefix: String,
    filter: Option<TableFilter>,
    cache: Option<Vec<String>>,
}

impl TableCatalog {
    pub fn new(prefix: impl Into<String>, filter: Option<TableFilter>) -> Self {
        Self {
            prefix: prefix.into(),
            filter,
            cache: None,
        }
    }

    /// Store-visible name of a logical table.
    pub fn store_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Logical name of a store table, `None` when it is not visible.
    pub fn logical_name<'a>(&self, store_name: &'a str) -> Option<&'a str> {
        let logical = store_name.strip_prefix(self.prefix.as_str())?;
        match &self.filter {
            Some(filter) if !filter(store_name) => None,
            _ => Some(logical),
        }
    }

    /// Sorted logical names, fetched from the store on a cache miss.
    pub async fn list_tables<S: RelationalStore + ?Sized>(
        &mut self,
        store: &S,
        namespace: Option<&str>,
    ) -> Result<&[String], StoreError> {
        if self.cache.is_none() {
            let mut names: Vec<String> = store
                .table_names(namespace)
                .await?
                .iter()
                .filter_map(|table| self.logical_name(table).map(str::to_string))
                .collect();
            names.sort();
            debug!("Catalog refreshed: {} tables", names.len());
            self.cache = Some(names);
        }
        Ok(self.cache.as_deref().unwrap_or_default())
    }

    pub async fn exists<S: RelationalStore + ?Sized>(
        &mut self,
        store: &S,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, StoreError> {
        let tables = self.list_tables(store, namespace).await?;
        Ok(tables.iter().any(|t| t == name))
    }

    /// Drop the cached listing.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}
