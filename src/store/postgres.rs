//! PostgreSQL store over `tokio-postgres`.

use async_trait::async_trait;
use postgresql_types::{
    postgresql_column_to_native_type, row_value, ForeignKeyClause, PostgreSQLDdl,
    PostgreSQLValue, ToDdl,
};
use tableschema_core::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};

use super::{
    ColumnValue, ForeignKeyDef, NativeColumn, RelationalStore, StoreError, TableLayout,
};

/// PostgreSQL limits a statement to 65535 bind parameters.
const MAX_PARAMETERS: usize = 65535;

const TABLE_NAMES_QUERY: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = COALESCE($1::text, current_schema()) AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const COLUMNS_QUERY: &str = "SELECT column_name::text, data_type::text, is_nullable::text \
     FROM information_schema.columns \
     WHERE table_schema = COALESCE($1::text, current_schema()) AND table_name = $2::text \
     ORDER BY ordinal_position";

const PRIMARY_KEY_QUERY: &str = "SELECT a.attname::text \
     FROM pg_index i \
     JOIN pg_class c ON c.oid = i.indrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) \
     JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum \
     WHERE i.indisprimary AND c.relname = $2::text \
       AND n.nspname = COALESCE($1::text, current_schema()) \
     ORDER BY k.ord";

/// One row per referencing column, grouped by constraint in creation order.
const FOREIGN_KEYS_QUERY: &str = "SELECT con.conname::text, a.attname::text, \
       rc.relname::text, ra.attname::text \
     FROM pg_constraint con \
     JOIN pg_class c ON c.oid = con.conrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_class rc ON rc.oid = con.confrelid \
     CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord) \
     JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
     JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refnum \
     WHERE con.contype = 'f' AND c.relname = $2::text \
       AND n.nspname = COALESCE($1::text, current_schema()) \
     ORDER BY con.oid, k.ord";

/// PostgreSQL implementation of [`RelationalStore`].
pub struct PostgresStore {
    client: Client,
    ddl: PostgreSQLDdl,
}

impl PostgresStore {
    /// Connect and spawn the connection task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = PostgresStore::connect(
    ///     "host=localhost user=postgres password=postgres dbname=testdb",
    /// ).await?;
    /// ```
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

        // Spawn the connection task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        // Test connection
        client.simple_query("SELECT 1").await?;

        Ok(Self::with_client(client))
    }

    /// Wrap an existing client whose connection is driven elsewhere.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            ddl: PostgreSQLDdl,
        }
    }

    fn qualified(&self, namespace: Option<&str>, table: &str) -> String {
        self.ddl.qualified_name(namespace, table)
    }
}

/// Convert values to boxed statement parameters.
fn to_params(
    values: impl IntoIterator<Item = ColumnValue>,
) -> Result<Vec<Box<dyn ToSql + Sync + Send>>, StoreError> {
    values
        .into_iter()
        .map(|cv| Ok(PostgreSQLValue::from_value(cv.value, cv.native_type)?.into_boxed()))
        .collect()
}

fn param_refs(params: &[Box<dyn ToSql + Sync + Send>]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn table_names(&self, namespace: Option<&str>) -> Result<Vec<String>, StoreError> {
        let rows = self.client.query(TABLE_NAMES_QUERY, &[&namespace]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(StoreError::from))
            .collect()
    }

    async fn create_table(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        layout: &TableLayout,
    ) -> Result<(), StoreError> {
        let columns: Vec<_> = layout
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.native_type, c.nullable))
            .collect();
        let foreign_keys: Vec<ForeignKeyClause> = layout
            .foreign_keys
            .iter()
            .map(|fk| ForeignKeyClause {
                columns: fk.columns.clone(),
                referenced_table: self.qualified(namespace, &fk.referenced_table),
                referenced_columns: fk.referenced_columns.clone(),
            })
            .collect();
        let sql = self.ddl.to_create_table(
            &self.qualified(namespace, table),
            &columns,
            &layout.primary_key,
            &foreign_keys,
        );
        info!("Creating table: {}", table);
        debug!("DDL: {}", sql);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn create_index(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        index_name: &str,
        columns: &[String],
    ) -> Result<(), StoreError> {
        let sql = self
            .ddl
            .to_create_index(index_name, &self.qualified(namespace, table), columns);
        debug!("DDL: {}", sql);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn drop_table(&mut self, namespace: Option<&str>, table: &str) -> Result<(), StoreError> {
        let sql = self.ddl.to_drop_table(&self.qualified(namespace, table));
        info!("Dropping table: {}", table);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn reflect_columns(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<NativeColumn>, StoreError> {
        let rows = self.client.query(COLUMNS_QUERY, &[&namespace, &table]).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            let is_nullable: String = row.try_get(2)?;
            let native_type = postgresql_column_to_native_type(&data_type)?;
            columns.push(NativeColumn::new(name, native_type, is_nullable == "YES"));
        }
        Ok(columns)
    }

    async fn reflect_primary_key(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, StoreError> {
        let rows = self
            .client
            .query(PRIMARY_KEY_QUERY, &[&namespace, &table])
            .await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(StoreError::from))
            .collect()
    }

    async fn reflect_foreign_keys(
        &self,
        namespace: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyDef>, StoreError> {
        let rows = self
            .client
            .query(FOREIGN_KEYS_QUERY, &[&namespace, &table])
            .await?;

        let mut foreign_keys: Vec<(String, ForeignKeyDef)> = Vec::new();
        for row in rows {
            let constraint: String = row.try_get(0)?;
            let column: String = row.try_get(1)?;
            let referenced_table: String = row.try_get(2)?;
            let referenced_column: String = row.try_get(3)?;
            match foreign_keys.last_mut() {
                Some((name, fk)) if *name == constraint => {
                    fk.columns.push(column);
                    fk.referenced_columns.push(referenced_column);
                }
                _ => foreign_keys.push((
                    constraint,
                    ForeignKeyDef {
                        columns: vec![column],
                        referenced_table,
                        referenced_columns: vec![referenced_column],
                    },
                )),
            }
        }
        Ok(foreign_keys.into_iter().map(|(_, fk)| fk).collect())
    }

    async fn select(
        &self,
        namespace: Option<&str>,
        table: &str,
        columns: &[String],
        filter: &[ColumnValue],
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let filter_columns: Vec<String> = filter.iter().map(|f| f.column.clone()).collect();
        let sql = self
            .ddl
            .to_select(&self.qualified(namespace, table), columns, &filter_columns);
        let params = to_params(filter.iter().cloned())?;
        debug!("Query: {}", sql);

        let rows = self.client.query(&sql, &param_refs(&params)).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = (0..row.len())
                .map(|idx| row_value(row, idx))
                .collect::<Result<Vec<_>, _>>()?;
            result.push(values);
        }
        Ok(result)
    }

    async fn max_value(
        &self,
        namespace: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<Option<i64>, StoreError> {
        let sql = self.ddl.to_max(&self.qualified(namespace, table), column);
        let row = self.client.query_one(&sql, &[]).await?;
        Ok(row_value(&row, 0)?.as_i64())
    }

    async fn insert(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        columns: &[NativeColumn],
        rows: Vec<Vec<Value>>,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }
        let qualified = self.qualified(namespace, table);
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let rows_per_statement = (MAX_PARAMETERS / columns.len()).max(1);

        let mut inserted = 0;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<Vec<Value>> = rows.by_ref().take(rows_per_statement).collect();
            let sql = self.ddl.to_insert(&qualified, &names, chunk.len());

            let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
                Vec::with_capacity(chunk.len() * columns.len());
            for row in chunk {
                for (column, value) in columns.iter().zip(row) {
                    params.push(PostgreSQLValue::from_value(value, column.native_type)?.into_boxed());
                }
            }

            inserted += self.client.execute(&sql, &param_refs(&params)).await?;
        }
        debug!("Inserted {} rows into {}", inserted, table);
        Ok(inserted)
    }

    async fn update(
        &mut self,
        namespace: Option<&str>,
        table: &str,
        assignments: &[ColumnValue],
        filter: &[ColumnValue],
    ) -> Result<u64, StoreError> {
        let assignment_columns: Vec<String> =
            assignments.iter().map(|a| a.column.clone()).collect();
        let filter_columns: Vec<String> = filter.iter().map(|f| f.column.clone()).collect();
        let sql = self.ddl.to_update(
            &self.qualified(namespace, table),
            &assignment_columns,
            &filter_columns,
        );
        let params = to_params(assignments.iter().chain(filter).cloned())?;
        debug!("Update: {}", sql);
        Ok(self.client.execute(&sql, &param_refs(&params)).await?)
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
