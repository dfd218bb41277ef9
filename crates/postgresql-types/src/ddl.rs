//! PostgreSQL SQL generation from NativeType.
//!
//! This module generates the statements the PostgreSQL store issues: table
//! DDL from `NativeType` column lists, and the parameterized DML used by the
//! read and write paths. Table names passed in are already qualified and
//! quoted (see [`PostgreSQLDdl::qualified_name`]); column names are quoted
//! here.

use tableschema_core::NativeType;

/// Trait for generating DDL type strings.
pub trait ToDdl {
    /// Convert a NativeType to a DDL type string.
    fn to_ddl(&self, native_type: &NativeType) -> String;

    /// Generate a complete CREATE TABLE statement.
    fn to_create_table(
        &self,
        table_name: &str,
        columns: &[(String, NativeType, bool)],
        primary_key: &[String],
        foreign_keys: &[ForeignKeyClause],
    ) -> String;
}

/// A `FOREIGN KEY ... REFERENCES` table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyClause {
    pub columns: Vec<String>,
    /// Qualified and quoted referenced table
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// PostgreSQL DDL generator.
pub struct PostgreSQLDdl;

impl ToDdl for PostgreSQLDdl {
    fn to_ddl(&self, native_type: &NativeType) -> String {
        match native_type {
            NativeType::Text => "TEXT".to_string(),
            NativeType::Varchar => "VARCHAR".to_string(),
            NativeType::Uuid => "UUID".to_string(),
            NativeType::Integer => "INTEGER".to_string(),
            NativeType::BigInt => "BIGINT".to_string(),
            NativeType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            NativeType::Boolean => "BOOLEAN".to_string(),
            NativeType::Json => "JSON".to_string(),
            NativeType::Jsonb => "JSONB".to_string(),
            NativeType::Date => "DATE".to_string(),
            NativeType::Time => "TIME".to_string(),
            NativeType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn to_create_table(
        &self,
        table_name: &str,
        columns: &[(String, NativeType, bool)],
        primary_key: &[String],
        foreign_keys: &[ForeignKeyClause],
    ) -> String {
        let mut column_defs: Vec<String> = columns
            .iter()
            .map(|(name, dtype, nullable)| {
                let null_clause = if *nullable { "NULL" } else { "NOT NULL" };
                format!(
                    "  {} {} {}",
                    quote_identifier(name),
                    self.to_ddl(dtype),
                    null_clause
                )
            })
            .collect();

        if !primary_key.is_empty() {
            column_defs.push(format!("  PRIMARY KEY ({})", quote_list(primary_key)));
        }
        for fk in foreign_keys {
            column_defs.push(format!(
                "  FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_list(&fk.columns),
                fk.referenced_table,
                quote_list(&fk.referenced_columns)
            ));
        }

        format!("CREATE TABLE {} (\n{}\n)", table_name, column_defs.join(",\n"))
    }
}

impl PostgreSQLDdl {
    /// Quoted, optionally schema-qualified table name.
    pub fn qualified_name(&self, namespace: Option<&str>, table_name: &str) -> String {
        match namespace {
            Some(ns) => format!("{}.{}", quote_identifier(ns), quote_identifier(table_name)),
            None => quote_identifier(table_name),
        }
    }

    /// Generate DROP TABLE statement.
    pub fn to_drop_table(&self, table_name: &str) -> String {
        format!("DROP TABLE {table_name}")
    }

    /// Generate CREATE INDEX statement.
    pub fn to_create_index(&self, index_name: &str, table_name: &str, columns: &[String]) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            quote_identifier(index_name),
            table_name,
            quote_list(columns)
        )
    }

    /// Generate a multi-row INSERT statement with `$n` placeholders.
    pub fn to_insert(&self, table_name: &str, columns: &[String], row_count: usize) -> String {
        let col_count = columns.len();
        let mut param_idx = 1;
        let mut rows: Vec<String> = Vec::with_capacity(row_count);

        for _ in 0..row_count {
            let placeholders: Vec<String> = (0..col_count)
                .map(|_| {
                    let p = format!("${param_idx}");
                    param_idx += 1;
                    p
                })
                .collect();
            rows.push(format!("({})", placeholders.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            table_name,
            quote_list(columns),
            rows.join(", ")
        )
    }

    /// Generate a SELECT of the given columns filtered by null-safe equality.
    ///
    /// Filter placeholders are numbered from `$1` in `filter` order.
    pub fn to_select(&self, table_name: &str, columns: &[String], filter: &[String]) -> String {
        let mut sql = format!("SELECT {} FROM {}", quote_list(columns), table_name);
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(filter, 1));
        }
        sql
    }

    /// Generate an UPDATE setting `assignments` where `filter` matches.
    ///
    /// Assignment placeholders come first, filter placeholders follow.
    pub fn to_update(&self, table_name: &str, assignments: &[String], filter: &[String]) -> String {
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ${}", quote_identifier(column), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {table_name} SET {set_clause}");
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(filter, assignments.len() + 1));
        }
        sql
    }

    /// Generate a SELECT MAX of one column.
    pub fn to_max(&self, table_name: &str, column: &str) -> String {
        format!("SELECT MAX({}) FROM {}", quote_identifier(column), table_name)
    }
}

fn where_clause(filter: &[String], first_param: usize) -> String {
    filter
        .iter()
        .enumerate()
        .map(|(i, column)| {
            format!(
                "{} IS NOT DISTINCT FROM ${}",
                quote_identifier(column),
                first_param + i
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
