//! SQLite sink for converted tables and the query surface reports run on.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};

use crate::convert::schema::TableSchema;
use crate::core::types::{DecodedRow, ScalarValue};

/// The destination relational store.
///
/// Table and column identifiers interpolated into SQL here come from the
/// schema resolver's controlled vocabulary; row values always go through
/// parameter binding.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open the destination database file.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Self::configure(conn)
    }

    /// Open an existing database, failing when the file is missing.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("database does not exist: {}", path.display());
        }
        Self::create(path)
    }

    /// An in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA busy_timeout = 10000;")
            .context("failed to configure sqlite pragmas")?;
        Ok(Self { conn })
    }

    /// Emit idempotent DDL for a destination table. A second call with the
    /// same schema is a no-op; a rejected statement is fatal and the
    /// diagnostic carries the generated SQL.
    pub fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let ddl = render_create_table(schema);
        self.conn
            .execute_batch(&ddl)
            .with_context(|| format!("create-table DDL rejected: {ddl}"))
    }

    /// Insert a batch of rows, binding exactly the schema's column order per
    /// row; keys absent from a row bind null. Duplicate-key conflicts are
    /// ignored; any other failure aborts the batch naming the row and SQL.
    /// The batch commits once, after the last row.
    pub fn insert_batch(&mut self, schema: &TableSchema, rows: &[DecodedRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = render_insert(schema);
        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("failed to start insert batch for {:?}", schema.name))?;
        let mut inserted = 0usize;
        let null = ScalarValue::Null;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("failed to prepare insert: {sql}"))?;
            for (index, row) in rows.iter().enumerate() {
                let bound = schema
                    .order
                    .iter()
                    .map(|column| row.get(column).unwrap_or(&null));
                inserted += stmt
                    .execute(params_from_iter(bound))
                    .with_context(|| format!("insert failed for row {index}: {sql}"))?;
            }
        }
        tx.commit()
            .with_context(|| format!("failed to commit insert batch for {:?}", schema.name))?;
        Ok(inserted)
    }

    /// Run a query and stream each row through `sink` together with the
    /// ordered column names; returns those names. Single forward pass; a
    /// restart means re-issuing the query.
    pub fn query_into(
        &self,
        sql: &str,
        sink: &mut dyn FnMut(&[String], Vec<ScalarValue>) -> Result<()>,
    ) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("failed to prepare query: {sql}"))?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
        let width = names.len();

        let mut rows = stmt
            .query([])
            .with_context(|| format!("query failed: {sql}"))?;
        while let Some(row) = rows.next().with_context(|| format!("query failed: {sql}"))? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(scalar_from_sql(row.get_ref(index)?));
            }
            sink(&names, values)?;
        }
        Ok(names)
    }

    /// Register the scalar SQL helpers report queries may call.
    ///
    /// `basename(path)` strips everything up to the last path separator,
    /// accepting both Windows and POSIX separators.
    pub fn register_report_functions(&self) -> Result<()> {
        self.conn
            .create_scalar_function(
                "basename",
                1,
                FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                |ctx| {
                    // Null propagates.
                    let value: Option<String> = ctx.get(0)?;
                    Ok(value.map(|v| {
                        v.rsplit(['\\', '/']).next().unwrap_or_default().to_string()
                    }))
                },
            )
            .context("failed to register basename()")
    }
}

fn scalar_from_sql(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(v) => ScalarValue::Integer(v),
        ValueRef::Real(v) => ScalarValue::Real(v),
        ValueRef::Text(t) => ScalarValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => ScalarValue::Blob(b.to_vec()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn render_create_table(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .order
        .iter()
        .map(|name| {
            let class = schema
                .types
                .get(name)
                .map(|c| c.as_sql())
                .unwrap_or("BLOB");
            format!("{} {}", quote_ident(name), class)
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_ident(&schema.name),
        columns.join(", ")
    )
}

fn render_insert(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema.order.iter().map(|n| quote_ident(n)).collect();
    let placeholders: Vec<&str> = schema.order.iter().map(|_| "?").collect();
    format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
        quote_ident(&schema.name),
        columns.join(", "),
        placeholders.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ColumnKind, SourceColumn, StorageClass};
    use chrono::NaiveDate;

    fn sample_schema() -> TableSchema {
        TableSchema::from_columns(
            "NetworkUsageData",
            &[
                SourceColumn::new("AutoIncId", ColumnKind::I32),
                SourceColumn::new("TimeStamp", ColumnKind::DateTime),
                SourceColumn::new("BytesSent", ColumnKind::I64),
                SourceColumn::new("Payload", ColumnKind::Binary),
            ],
        )
    }

    fn row(id: i64, bytes_sent: Option<i64>) -> DecodedRow {
        let mut row = DecodedRow::new();
        row.insert("AutoIncId".to_string(), ScalarValue::Integer(id));
        row.insert(
            "TimeStamp".to_string(),
            ScalarValue::DateTime(
                NaiveDate::from_ymd_opt(2015, 6, 1)
                    .and_then(|d| d.and_hms_opt(10, 30, 0))
                    .unwrap(),
            ),
        );
        if let Some(v) = bytes_sent {
            row.insert("BytesSent".to_string(), ScalarValue::Integer(v));
        }
        row
    }

    #[test]
    fn roundtrip_preserves_order_values_and_nulls() -> Result<()> {
        let mut store = SqliteStore::in_memory()?;
        let schema = sample_schema();
        store.create_table(&schema)?;

        // Second row has no BytesSent key and no Payload anywhere.
        store.insert_batch(&schema, &[row(1, Some(42)), row(2, None)])?;

        let mut seen = Vec::new();
        let names = store.query_into("SELECT * FROM 'NetworkUsageData'", &mut |_, values| {
            seen.push(values);
            Ok(())
        })?;

        assert_eq!(names, vec!["AutoIncId", "TimeStamp", "BytesSent", "Payload"]);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][0], ScalarValue::Integer(1));
        assert_eq!(
            seen[0][1],
            ScalarValue::Text("2015-06-01 10:30:00.000000".to_string())
        );
        assert_eq!(seen[0][2], ScalarValue::Integer(42));
        assert_eq!(seen[0][3], ScalarValue::Null);
        assert_eq!(seen[1][2], ScalarValue::Null);
        Ok(())
    }

    #[test]
    fn create_table_is_idempotent() -> Result<()> {
        let mut store = SqliteStore::in_memory()?;
        let schema = sample_schema();
        store.create_table(&schema)?;
        store.insert_batch(&schema, &[row(1, Some(7))])?;

        store.create_table(&schema)?;

        let mut count = 0usize;
        store.query_into("SELECT * FROM 'NetworkUsageData'", &mut |_, _| {
            count += 1;
            Ok(())
        })?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn malformed_ddl_surfaces_the_statement() {
        let store = SqliteStore::in_memory().unwrap();
        let schema = TableSchema {
            name: "Broken".to_string(),
            order: vec![],
            types: Default::default(),
        };
        let err = store.create_table(&schema).unwrap_err();
        assert!(format!("{err:#}").contains("CREATE TABLE IF NOT EXISTS"));
    }

    #[test]
    fn conflicting_rows_are_ignored_not_fatal() -> Result<()> {
        let mut store = SqliteStore::in_memory()?;
        let schema = TableSchema {
            name: "Keys".to_string(),
            order: vec!["Id".to_string()],
            types: [("Id".to_string(), StorageClass::Integer)].into_iter().collect(),
        };
        store
            .conn
            .execute_batch("CREATE TABLE IF NOT EXISTS 'Keys' ('Id' INTEGER PRIMARY KEY);")?;

        let mut row_a = DecodedRow::new();
        row_a.insert("Id".to_string(), ScalarValue::Integer(1));
        let inserted = store.insert_batch(&schema, &[row_a.clone(), row_a])?;
        assert_eq!(inserted, 1);
        Ok(())
    }

    #[test]
    fn basename_function_is_available_to_queries() -> Result<()> {
        let store = SqliteStore::in_memory()?;
        store.register_report_functions()?;
        let mut values = Vec::new();
        store.query_into(
            "SELECT basename('C:\\Program Files\\app.exe'), basename('/usr/bin/ls')",
            &mut |_, row| {
                values = row;
                Ok(())
            },
        )?;
        assert_eq!(values[0], ScalarValue::Text("app.exe".to_string()));
        assert_eq!(values[1], ScalarValue::Text("ls".to_string()));
        Ok(())
    }
}
