use duckdb::{params_from_iter, Connection};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info};

use crate::db::db_pool::DbPool;
use crate::db::schema::ActiveScope;
use crate::db::{quote_ident, table_exists, with_connection, StoreError};
use crate::ingest::schema::{Frame, SqlType};

const MAX_TABLE_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedTable {
    pub name: String,
    pub display_name: String,
    pub row_count: i64,
    pub column_count: i64,
}

/// Tables materialized from uploaded files.
#[derive(Clone)]
pub struct TableStore {
    pool: DbPool,
}

impl TableStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces `table_name` with the frame's contents.
    pub async fn materialize(
        &self,
        table_name: &str,
        frame: Frame,
        column_types: Vec<SqlType>,
    ) -> Result<(), StoreError> {
        let table_name = table_name.to_string();
        with_connection(&self.pool, move |conn| {
            conn.execute_batch("BEGIN TRANSACTION")?;
            match write_table(conn, &table_name, &frame, &column_types) {
                Ok(()) => {
                    conn.execute_batch("COMMIT")?;
                    info!("Inserted {} rows into {}", frame.rows.len(), table_name);
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to create table {}: {}", table_name, e);
                    if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                        error!("Rollback failed: {}", rollback);
                    }
                    Err(e.into())
                }
            }
        })
        .await
    }

    pub async fn list(&self) -> Result<Vec<UploadedTable>, StoreError> {
        with_connection(&self.pool, |conn| {
            let names: Vec<String> = conn
                .prepare(
                    "SELECT table_name FROM information_schema.tables \
                     WHERE table_schema = 'main' ORDER BY table_name",
                )?
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            let mut tables = Vec::with_capacity(names.len());
            for name in names {
                let row_count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
                    [],
                    |row| row.get(0),
                )?;
                let column_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM information_schema.columns \
                     WHERE table_schema = 'main' AND table_name = ?",
                    [&name],
                    |row| row.get(0),
                )?;
                tables.push(UploadedTable {
                    display_name: display_name(&name),
                    name,
                    row_count,
                    column_count,
                });
            }
            Ok(tables)
        })
        .await
    }

    pub async fn exists(&self, table_name: &str) -> Result<bool, StoreError> {
        let name = table_name.to_string();
        with_connection(&self.pool, move |conn| Ok(table_exists(conn, &name)?)).await
    }

    pub async fn drop_table(&self, table_name: &str) -> Result<(), StoreError> {
        let name = table_name.to_string();
        with_connection(&self.pool, move |conn| {
            if !table_exists(conn, &name)? {
                return Err(StoreError::NotFound(name));
            }
            conn.execute_batch(&format!("DROP TABLE {}", quote_ident(&name)))?;
            info!("Deleted table: {}", name);
            Ok(())
        })
        .await
    }
}

fn write_table(
    conn: &Connection,
    table_name: &str,
    frame: &Frame,
    column_types: &[SqlType],
) -> Result<(), duckdb::Error> {
    let table = quote_ident(table_name);
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;

    let definitions: Vec<String> = frame
        .columns
        .iter()
        .zip(column_types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.to_sql_type()))
        .collect();
    conn.execute_batch(&format!("CREATE TABLE {} ({})", table, definitions.join(", ")))?;
    info!("Created table: {}", table_name);

    let placeholders = vec!["?"; frame.columns.len()].join(", ");
    let mut stmt = conn.prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))?;
    for row in &frame.rows {
        stmt.execute(params_from_iter(
            row.iter().zip(column_types).map(|(cell, ty)| cell.to_sql_value(*ty)),
        ))?;
    }
    Ok(())
}

fn invalid_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]").expect("valid regex"))
}

/// Derives a safe table name from an uploaded file name.
pub fn sanitize_table_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut name = invalid_chars().replace_all(stem, "_").into_owned();
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        name = format!("table_{}", name);
    }

    let name = name.chars().take(MAX_TABLE_NAME_LEN).collect::<String>().to_lowercase();
    if name == ActiveScope::DEFAULT_NAME {
        return format!("table_{}", name);
    }
    name
}

/// "sales_2024_q1" -> "Sales 2024 Q1"
pub fn display_name(table_name: &str) -> String {
    table_name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::{build_pool, DuckDBConnectionManager};
    use crate::ingest::schema::Cell;

    fn store() -> TableStore {
        TableStore::new(build_pool(DuckDBConnectionManager::in_memory().unwrap(), 2).unwrap())
    }

    fn frame() -> (Frame, Vec<SqlType>) {
        let frame = Frame::new(
            vec!["region".into(), "amount".into(), "units".into()],
            vec![
                vec![Cell::Text("north".into()), Cell::Real(10.5), Cell::Integer(3)],
                vec![Cell::Text("south".into()), Cell::Integer(4), Cell::Null],
            ],
        );
        let types = frame.column_types();
        (frame, types)
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_table_name("Sales Report-2024.csv"), "sales_report_2024");
        assert_eq!(sanitize_table_name("2024 data.xlsx"), "table_2024_data");
        assert_eq!(sanitize_table_name("_hidden.json"), "table__hidden");
        assert_eq!(sanitize_table_name(&format!("{}.csv", "a".repeat(80))).len(), 50);
        assert_eq!(sanitize_table_name("Default.csv"), "table_default");
        assert_eq!(sanitize_table_name("default_sales.csv"), "default_sales");
    }

    #[test]
    fn display_names_are_title_cased() {
        assert_eq!(display_name("sales_report_2024"), "Sales Report 2024");
        assert_eq!(display_name("table__x"), "Table  X");
    }

    #[tokio::test]
    async fn materialize_list_and_drop() {
        let store = store();
        let (frame, types) = frame();
        store.materialize("sales", frame, types).await.unwrap();

        let tables = store.list().await.unwrap();
        assert_eq!(
            tables,
            vec![UploadedTable {
                name: "sales".into(),
                display_name: "Sales".into(),
                row_count: 2,
                column_count: 3,
            }]
        );

        store.drop_table("sales").await.unwrap();
        assert!(!store.exists("sales").await.unwrap());
        assert!(matches!(store.drop_table("sales").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn materialize_replaces_existing_table() {
        let store = store();
        let (frame, types) = frame();
        store.materialize("sales", frame.clone(), types.clone()).await.unwrap();

        let smaller = Frame::new(frame.columns.clone(), frame.rows[..1].to_vec());
        store.materialize("sales", smaller, types).await.unwrap();

        let tables = store.list().await.unwrap();
        assert_eq!(tables[0].row_count, 1);
    }
}
