pub mod db_pool;
pub mod executor;
pub mod sample;
pub mod schema;
pub mod schema_provider;
pub mod uploads;

use duckdb::Connection;
use std::error::Error;
use std::fmt;

use crate::db::db_pool::DbPool;

#[derive(Debug)]
pub enum StoreError {
    /// No connection could be checked out of the pool
    PoolError(String),
    /// The engine rejected the statement (unknown column, syntax, ...)
    QueryError(String),
    /// Storage level failure outside of a user statement
    DatabaseError(String),
    NotFound(String),
    TaskError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::PoolError(msg) => write!(f, "Connection pool error: {}", msg),
            StoreError::QueryError(msg) => write!(f, "SQL Error: {}", msg),
            StoreError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            StoreError::NotFound(name) => write!(f, "Table not found: {}", name),
            StoreError::TaskError(msg) => write!(f, "Database task failed: {}", msg),
        }
    }
}

impl Error for StoreError {}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::PoolError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskError(err.to_string())
    }
}

/// Runs `f` against a pooled connection on the blocking thread pool.
pub async fn with_connection<T, F>(pool: &DbPool, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        f(&conn)
    })
    .await?
}

/// Double-quotes an identifier for interpolation into DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Checks whether `name` is a base table in the `main` schema.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, duckdb::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'main' AND table_name = ?",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn table_exists_reports_main_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE sales (id INTEGER)").unwrap();
        assert!(table_exists(&conn, "sales").unwrap());
        assert!(!table_exists(&conn, "missing").unwrap());
    }
}
