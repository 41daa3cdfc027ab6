use duckdb::types::Value as SqlValue;
use duckdb::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info};

use crate::db::db_pool::DbPool;
use crate::db::schema::ActiveScope;
use crate::db::{with_connection, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

/// Runs validated statements against the store bound to a scope.
#[derive(Clone)]
pub struct QueryExecutor {
    sample: DbPool,
    uploads: DbPool,
}

impl QueryExecutor {
    pub fn new(sample: DbPool, uploads: DbPool) -> Self {
        Self { sample, uploads }
    }

    pub async fn execute(&self, scope: &ActiveScope, sql: &str) -> Result<QueryOutput, StoreError> {
        let pool = match scope {
            ActiveScope::Default => &self.sample,
            ActiveScope::Uploaded(_) => &self.uploads,
        };

        let start_time = Instant::now();
        let statement = sql.to_string();
        let output = with_connection(pool, move |conn| {
            run_query(conn, &statement).map_err(|e| StoreError::QueryError(e.to_string()))
        })
        .await?;

        info!(
            "Query on '{}' returned {} rows in {}ms",
            scope.name(),
            output.row_count,
            start_time.elapsed().as_millis()
        );
        Ok(output)
    }
}

pub fn run_query(conn: &Connection, sql: &str) -> Result<QueryOutput, duckdb::Error> {
    debug!("Executing SQL: {}", sql);
    let mut stmt = conn.prepare(sql)?;

    let mut rows = Vec::new();
    {
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            let width = row.as_ref().column_count();
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(to_json(row.get::<_, SqlValue>(i)?));
            }
            rows.push(values);
        }
    }

    // Column metadata is only available once the statement has run
    let columns = stmt.column_names();
    Ok(QueryOutput {
        row_count: rows.len(),
        columns,
        rows,
    })
}

fn to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Boolean(b) => json!(b),
        SqlValue::TinyInt(i) => json!(i),
        SqlValue::SmallInt(i) => json!(i),
        SqlValue::Int(i) => json!(i),
        SqlValue::BigInt(i) => json!(i),
        SqlValue::HugeInt(i) => match i64::try_from(i) {
            Ok(small) => json!(small),
            Err(_) => json!(i.to_string()),
        },
        SqlValue::UTinyInt(i) => json!(i),
        SqlValue::USmallInt(i) => json!(i),
        SqlValue::UInt(i) => json!(i),
        SqlValue::UBigInt(i) => json!(i),
        SqlValue::Float(f) => json!(f),
        SqlValue::Double(f) => json!(f),
        SqlValue::Decimal(d) => json!(d.to_string()),
        SqlValue::Text(s) => json!(s),
        SqlValue::List(items) => Value::Array(items.into_iter().map(to_json).collect()),
        other => json!(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::{build_pool, DuckDBConnectionManager};
    use crate::db::sample::ensure_sample_data;

    fn executor() -> QueryExecutor {
        let sample = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        ensure_sample_data(&sample.get().unwrap()).unwrap();
        let uploads = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        uploads
            .get()
            .unwrap()
            .execute_batch("CREATE TABLE notes (body VARCHAR); INSERT INTO notes VALUES ('hi'), (NULL);")
            .unwrap();
        QueryExecutor::new(sample, uploads)
    }

    #[tokio::test]
    async fn returns_columns_and_rows() {
        let output = executor()
            .execute(
                &ActiveScope::Default,
                "SELECT name, price FROM products ORDER BY price DESC LIMIT 2",
            )
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["name", "price"]);
        assert_eq!(output.row_count, 2);
        assert_eq!(output.rows[0], vec![json!("Laptop Pro 15"), json!(1299.99)]);
    }

    #[tokio::test]
    async fn uploaded_scope_reads_uploads_store() {
        let output = executor()
            .execute(&ActiveScope::Uploaded("notes".into()), "SELECT body FROM notes ORDER BY body")
            .await
            .unwrap();
        assert_eq!(output.rows, vec![vec![json!("hi")], vec![Value::Null]]);
    }

    #[tokio::test]
    async fn empty_result_still_reports_columns() {
        let output = executor()
            .execute(&ActiveScope::Default, "SELECT id, email FROM customers WHERE id < 0")
            .await
            .unwrap();
        assert_eq!(output.columns, vec!["id", "email"]);
        assert!(output.rows.is_empty());
    }

    #[tokio::test]
    async fn engine_errors_surface_verbatim() {
        let err = executor()
            .execute(&ActiveScope::Default, "SELECT product_id FROM products")
            .await
            .unwrap_err();
        match err {
            StoreError::QueryError(msg) => assert!(msg.contains("product_id"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }
    }
}
