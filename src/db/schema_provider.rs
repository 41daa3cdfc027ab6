use duckdb::Connection;
use std::error::Error;
use std::fmt;
use tracing::{debug, info};

use crate::db::db_pool::DbPool;
use crate::db::sample::SAMPLE_TABLES;
use crate::db::schema::{ActiveScope, ColumnInfo, SchemaDescription, TableInfo};
use crate::db::{quote_ident, table_exists, with_connection, StoreError};

#[derive(Debug)]
pub enum SchemaError {
    SchemaNotFound(String),
    Store(StoreError),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::SchemaNotFound(table) => write!(f, "Schema not found for table: {}", table),
            SchemaError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl Error for SchemaError {}

impl From<StoreError> for SchemaError {
    fn from(err: StoreError) -> Self {
        SchemaError::Store(err)
    }
}

/// Introspects whichever store backs a scope.
#[derive(Clone)]
pub struct SchemaProvider {
    sample: DbPool,
    uploads: DbPool,
}

impl SchemaProvider {
    pub fn new(sample: DbPool, uploads: DbPool) -> Self {
        Self { sample, uploads }
    }

    pub async fn describe(&self, scope: &ActiveScope) -> Result<SchemaDescription, SchemaError> {
        match scope {
            ActiveScope::Default => {
                let tables = with_connection(&self.sample, |conn| {
                    SAMPLE_TABLES
                        .iter()
                        .map(|name| introspect_table(conn, name).map_err(StoreError::from))
                        .collect::<Result<Vec<_>, _>>()
                })
                .await?;

                debug!("Described default scope with {} tables", tables.len());
                Ok(SchemaDescription { tables })
            }
            ActiveScope::Uploaded(table) => {
                let name = table.clone();
                let described = with_connection(&self.uploads, move |conn| {
                    if !table_exists(conn, &name)? {
                        return Ok(None);
                    }
                    Ok(Some(introspect_table(conn, &name)?))
                })
                .await?;

                match described {
                    Some(info) => {
                        info!("Described uploaded table {} ({} columns)", info.name, info.columns.len());
                        Ok(SchemaDescription { tables: vec![info] })
                    }
                    None => Err(SchemaError::SchemaNotFound(table.clone())),
                }
            }
        }
    }
}

/// Reads one table's columns in native order from `PRAGMA table_info`.
pub fn introspect_table(conn: &Connection, table: &str) -> Result<TableInfo, duckdb::Error> {
    let pragma = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&pragma)?;

    let columns = stmt
        .query_map([], |row| {
            // pk is a BOOLEAN in recent DuckDB releases, an integer in older ones
            let is_primary_key = match row.get::<_, bool>(5) {
                Ok(value) => value,
                Err(_) => row.get::<_, i32>(5)? != 0,
            };

            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
                is_primary_key,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TableInfo {
        name: table.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::{build_pool, DuckDBConnectionManager};
    use crate::db::sample::ensure_sample_data;

    fn provider() -> SchemaProvider {
        let sample = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        ensure_sample_data(&sample.get().unwrap()).unwrap();
        let uploads = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        uploads
            .get()
            .unwrap()
            .execute_batch("CREATE TABLE sales (region VARCHAR, amount DOUBLE, units BIGINT)")
            .unwrap();
        SchemaProvider::new(sample, uploads)
    }

    #[tokio::test]
    async fn default_scope_lists_fixed_tables() {
        let schema = provider().describe(&ActiveScope::Default).await.unwrap();
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders", "products"]);

        let orders = &schema.tables[1];
        assert_eq!(orders.columns[0].name, "id");
        assert!(orders.columns[0].is_primary_key);
        assert_eq!(orders.columns[1].name, "customer_id");
        assert!(!orders.columns[1].is_primary_key);
    }

    #[tokio::test]
    async fn uploaded_scope_keeps_native_column_order() {
        let schema = provider()
            .describe(&ActiveScope::Uploaded("sales".to_string()))
            .await
            .unwrap();

        assert_eq!(schema.tables.len(), 1);
        let columns: Vec<_> = schema.tables[0]
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.declared_type.as_str()))
            .collect();
        assert_eq!(columns, vec![("region", "VARCHAR"), ("amount", "DOUBLE"), ("units", "BIGINT")]);
    }

    #[tokio::test]
    async fn missing_upload_is_schema_not_found() {
        let err = provider()
            .describe(&ActiveScope::Uploaded("gone".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::SchemaNotFound(ref t) if t == "gone"));
    }
}
