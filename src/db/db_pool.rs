use duckdb::{Config, Connection};
use r2d2::{ManageConnection, Pool};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub type DbPool = Pool<DuckDBConnectionManager>;

/// Hands out connections to a single DuckDB database instance.
///
/// DuckDB only tolerates one read-write instance per file inside a process,
/// so every pooled connection is cloned from the instance opened here.
pub struct DuckDBConnectionManager {
    label: String,
    root: Mutex<Connection>,
}

/// Queries reach this instance from the network, so table functions that read
/// or write host files (`read_csv`, `read_text`, `COPY`, `ATTACH`) are disabled
/// and the setting cannot be changed from a session.
fn locked_down() -> Result<Config, duckdb::Error> {
    Config::default()
        .enable_external_access(false)?
        .with("lock_configuration", "true")
}

impl DuckDBConnectionManager {
    pub fn open(path: &Path) -> Result<Self, duckdb::Error> {
        debug!("Opening DuckDB database at {}", path.display());
        Ok(Self {
            label: path.display().to_string(),
            root: Mutex::new(Connection::open_with_flags(path, locked_down()?)?),
        })
    }

    pub fn in_memory() -> Result<Self, duckdb::Error> {
        Ok(Self {
            label: ":memory:".to_string(),
            root: Mutex::new(Connection::open_in_memory_with_flags(locked_down()?)?),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub fn build_pool(manager: DuckDBConnectionManager, size: u32) -> Result<DbPool, r2d2::Error> {
    debug!("Building pool of {} connections for {}", size, manager.label());
    Pool::builder().max_size(size.max(1)).build(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_connections_share_one_instance() {
        let pool = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 2).unwrap();
        pool.get()
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        let other = pool.get().unwrap();
        let x: i64 = other.query_row("SELECT x FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn host_files_are_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, "token").unwrap();

        let pool = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        let conn = pool.get().unwrap();
        let sql = format!("SELECT content FROM read_text('{}')", secret.display());
        assert!(conn.query_row(&sql, [], |row| row.get::<_, String>(0)).is_err());
        assert!(conn.execute_batch("SET enable_external_access = true").is_err());
    }
}
