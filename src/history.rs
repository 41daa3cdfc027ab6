use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::db::db_pool::DbPool;
use crate::db::{with_connection, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub id: Uuid,
    pub question: String,
    pub sql: String,
    pub timestamp: DateTime<Utc>,
}

impl QueryHistoryEntry {
    pub fn new(question: String, sql: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            sql,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub enum HistoryError {
    Store(StoreError),
    Corrupt(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Store(err) => write!(f, "History store error: {}", err),
            HistoryError::Corrupt(msg) => write!(f, "Corrupt history entry: {}", msg),
        }
    }
}

impl Error for HistoryError {}

impl From<StoreError> for HistoryError {
    fn from(err: StoreError) -> Self {
        HistoryError::Store(err)
    }
}

/// Append-only record of executed questions, newest first on read.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, question: String, sql: String) -> Result<QueryHistoryEntry, HistoryError>;

    async fn recent(&self, limit: usize) -> Result<Vec<QueryHistoryEntry>, HistoryError>;
}

pub struct InMemoryHistory {
    entries: Mutex<VecDeque<QueryHistoryEntry>>,
    capacity: usize,
}

impl InMemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, question: String, sql: String) -> Result<QueryHistoryEntry, HistoryError> {
        let entry = QueryHistoryEntry::new(question, sql);
        let mut entries = self.entries.lock().await;
        entries.push_back(entry.clone());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueryHistoryEntry>, HistoryError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

const CREATE_HISTORY_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS query_history (
        seq BIGINT PRIMARY KEY,
        id VARCHAR NOT NULL,
        question VARCHAR NOT NULL,
        sql_text VARCHAR NOT NULL,
        created_at VARCHAR NOT NULL
    )
";

/// History persisted in its own DuckDB file, pruned to `capacity` rows.
pub struct DuckDbHistory {
    pool: DbPool,
    capacity: usize,
}

impl DuckDbHistory {
    pub fn open(pool: DbPool, capacity: usize) -> Result<Self, HistoryError> {
        let conn = pool.get().map_err(StoreError::from)?;
        conn.execute_batch(CREATE_HISTORY_TABLE_SQL).map_err(StoreError::from)?;
        Ok(Self { pool, capacity })
    }
}

#[async_trait]
impl HistoryStore for DuckDbHistory {
    async fn append(&self, question: String, sql: String) -> Result<QueryHistoryEntry, HistoryError> {
        let entry = QueryHistoryEntry::new(question, sql);
        let row = entry.clone();
        let capacity = self.capacity as i64;

        with_connection(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO query_history \
                 SELECT COALESCE(MAX(seq), 0) + 1, ?::VARCHAR, ?::VARCHAR, ?::VARCHAR, ?::VARCHAR FROM query_history",
                [
                    row.id.to_string(),
                    row.question,
                    row.sql,
                    row.timestamp.to_rfc3339(),
                ],
            )?;
            let evicted = conn.execute(
                "DELETE FROM query_history WHERE seq <= (SELECT MAX(seq) FROM query_history) - ?::BIGINT",
                [capacity],
            )?;
            if evicted > 0 {
                debug!("Evicted {} history entries", evicted);
            }
            Ok(())
        })
        .await?;

        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueryHistoryEntry>, HistoryError> {
        let limit = limit as i64;
        let rows = with_connection(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question, sql_text, created_at FROM query_history ORDER BY seq DESC LIMIT ?",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;

        rows.into_iter()
            .map(|(id, question, sql, timestamp)| {
                Ok(QueryHistoryEntry {
                    id: Uuid::parse_str(&id).map_err(|e| HistoryError::Corrupt(e.to_string()))?,
                    question,
                    sql,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| HistoryError::Corrupt(e.to_string()))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::{build_pool, DuckDBConnectionManager};

    async fn fill(store: &dyn HistoryStore, count: usize) {
        for i in 0..count {
            store
                .append(format!("question {}", i), format!("SELECT {}", i))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn in_memory_keeps_newest_fifty() {
        let store = InMemoryHistory::new(50);
        fill(&store, 51).await;

        let entries = store.recent(100).await.unwrap();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].question, "question 50");
        assert_eq!(entries[49].question, "question 1");
    }

    #[tokio::test]
    async fn duckdb_keeps_newest_fifty() {
        let pool = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 2).unwrap();
        let store = DuckDbHistory::open(pool, 50).unwrap();
        fill(&store, 51).await;

        let entries = store.recent(100).await.unwrap();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].sql, "SELECT 50");
        assert!(entries.iter().all(|e| e.question != "question 0"));
    }

    #[tokio::test]
    async fn duckdb_round_trips_entries() {
        let pool = build_pool(DuckDBConnectionManager::in_memory().unwrap(), 1).unwrap();
        let store = DuckDbHistory::open(pool, 50).unwrap();

        let saved = store
            .append("top products".into(), "SELECT * FROM products".into())
            .await
            .unwrap();
        let loaded = store.recent(50).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, saved.id);
        assert_eq!(loaded[0].sql, "SELECT * FROM products");
        assert_eq!(loaded[0].timestamp.timestamp_micros(), saved.timestamp.timestamp_micros());
    }

    #[tokio::test]
    async fn recent_respects_limit() {
        let store = InMemoryHistory::new(50);
        fill(&store, 5).await;
        assert_eq!(store.recent(2).await.unwrap().len(), 2);
    }
}
