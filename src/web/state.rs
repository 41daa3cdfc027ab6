use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::AppConfig;
use crate::db::db_pool::DbPool;
use crate::db::executor::QueryExecutor;
use crate::db::schema::ActiveScope;
use crate::db::schema_provider::SchemaProvider;
use crate::db::uploads::TableStore;
use crate::history::HistoryStore;
use crate::ingest::IngestManager;
use crate::llm::LlmManager;
use crate::pipeline::SqlPipeline;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub sample_pool: DbPool,
    pub schema_provider: SchemaProvider,
    pub pipeline: SqlPipeline,
    pub executor: QueryExecutor,
    pub tables: TableStore,
    pub ingest: Arc<IngestManager>,
    pub history: Arc<dyn HistoryStore>,
    active_scope: RwLock<ActiveScope>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sample_pool: DbPool,
        uploads_pool: DbPool,
        llm_manager: LlmManager,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let schema_provider = SchemaProvider::new(sample_pool.clone(), uploads_pool.clone());
        let pipeline = SqlPipeline::new(schema_provider.clone(), Arc::new(llm_manager));

        Self {
            ingest: Arc::new(IngestManager::new(config.upload.max_bytes)),
            executor: QueryExecutor::new(sample_pool.clone(), uploads_pool.clone()),
            tables: TableStore::new(uploads_pool),
            config,
            sample_pool,
            schema_provider,
            pipeline,
            history,
            active_scope: RwLock::new(ActiveScope::Default),
            startup_time: chrono::Utc::now(),
        }
    }

    /// Snapshot taken once per request.
    pub async fn scope(&self) -> ActiveScope {
        self.active_scope.read().await.clone()
    }

    pub async fn set_scope(&self, scope: ActiveScope) {
        let mut active = self.active_scope.write().await;
        if *active != scope {
            info!("Active database: {} -> {}", active.name(), scope.name());
        }
        *active = scope;
    }

    /// Falls back to the default store if `table` is the active one.
    pub async fn clear_scope_if(&self, table: &str) -> bool {
        let mut active = self.active_scope.write().await;
        if active.is_uploaded(table) {
            info!("Active database {} removed, switching to default", table);
            *active = ActiveScope::Default;
            return true;
        }
        false
    }
}
