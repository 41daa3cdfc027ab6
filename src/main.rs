use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod history;
mod ingest;
mod llm;
mod pipeline;
mod sql;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs, HistoryConfig};
use crate::db::db_pool::{build_pool, DbPool, DuckDBConnectionManager};
use crate::db::sample::ensure_sample_data;
use crate::history::{DuckDbHistory, HistoryStore, InMemoryHistory};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

fn open_store(path: &Path, pool_size: u32) -> Result<DbPool, Box<dyn std::error::Error>> {
    info!("Opening DuckDB store at {}", path.display());
    let manager = DuckDBConnectionManager::open(path)?;
    Ok(build_pool(manager, pool_size)?)
}

fn open_history(config: &AppConfig) -> Arc<dyn HistoryStore> {
    let HistoryConfig {
        backend,
        path,
        capacity,
    } = &config.history;

    if backend == "duckdb" {
        let path = config.resolve_path(path);
        let opened = open_store(&path, 1)
            .map_err(|e| e.to_string())
            .and_then(|pool| DuckDbHistory::open(pool, *capacity).map_err(|e| e.to_string()));
        match opened {
            Ok(store) => {
                info!("Query history stored in {}", path.display());
                return Arc::new(store);
            }
            Err(e) => warn!("Could not open history store ({}), keeping history in memory", e),
        }
    } else if backend != "memory" {
        warn!("Unknown history backend '{}', keeping history in memory", backend);
    }

    Arc::new(InMemoryHistory::new(*capacity))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Ensure data directory exists
    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    let sample_pool = open_store(
        &config.resolve_path(&config.database.sample_db),
        config.database.pool_size as u32,
    )?;
    ensure_sample_data(&*sample_pool.get()?)?;

    let uploads_pool = open_store(
        &config.resolve_path(&config.database.uploads_db),
        config.database.pool_size as u32,
    )?;

    // Initialize LLM manager
    info!(
        "Initializing LLM manager with backend: {} ({})",
        config.llm.backend, config.llm.model
    );
    let llm_manager = LlmManager::new(&config.llm)?;

    let history = open_history(&config);

    let app_state = Arc::new(AppState::new(
        config.clone(),
        sample_pool,
        uploads_pool,
        llm_manager,
        history,
    ));

    // Start the web server
    info!("Starting NL-SQL server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
