use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::executor::QueryOutput;
use crate::db::sample::{sample_counts, SampleCounts};
use crate::db::schema::{ActiveScope, SchemaDescription};
use crate::db::uploads::{display_name, sanitize_table_name};
use crate::db::with_connection;
use crate::history::QueryHistoryEntry;
use crate::llm::models::{GenerationRequest, GenerationResult};
use crate::sql::validate;
use crate::web::error::ApiError;
use crate::web::state::AppState;

const DEFAULT_DISPLAY_NAME: &str = "Default (E-commerce)";

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveHistoryRequest {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchDatabaseParams {
    pub db_name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub database: &'static str,
    pub uptime_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub table_name: String,
    pub display_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub schema: Map<String, Value>,
    pub preview: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseEntry {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct DatabaseList {
    pub databases: Vec<DatabaseEntry>,
    pub active: String,
}

fn schema_body(schema: &SchemaDescription) -> Json<Value> {
    Json(json!({ "tables": schema.tables_json() }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let connected = with_connection(&state.sample_pool, |conn| {
        Ok(conn.execute_batch("SELECT 1")?)
    })
    .await;

    if let Err(e) = &connected {
        warn!("Health check could not reach the sample database: {}", e);
    }

    Json(HealthStatus {
        status: "healthy",
        service: "text-to-sql-api",
        database: if connected.is_ok() { "connected" } else { "disconnected" },
        uptime_seconds: chrono::Utc::now()
            .signed_duration_since(state.startup_time)
            .num_seconds(),
    })
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerationRequest>,
) -> Result<Json<GenerationResult>, ApiError> {
    let scope = state.scope().await;
    let result = state.pipeline.generate(&payload.question, &scope).await?;
    Ok(Json(result))
}

pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<QueryOutput>, ApiError> {
    let sql = validate(&payload.sql)?;
    let scope = state.scope().await;
    let output = state.executor.execute(&scope, &sql).await?;
    Ok(Json(output))
}

pub async fn get_schema(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let schema = state.schema_provider.describe(&ActiveScope::Default).await?;
    Ok(schema_body(&schema))
}

pub async fn get_active_schema(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let scope = state.scope().await;
    let schema = state.schema_provider.describe(&scope).await?;
    Ok(schema_body(&schema))
}

pub async fn get_sample_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SampleCounts>, ApiError> {
    let counts = with_connection(&state.sample_pool, |conn| Ok(sample_counts(conn)?)).await?;
    Ok(Json(counts))
}

pub async fn upload_data(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    info!("Uploading file: {} ({} bytes)", filename, bytes.len());

    let ingest = Arc::clone(&state.ingest);
    let name = filename.clone();
    let processed = tokio::task::spawn_blocking(move || ingest.process(&bytes, &name))
        .await
        .map_err(|e| {
            error!("Upload task failed: {}", e);
            ApiError::internal(format!("Error processing file: {}", e))
        })??;

    let table_name = sanitize_table_name(&filename);
    let frame = processed.frame;
    let response = UploadResponse {
        success: true,
        display_name: display_name(&table_name),
        row_count: frame.rows.len(),
        column_count: frame.columns.len(),
        schema: frame.schema_json(),
        preview: frame.preview(state.config.upload.preview_rows),
        table_name: table_name.clone(),
    };

    state
        .tables
        .materialize(&table_name, frame, processed.column_types)
        .await?;
    state.set_scope(ActiveScope::Uploaded(table_name.clone())).await;

    info!("File uploaded successfully: {}", table_name);
    Ok(Json(response))
}

pub async fn list_databases(State(state): State<Arc<AppState>>) -> Result<Json<DatabaseList>, ApiError> {
    let scope = state.scope().await;
    let uploaded = state.tables.list().await?;

    let mut databases = Vec::with_capacity(uploaded.len() + 1);
    databases.push(DatabaseEntry {
        name: ActiveScope::DEFAULT_NAME.to_string(),
        display_name: DEFAULT_DISPLAY_NAME.to_string(),
        kind: "default",
        row_count: None,
        column_count: None,
        active: scope == ActiveScope::Default,
    });
    databases.extend(uploaded.into_iter().map(|table| DatabaseEntry {
        active: scope.is_uploaded(&table.name),
        name: table.name,
        display_name: table.display_name,
        kind: "uploaded",
        row_count: Some(table.row_count),
        column_count: Some(table.column_count),
    }));

    Ok(Json(DatabaseList {
        databases,
        active: scope.name().to_string(),
    }))
}

pub async fn switch_database(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SwitchDatabaseParams>,
) -> Result<Json<Value>, ApiError> {
    let scope = if params.db_name == ActiveScope::DEFAULT_NAME {
        ActiveScope::Default
    } else if state.tables.exists(&params.db_name).await? {
        ActiveScope::Uploaded(params.db_name.clone())
    } else {
        return Err(ApiError::not_found("Database not found"));
    };

    state.set_scope(scope).await;
    Ok(Json(json!({ "success": true, "active_database": params.db_name })))
}

pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.tables.drop_table(&table_name).await?;
    state.clear_scope_if(&table_name).await;

    Ok(Json(json!({ "success": true, "message": format!("Deleted {}", table_name) })))
}

pub async fn save_history(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SaveHistoryRequest>,
) -> Result<Json<QueryHistoryEntry>, ApiError> {
    let entry = state.history.append(payload.question, payload.sql).await?;
    Ok(Json(entry))
}

pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<Vec<QueryHistoryEntry>> {
    match state.history.recent(state.config.history.capacity).await {
        Ok(entries) => Json(entries),
        Err(e) => {
            error!("Error getting history: {}", e);
            Json(Vec::new())
        }
    }
}
