use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API consumed by the front end
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/health", get(handlers::api::health))
            // Generation and execution
            .route("/generate-sql", post(handlers::api::generate_sql))
            .route("/execute-query", post(handlers::api::execute_query))
            // Schema
            .route("/schema", get(handlers::api::get_schema))
            .route("/active-schema", get(handlers::api::get_active_schema))
            .route("/sample-data", get(handlers::api::get_sample_data))
            // Uploaded data
            .route("/upload-data", post(handlers::api::upload_data))
            .route("/databases", get(handlers::api::list_databases))
            .route("/switch-database", post(handlers::api::switch_database))
            .route("/delete-upload/{table_name}", delete(handlers::api::delete_upload))
            // History
            .route(
                "/history",
                get(handlers::api::get_history).post(handlers::api::save_history),
            ),
    )
}
