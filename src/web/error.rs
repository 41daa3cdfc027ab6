use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::db::schema_provider::SchemaError;
use crate::db::StoreError;
use crate::history::HistoryError;
use crate::ingest::IngestError;
use crate::pipeline::GenerationError;
use crate::sql::UnsafeQuery;

/// Handler error rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.detail);
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<UnsafeQuery> for ApiError {
    fn from(err: UnsafeQuery) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QueryError(_) => ApiError::bad_request(err.to_string()),
            StoreError::NotFound(_) => ApiError::not_found(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::SchemaNotFound(_) => ApiError::bad_request(err.to_string()),
            SchemaError::Store(inner) => inner.into(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidInput(_)
            | GenerationError::SchemaNotFound(_)
            | GenerationError::Unsafe(_) => ApiError::bad_request(err.to_string()),
            GenerationError::Store(inner) => ApiError::internal(inner.to_string()),
            GenerationError::BackendUnavailable(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::TooLarge { .. } => ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
            IngestError::UnsupportedFileType(_) => ApiError::bad_request(err.to_string()),
            IngestError::ParsingError(_) => {
                ApiError::internal(format!("Error processing file: {}", err))
            }
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::new(err.status(), err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn generation_errors_map_to_status() {
        let cases = [
            (GenerationError::InvalidInput("Question cannot be empty".into()), StatusCode::BAD_REQUEST),
            (GenerationError::SchemaNotFound("gone".into()), StatusCode::BAD_REQUEST),
            (GenerationError::Unsafe(UnsafeQuery::NotASelect), StatusCode::BAD_REQUEST),
            (
                GenerationError::BackendUnavailable(LlmError::ConnectionError("refused".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn execution_errors_keep_engine_text() {
        let err = ApiError::from(StoreError::QueryError("no such column: product_id".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "SQL Error: no such column: product_id");
    }

    #[test]
    fn oversized_upload_is_413() {
        let err = ApiError::from(IngestError::TooLarge {
            size: 11 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        });
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.detail, "File too large. Maximum size is 10MB");
    }
}
