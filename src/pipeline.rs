use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::db::schema::ActiveScope;
use crate::db::schema_provider::{SchemaError, SchemaProvider};
use crate::db::StoreError;
use crate::llm::models::GenerationResult;
use crate::llm::prompt::build_prompt;
use crate::llm::response;
use crate::llm::{LlmError, LlmManager};
use crate::sql::{validate, UnsafeQuery};

#[derive(Debug)]
pub enum GenerationError {
    InvalidInput(String),
    SchemaNotFound(String),
    Store(StoreError),
    BackendUnavailable(LlmError),
    Unsafe(UnsafeQuery),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::InvalidInput(msg) => write!(f, "{}", msg),
            GenerationError::SchemaNotFound(table) => write!(f, "Schema not found for table: {}", table),
            GenerationError::Store(err) => write!(f, "{}", err),
            GenerationError::BackendUnavailable(err) => {
                write!(f, "Language model backend unavailable: {}", err)
            }
            GenerationError::Unsafe(err) => write!(f, "{}", err),
        }
    }
}

impl Error for GenerationError {}

impl From<SchemaError> for GenerationError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::SchemaNotFound(table) => GenerationError::SchemaNotFound(table),
            SchemaError::Store(err) => GenerationError::Store(err),
        }
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        GenerationError::BackendUnavailable(err)
    }
}

impl From<UnsafeQuery> for GenerationError {
    fn from(err: UnsafeQuery) -> Self {
        GenerationError::Unsafe(err)
    }
}

/// Question in, validated SQL out. Never executes anything.
#[derive(Clone)]
pub struct SqlPipeline {
    schema: SchemaProvider,
    llm: Arc<LlmManager>,
}

impl SqlPipeline {
    pub fn new(schema: SchemaProvider, llm: Arc<LlmManager>) -> Self {
        Self { schema, llm }
    }

    pub async fn generate(
        &self,
        question: &str,
        scope: &ActiveScope,
    ) -> Result<GenerationResult, GenerationError> {
        if question.trim().is_empty() {
            return Err(GenerationError::InvalidInput("Question cannot be empty".to_string()));
        }

        let start_time = Instant::now();
        let schema = self.schema.describe(scope).await?;
        let prompt = build_prompt(&schema, scope);

        let raw = self.llm.complete(&prompt, question).await?;
        let result = response::parse(&raw);
        let sql = validate(&result.sql)?;

        info!(
            "Generated SQL for '{}' in {}ms",
            scope.name(),
            start_time.elapsed().as_millis()
        );

        Ok(GenerationResult {
            sql,
            explanation: result.explanation,
        })
    }
}
