pub mod models;
pub mod prompt;
pub mod providers;
pub mod response;

use crate::config::LlmConfig;
use crate::llm::models::CompletionRequest;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    Timeout(Duration),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::Timeout(after) => write!(f, "LLM request timed out after {}s", after.as_secs()),
        }
    }
}

impl Error for LlmError {}

/// Raw text completion from a language-model backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

pub struct LlmManager {
    client: Box<dyn CompletionClient>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client: Box<dyn CompletionClient> = match config.backend.as_str() {
            "openai" | "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Box<dyn CompletionClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Single attempt, bounded by the configured timeout.
    pub async fn complete(&self, system: &str, question: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            system: system.to_string(),
            user: question.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Requesting completion for question: {}", question);
        debug!("System prompt: {}", system);

        match tokio::time::timeout(self.timeout, self.client.complete(&request)).await {
            Ok(Ok(text)) => {
                debug!("Raw completion: {}", text);
                Ok(text)
            }
            Ok(Err(e)) => {
                error!("Completion failed: {}", e);
                Err(e)
            }
            Err(_) => {
                error!("Completion timed out after {:?}", self.timeout);
                Err(LlmError::Timeout(self.timeout))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{test_config, StubClient};
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn passes_sampling_parameters() {
        let stub = Arc::new(StubClient::replying("SELECT 1"));
        let manager = LlmManager::with_client(Box::new(stub.clone()), &test_config());

        let text = manager.complete("system text", "how many?").await.unwrap();
        assert_eq!(text, "SELECT 1");

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].system, "system text");
        assert_eq!(seen[0].user, "how many?");
        assert_eq!(seen[0].max_tokens, 500);
        assert!(seen[0].temperature < 0.2);
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let mut config = test_config();
        config.timeout_secs = 0;
        let manager = LlmManager::with_client(Box::new(StubClient::stalled(Duration::from_millis(200))), &config);

        let err = manager.complete("s", "q").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let mut config = test_config();
        config.backend = "llamafile".to_string();
        assert!(matches!(LlmManager::new(&config), Err(LlmError::ConfigError(_))));
    }
}
