use crate::config::LlmConfig;
use crate::llm::models::CompletionRequest;
use crate::llm::{CompletionClient, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/chat";

/// Ollama's native chat endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    message: OllamaReply,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaReply {
    content: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::ConfigError(e.to_string()))?;

        info!("Initialized Ollama provider with model: {}", config.model);

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = OllamaRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: &request.system,
                },
                OllamaMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!("Sending request to Ollama at {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Raw text first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = parse_response(&response_text)?;
        if !ollama_response.done {
            debug!("Ollama reported an incomplete response");
        }
        Ok(ollama_response.message.content)
    }
}

fn parse_response(text: &str) -> Result<OllamaResponse, LlmError> {
    serde_json::from_str::<OllamaResponse>(text).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, text);
        LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_goes_into_options() {
        let body = OllamaRequest {
            model: "qwen2.5:0.5b",
            messages: vec![OllamaMessage { role: "user", content: "q" }],
            stream: false,
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: 500,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 500);
    }

    #[test]
    fn parses_chat_reply() {
        let parsed = parse_response(
            r#"{"model":"qwen2.5:0.5b","message":{"role":"assistant","content":"{\"sql\":\"SELECT 1\"}"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.message.content, r#"{"sql":"SELECT 1"}"#);
        assert!(parsed.done);
    }

    #[test]
    fn rejects_malformed_reply() {
        assert!(matches!(parse_response("not json"), Err(LlmError::ResponseError(_))));
    }
}
