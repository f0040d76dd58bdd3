//! OpenAI chat completions backend.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{BackendError, ConfigurationError};
use crate::domain::models::{BackendConfig, TokenUsage};
use crate::domain::ports::{Completion, CompletionBackend, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// API base URL, without the `/v1` suffix
    pub base_url: String,
    /// Model used when the request does not name one
    pub default_model: String,
}

impl OpenAiConfig {
    pub fn from_backend_config(config: &BackendConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: config.default_model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// OpenAI chat completions backend.
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigurationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigurationError::Malformed {
                source_name: "openai http client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { config, client })
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: request.system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.user_message(),
        });

        ChatRequest {
            model: request
                .params
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages,
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError> {
        let api_request = self.build_request(&request);
        debug!(model = %api_request.model, agent = %request.agent_name, "Sending OpenAI request");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&api_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let result: ChatResponse = response.json().await?;
        let message = result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| BackendError::InvalidResponse("response has no choices".to_string()))?;

        // The message object is handed over whole; `content` may be null or an array of parts.
        let completion = Completion::json(message);
        Ok(match result.usage {
            Some(usage) => {
                completion.with_usage(TokenUsage::new(usage.prompt_tokens, usage.completion_tokens))
            }
            None => completion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ModelParams;

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let config = OpenAiConfig::from_backend_config(&BackendConfig::default(), "sk-test");
        let backend = OpenAiBackend::new(config).unwrap();
        let request = CompletionRequest::new(
            "categorizer",
            "You are a classifier.",
            "Classify this",
            "One word",
            ModelParams::default(),
        );

        let api_request = backend.build_request(&request);
        assert_eq!(api_request.model, "gpt-4");
        assert_eq!(api_request.messages.len(), 2);
        assert_eq!(api_request.messages[0].role, "system");
        assert!(api_request.messages[1].content.starts_with("Classify this"));
    }

    #[test]
    fn test_base_url_override() {
        let config = BackendConfig {
            base_url: Some("http://localhost:1234".to_string()),
            ..Default::default()
        };
        let config = OpenAiConfig::from_backend_config(&config, "sk-test");
        assert_eq!(config.base_url, "http://localhost:1234");
    }
}
