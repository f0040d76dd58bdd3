//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{BackendError, ConfigurationError};
use crate::domain::models::{BackendConfig, TokenUsage};
use crate::domain::ports::{Completion, CompletionBackend, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Model used when the request does not name one
    pub default_model: String,
    /// anthropic-version header
    pub api_version: String,
    /// Token limit used when the request does not set one
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn from_backend_config(config: &BackendConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: config.default_model.clone(),
            api_version: config.anthropic_version.clone(),
            max_tokens: config.default_max_tokens,
        }
    }
}

/// Message role in Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageRole {
    User,
}

#[derive(Debug, Serialize)]
struct Message {
    role: MessageRole,
    content: String,
}

/// Request to the Anthropic Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Content block in a response. Only text blocks carry an answer.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self, ConfigurationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigurationError::Malformed {
                source_name: "anthropic http client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { config, client })
    }

    fn build_request(&self, request: &CompletionRequest) -> MessagesRequest {
        let model = request
            .params
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        let system = if request.system_prompt.is_empty() {
            None
        } else {
            Some(request.system_prompt.clone())
        };

        MessagesRequest {
            model,
            max_tokens: request.params.max_tokens.unwrap_or(self.config.max_tokens),
            system,
            messages: vec![Message {
                role: MessageRole::User,
                content: request.user_message(),
            }],
            temperature: request.params.temperature,
        }
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError> {
        let api_request = self.build_request(&request);
        debug!(model = %api_request.model, agent = %request.agent_name, "Sending Anthropic request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&api_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let result: MessagesResponse = response.json().await?;

        let blocks: Vec<String> = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        let completion = Completion::blocks(blocks);
        Ok(match result.usage {
            Some(usage) => completion.with_usage(TokenUsage::new(usage.input_tokens, usage.output_tokens)),
            None => completion,
        })
    }
}
