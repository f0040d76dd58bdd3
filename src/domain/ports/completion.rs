//! Completion port - the boundary between agents and language-model backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::BackendError;
use crate::domain::models::{ModelParams, TokenUsage};

/// One prompt ready to be sent to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Name of the agent issuing the call
    pub agent_name: String,
    /// Persona prompt built from the agent's role, backstory and goal
    pub system_prompt: String,
    /// Rendered task description
    pub prompt: String,
    /// Guidance on the shape of the answer
    pub expected_output: String,
    /// Fully resolved model parameters
    pub params: ModelParams,
}

impl CompletionRequest {
    pub fn new(
        agent_name: impl Into<String>,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
        expected_output: impl Into<String>,
        params: ModelParams,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            expected_output: expected_output.into(),
            params,
        }
    }

    /// The user turn sent to the model: the task followed by its answer criteria.
    pub fn user_message(&self) -> String {
        let hint = self.expected_output.trim();
        if hint.is_empty() {
            return self.prompt.clone();
        }
        format!(
            "{}\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.",
            self.prompt, hint
        )
    }
}

/// Backend answer before it has been reduced to plain text.
///
/// Providers disagree on how they wrap text; the agent registry owns the
/// reduction so nothing downstream has to care.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawCompletion {
    /// Plain text
    Text(String),
    /// Ordered text blocks
    Blocks(Vec<String>),
    /// Structured payload with the text under one of several keys
    Json(serde_json::Value),
}

/// A backend's answer to one [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub raw: RawCompletion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            raw: RawCompletion::Text(text.into()),
            usage: None,
        }
    }

    pub fn blocks(blocks: Vec<String>) -> Self {
        Self {
            raw: RawCompletion::Blocks(blocks),
            usage: None,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            raw: RawCompletion::Json(value),
            usage: None,
        }
    }

    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Trait for completion backends.
///
/// One call is one billable request. Implementations must not retry; retry
/// policy belongs to the orchestrator.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Run a single completion.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError>;
}
