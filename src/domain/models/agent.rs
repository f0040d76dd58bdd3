//! Agent definitions.
//!
//! An agent is a reasoning role (categorizer, support agent, safety officer, ...)
//! bound to a completion backend. The role, goal and backstory are prompt
//! fragments passed through verbatim; the pipeline never interprets them.

use serde::{Deserialize, Serialize};

/// Model knobs forwarded to the completion backend.
///
/// Unset fields fall back to the backend's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Model identifier (e.g. "gpt-4")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelParams {
    /// Params pinned to a specific model.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }
}

/// Identity of a reasoning role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique key, referenced by `TaskSpec::agent_name`
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Backend parameters (the `llm` block in agents.yaml)
    #[serde(default, rename = "llm")]
    pub model_params: ModelParams,
}

impl AgentSpec {
    /// Create an agent spec with default model parameters.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            model_params: ModelParams::default(),
        }
    }

    pub fn with_model_params(mut self, params: ModelParams) -> Self {
        self.model_params = params;
        self
    }

    /// System prompt assembled from the role fragments.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role.trim(),
            self.backstory.trim(),
            self.goal.trim()
        )
    }
}
