//! Agent registry: one invokable agent per agent spec.
//!
//! Building the registry makes no network calls. Each `Agent::invoke` is
//! exactly one completion call, bounded by the configured timeout and never
//! retried here.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::errors::{BackendError, ConfigurationError};
use crate::domain::models::{AgentSpec, ModelParams, TokenUsage};
use crate::domain::ports::{CompletionBackend, CompletionRequest, RawCompletion};

/// Keys checked, in order, when a backend wraps its text in an object.
const TEXT_KEYS: [&str; 5] = ["raw_output", "result", "output", "text", "content"];

/// Text produced by one agent call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// An agent spec bound to a backend.
pub struct Agent {
    spec: AgentSpec,
    system_prompt: String,
    params: ModelParams,
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Model parameters after defaults were applied.
    pub const fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Perform one completion call for a rendered task description.
    pub async fn invoke(&self, description: &str, expected_output_hint: &str) -> Result<AgentOutput, BackendError> {
        let request = CompletionRequest::new(
            &self.spec.name,
            &self.system_prompt,
            description,
            expected_output_hint,
            self.params.clone(),
        );

        let started = Instant::now();
        let completion = tokio::time::timeout(self.timeout, self.backend.complete(request))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let text = normalize_completion(&completion.raw)?;
        debug!(
            agent = %self.spec.name,
            backend = self.backend.name(),
            prompt_len = description.len(),
            output_len = text.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Agent call completed"
        );

        Ok(AgentOutput {
            text,
            usage: completion.usage,
        })
    }
}

/// Mapping from agent name to invokable agent.
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
}

impl AgentRegistry {
    /// Bind every spec to `backend`. Unset model params take `defaults`.
    pub fn build(
        specs: Vec<AgentSpec>,
        backend: Arc<dyn CompletionBackend>,
        defaults: &ModelParams,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        let mut agents = HashMap::with_capacity(specs.len());

        for spec in specs {
            if agents.contains_key(&spec.name) {
                return Err(ConfigurationError::DuplicateAgent(spec.name));
            }

            let params = ModelParams {
                model: spec.model_params.model.clone().or_else(|| defaults.model.clone()),
                temperature: spec.model_params.temperature.or(defaults.temperature),
                max_tokens: spec.model_params.max_tokens.or(defaults.max_tokens),
            };

            let agent = Agent {
                system_prompt: spec.system_prompt(),
                params,
                backend: Arc::clone(&backend),
                timeout,
                spec,
            };
            agents.insert(agent.spec.name.clone(), agent);
        }

        Ok(Self { agents })
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agent names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Reduce any backend answer shape to plain text.
pub fn normalize_completion(raw: &RawCompletion) -> Result<String, BackendError> {
    let text = match raw {
        RawCompletion::Text(text) => text.trim().to_string(),
        RawCompletion::Blocks(blocks) => join_non_empty(blocks.iter().map(|b| b.trim().to_string())),
        RawCompletion::Json(value) => text_from_json(value).unwrap_or_default(),
    };

    if text.is_empty() {
        Err(BackendError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn text_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Array(parts) => Some(join_non_empty(parts.iter().filter_map(text_from_json)))
            .filter(|t| !t.is_empty()),
        Value::Object(map) => TEXT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(text_from_json),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

fn join_non_empty(parts: impl Iterator<Item = String>) -> String {
    parts.filter(|p| !p.is_empty()).collect::<Vec<_>>().join("\n")
}
