//! Domain errors for the HypnoBot pipeline.
//!
//! Three tiers, matching how far each kind of failure is allowed to travel:
//! - [`ConfigurationError`]: malformed crew definitions or credentials. Fatal,
//!   never retried, always propagated to the caller.
//! - [`BackendError`]: a completion call failed. Caught at the orchestrator
//!   boundary and turned into a degraded chat result.
//! - [`PipelineError`]: the only error `process` returns.

use std::time::Duration;
use thiserror::Error;

/// Format a dependency path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Malformed or inconsistent agent/task definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' references unknown agent '{agent}'")]
    UnknownAgent { task: String, agent: String },

    #[error("Task '{task}' declares unknown predecessor '{predecessor}'")]
    UnknownPredecessor { task: String, predecessor: String },

    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Task '{task}' runs before its predecessor '{predecessor}'")]
    PredecessorOutOfOrder { task: String, predecessor: String },

    #[error("Task '{task}' has no value for placeholder '{{{placeholder}}}'")]
    UnresolvedPlaceholder { task: String, placeholder: String },

    #[error("Task '{task}' uses placeholder '{{{placeholder}}}' which is neither user_input nor a predecessor")]
    UnknownPlaceholder { task: String, placeholder: String },

    #[error("Malformed template at byte {position}: {reason}")]
    MalformedTemplate { position: usize, reason: String },

    #[error("Task chain is empty")]
    EmptyChain,

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Gating task '{0}' must be the first task in the chain")]
    GateNotFirst(String),

    #[error("Task '{task}' uses the output of gating task '{gate}', which is absent when a failed gate is skipped")]
    GateOutputUnavailable { task: String, gate: String },

    #[error("No API key configured for provider '{0}'")]
    MissingCredential(String),

    #[error("API key for provider '{0}' looks like a placeholder value")]
    PlaceholderCredential(String),

    #[error("Malformed configuration in {source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Failure of a single completion call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network or connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Call exceeded the configured per-call timeout
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP 429 from the provider
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid or rejected credentials (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Any other non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered with a body we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider answered, but with no text
    #[error("Completion contained no text")]
    EmptyResponse,

    /// The text is a provider notice rather than an answer
    #[error("Completion looks like a service message: {0}")]
    ServiceMessage(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Self::Authentication(message),
            429 => Self::RateLimited,
            _ => Self::Api { status, message },
        }
    }

    /// Returns true if a retry has a reasonable chance of succeeding.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::RateLimited | Self::ServiceMessage(_) => {
                true
            }
            Self::Api { status, .. } => *status >= 500,
            Self::Authentication(_) | Self::InvalidResponse(_) | Self::EmptyResponse => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by `HypnoPipeline::process`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Request was cancelled")]
    Cancelled,
}
