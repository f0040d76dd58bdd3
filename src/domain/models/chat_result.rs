//! Final payload returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::TokenUsage;
use super::review::SafetyLevel;

/// Diagnostic fields attached to every chat result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    /// Correlates the result with log lines
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,

    /// Changes the reviewer reports making
    #[serde(default)]
    pub modifications: String,

    /// Reviewer's justification
    #[serde(default)]
    pub reasoning: String,

    /// Raw text of the review task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_result: Option<String>,

    /// Category assigned by the gating task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Set when the gating task rejected the request
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refused: bool,

    /// Description of the failure that degraded this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Task whose completion call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<String>,

    /// Tasks that produced output, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks_completed: Vec<String>,

    /// Tokens consumed across all calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// The vetted answer for one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResult {
    /// Output of the first substantive (non-gating) task
    pub original_response: String,
    /// Text after all revisions, or a refusal/apology
    pub final_response: String,
    pub safety_level: SafetyLevel,
    pub metadata: ChatMetadata,
    pub processed_at: DateTime<Utc>,
}

impl ChatResult {
    pub fn new(
        original_response: impl Into<String>,
        final_response: impl Into<String>,
        safety_level: SafetyLevel,
        metadata: ChatMetadata,
    ) -> Self {
        Self {
            original_response: original_response.into(),
            final_response: final_response.into(),
            safety_level,
            metadata,
            processed_at: Utc::now(),
        }
    }

    /// True when the pipeline could not finish and fell back.
    pub const fn is_degraded(&self) -> bool {
        self.metadata.error.is_some()
    }
}
