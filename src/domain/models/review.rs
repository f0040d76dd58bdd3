//! Structured values extracted from agent free text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label a gating agent emits to let a request through.
pub const APPROVED_LABEL: &str = "APPROPRIATE";

/// Severity rating attached to a generated response.
///
/// | level | meaning |
/// |---|---|
/// | 0 | safe as written |
/// | 1 | minor wording adjustments |
/// | 2 | caution: content changed or could not be verified |
/// | 3 | serious concern, substantial rewrite |
/// | 4 | critical, crisis or harmful content |
///
/// Level 2 doubles as the fallback whenever the pipeline could not finish a
/// review, so a failure is never reported as safe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SafetyLevel {
    #[default]
    Safe = 0,
    Minor = 1,
    Caution = 2,
    Serious = 3,
    Critical = 4,
}

impl SafetyLevel {
    /// Map a parsed number onto the scale. Anything above 4 clamps to `Critical`.
    pub const fn clamped(value: u64) -> Self {
        match value {
            0 => Self::Safe,
            1 => Self::Minor,
            2 => Self::Caution,
            3 => Self::Serious,
            _ => Self::Critical,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Minor => "minor",
            Self::Caution => "caution",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

impl From<SafetyLevel> for u8 {
    fn from(level: SafetyLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for SafetyLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 4 {
            return Err(format!("safety level {value} is outside 0-4"));
        }
        Ok(Self::clamped(u64::from(value)))
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.as_str())
    }
}

/// Fields recovered from a reviewer's free-text answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReview {
    /// Revised response text (or the decision label for a categorizer)
    pub decision_or_response: String,
    pub safety_level: SafetyLevel,
    pub modifications: String,
    pub reasoning: String,
}

/// Verdict of the gating task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    /// First non-empty line, upper-cased
    pub label: String,
    pub explanation: String,
}

impl Categorization {
    /// True only when the label's leading word is exactly `APPROPRIATE`.
    ///
    /// A substring test would accept `INAPPROPRIATE`, so the label is split on
    /// non-alphanumeric characters and only the first word is compared.
    pub fn is_approved(&self) -> bool {
        self.label
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .find(|word| !word.is_empty())
            .is_some_and(|word| word == APPROVED_LABEL)
    }
}
