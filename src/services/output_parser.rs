//! Structured fields from free-text agent answers.
//!
//! Extraction is heuristic and lossy. Each field is tried against a fixed,
//! ordered list of patterns and the first match wins. Later patterns are
//! broader than earlier ones, so reordering them changes results. Parsing
//! never fails: unmatched fields keep their defaults.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::models::{Categorization, ParsedReview, SafetyLevel};

/// Quoted revised response, most specific phrasing first.
const PRIMARY_PATTERNS: [&str; 4] = [
    r#"(?i)response after review is:\s*"([^"]+)""#,
    r#"(?i)response is:\s*"([^"]+)""#,
    r#"(?i)response:\s*"([^"]+)""#,
    r#"(?i)the assistant's response.*?:\s*"([^"]+)""#,
];

/// Section headers that end the unquoted primary text.
const SECTION_SPLIT: &str = r"(?i)\n\s*(?:Safety Level(?: Assessment)?|Modifications|Reasoning)\s*:";

const SAFETY_PATTERNS: [&str; 2] = [
    r"(?i)Safety Level Assessment:\s*(\d+)",
    r"(?i)Safety Level:\s*(\d+)",
];

/// Up to a blank line, the next header, or the end.
const MODIFICATIONS_PATTERN: &str =
    r"(?is)Modifications:(.*?)(?:\n\s*\n|Reasoning\s*:|Safety Level(?: Assessment)?\s*:|\z)";

/// Reasoning is the closing section, so only a blank line or the end stops it.
const REASONING_PATTERN: &str = r"(?is)Reasoning:(.*?)(?:\n\s*\n|\z)";

struct Patterns {
    primary: Vec<Regex>,
    section_split: Option<Regex>,
    safety: Vec<Regex>,
    modifications: Option<Regex>,
    reasoning: Option<Regex>,
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    primary: PRIMARY_PATTERNS.iter().filter_map(|p| compile(p)).collect(),
    section_split: compile(SECTION_SPLIT),
    safety: SAFETY_PATTERNS.iter().filter_map(|p| compile(p)).collect(),
    modifications: compile(MODIFICATIONS_PATTERN),
    reasoning: compile(REASONING_PATTERN),
});

/// Parse a reviewer's answer. Empty input yields all defaults.
pub fn parse_review(text: &str) -> ParsedReview {
    if text.trim().is_empty() {
        return ParsedReview::default();
    }

    ParsedReview {
        decision_or_response: extract_primary(text),
        safety_level: extract_safety_level(text),
        modifications: extract_section(PATTERNS.modifications.as_ref(), text),
        reasoning: extract_section(PATTERNS.reasoning.as_ref(), text),
    }
}

/// Parse an optional answer; `None` behaves like empty text.
pub fn parse_review_opt(text: Option<&str>) -> ParsedReview {
    text.map_or_else(ParsedReview::default, parse_review)
}

/// Parse the gating task's verdict.
///
/// The first non-empty line, upper-cased, is the label; the remaining lines
/// form the explanation.
pub fn parse_categorization(text: &str) -> Categorization {
    let mut lines = text.lines().skip_while(|line| line.trim().is_empty());

    let Some(first) = lines.next() else {
        return Categorization::default();
    };

    let explanation = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    Categorization {
        label: first.trim().to_uppercase(),
        explanation,
    }
}

fn extract_primary(text: &str) -> String {
    let quoted = PATTERNS
        .primary
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());

    if let Some(quoted) = quoted.filter(|q| !q.is_empty()) {
        return quoted;
    }

    let head = PATTERNS
        .section_split
        .as_ref()
        .and_then(|re| re.find(text))
        .map_or(text, |m| &text[..m.start()]);
    head.trim().to_string()
}

fn extract_safety_level(text: &str) -> SafetyLevel {
    PATTERNS
        .safety
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        // Digits too long for u64 are still "very high"
        .map_or(SafetyLevel::Safe, |m| {
            SafetyLevel::clamped(m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        })
}

fn extract_section(pattern: Option<&Regex>, text: &str) -> String {
    pattern
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
