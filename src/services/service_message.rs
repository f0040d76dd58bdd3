//! Detection of provider notices returned in place of an answer.
//!
//! Some providers answer an overloaded or throttled request with a polite
//! notice ("rate limit exceeded, try again later") instead of an HTTP error.
//! Treating that text as a task output would feed it to every later agent.

use regex::Regex;
use std::sync::LazyLock;

const NOTICE_PATTERNS: [&str; 6] = [
    r"reached (?:the )?limit of (?:our|your) processing time",
    r"rate limits? (?:exceeded|reached)",
    r"try again (?:later|in a (?:few )?(?:minutes|seconds))",
    r"(?:service|api) (?:is )?(?:unavailable|not available)",
    r"please wait (?:a (?:moment|minute|second))",
    r"queue (?:is )?(?:full|at capacity)",
];

/// Short answers mentioning any of these are treated as notices.
const SHORT_NOTICE_WORDS: [&str; 4] = ["sorry", "unavailable", "try again", "limit"];
const SHORT_NOTICE_MAX_WORDS: usize = 15;

/// Answers opening with an apology and this short are treated as notices.
const APOLOGY_PREFIXES: [&str; 3] = ["sorry", "i apologize", "unfortunately"];
const APOLOGY_MAX_WORDS: usize = 25;

static NOTICES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| NOTICE_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect());

/// Whether `text` looks like a provider service message rather than an answer.
pub fn is_service_message(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }

    if NOTICES.iter().any(|re| re.is_match(&lower)) {
        return true;
    }

    let words = lower.split_whitespace().count();

    if words < SHORT_NOTICE_MAX_WORDS && SHORT_NOTICE_WORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }

    words < APOLOGY_MAX_WORDS && APOLOGY_PREFIXES.iter().any(|p| lower.starts_with(p))
}
