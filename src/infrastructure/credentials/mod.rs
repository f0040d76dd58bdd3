//! API credential resolution
//!
//! The key comes from `backend.api_key` or the provider's conventional
//! environment variable. Placeholder values from sample `.env` files are
//! rejected before any task runs.

use crate::domain::errors::ConfigurationError;
use crate::domain::models::BackendConfig;

/// Shortest string accepted as a real key.
const MIN_KEY_LEN: usize = 20;

/// Environment variable consulted for a provider.
pub fn env_var_for(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "anthropic" => "ANTHROPIC_API_KEY",
        _ => "OPENAI_API_KEY",
    }
}

/// Resolve and sanity-check the API key for the configured provider.
pub fn resolve_api_key(config: &BackendConfig) -> Result<String, ConfigurationError> {
    let key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(env_var_for(&config.provider)).ok())
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigurationError::MissingCredential(config.provider.clone()))?;

    if is_placeholder(&key) {
        return Err(ConfigurationError::PlaceholderCredential(config.provider.clone()));
    }

    Ok(key)
}

/// True for values such as `your_api_key_here` or anything too short to be real.
pub fn is_placeholder(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("your_") || lower.ends_with("_here") || key.chars().count() < MIN_KEY_LEN
}

/// Describe a key for logs without revealing it.
pub fn describe_key(key: &str) -> String {
    format!("set ({} chars)", key.chars().count())
}
