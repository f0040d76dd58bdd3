//! Completion backend implementations.

pub mod anthropic;
pub mod mock;
pub mod openai;

use std::sync::Arc;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use mock::{MockBackend, MockResponse};
pub use openai::{OpenAiBackend, OpenAiConfig};

use crate::domain::errors::ConfigurationError;
use crate::domain::models::BackendConfig;
use crate::domain::ports::CompletionBackend;

/// Create the backend named by `config.provider`.
pub fn build_backend(
    config: &BackendConfig,
    api_key: &str,
) -> Result<Arc<dyn CompletionBackend>, ConfigurationError> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiBackend::new(OpenAiConfig::from_backend_config(
            config, api_key,
        ))?)),
        "anthropic" => Ok(Arc::new(AnthropicBackend::new(
            AnthropicConfig::from_backend_config(config, api_key),
        )?)),
        other => Err(ConfigurationError::Malformed {
            source_name: "backend.provider".to_string(),
            message: format!("unknown provider '{other}'"),
        }),
    }
}
