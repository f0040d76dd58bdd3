use serde::{Deserialize, Serialize};

/// Main configuration structure for HypnoBot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Completion backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Task chain configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    /// Provider: openai or anthropic
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (for proxies and tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used when an agent does not pin one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature used when an agent does not set one
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Token limit used when an agent does not set one
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// anthropic-version header value
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_timeout_secs() -> u64 {
    120
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            base_url: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            anthropic_version: default_anthropic_version(),
        }
    }
}

/// Task chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Directory holding agents.yaml and tasks.yaml
    #[serde(default = "default_crew_dir")]
    pub crew_dir: String,

    /// Task whose verdict decides whether the rest of the chain runs
    #[serde(default = "default_gate_task")]
    pub gate_task: Option<String>,

    /// Task whose output carries the safety assessment (defaults to the last task)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_task: Option<String>,

    /// Run the full chain when the gating call itself fails
    #[serde(default)]
    pub skip_gate_on_error: bool,

    /// Treat provider notices ("try again later") as failed calls
    #[serde(default = "default_true")]
    pub detect_service_messages: bool,
}

fn default_crew_dir() -> String {
    "config".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_gate_task() -> Option<String> {
    Some("categorization_task".to_string())
}

const fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crew_dir: default_crew_dir(),
            gate_task: default_gate_task(),
            review_task: None,
            skip_gate_on_error: false,
            detect_service_messages: true,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 disables retries)
    #[serde(default)]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
