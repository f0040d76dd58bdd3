pub mod agent;
pub mod chat_result;
pub mod config;
pub mod context;
pub mod review;
pub mod task;

pub use agent::{AgentSpec, ModelParams};
pub use chat_result::{ChatMetadata, ChatResult};
pub use config::{
    BackendConfig, Config, LoggingConfig, PipelineConfig, RetryConfig, ServerConfig,
};
pub use context::{ExecutionContext, TokenUsage};
pub use review::{Categorization, ParsedReview, SafetyLevel, APPROVED_LABEL};
pub use task::{TaskSpec, USER_INPUT_PLACEHOLDER};
