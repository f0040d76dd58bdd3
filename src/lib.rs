//! HypnoBot - multi-agent hypnotherapy chatbot pipeline
//!
//! A user message flows through a fixed chain of agent tasks: a gating
//! categorizer, a drafting agent, and a series of reviewers. The final
//! review's free text is parsed into a [`ChatResult`] carrying the revised
//! answer and a safety level.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the completion port
//! - **Adapters** (`adapters`): completion backends (OpenAI, Anthropic, mock)
//! - **Infrastructure Layer** (`infrastructure`): settings, crew files, credentials, logging
//! - **Service Layer** (`services`): task chain planning, orchestration, parsing, assembly
//! - **CLI Layer** (`cli`): `chat`, `serve` and `check` commands
//!
//! # Example
//!
//! ```ignore
//! use hypnobot::{ConfigLoader, HypnoPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let pipeline = HypnoPipeline::from_config(&config)?;
//!     let result = pipeline.process("What is hypnotherapy?").await?;
//!     println!("{}", result.final_response);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{BackendError, ConfigurationError, PipelineError};
pub use domain::models::{
    AgentSpec, ChatMetadata, ChatResult, Config, ModelParams, SafetyLevel, TaskSpec, TokenUsage,
};
pub use domain::ports::{Completion, CompletionBackend, CompletionRequest};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::pipeline::{HypnoPipeline, PipelineOptions};
