//! Domain layer for the HypnoBot pipeline
//!
//! Agent and task definitions, the per-request execution context, the chat
//! result shape, and the completion backend port.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{BackendError, ConfigurationError, PipelineError};
