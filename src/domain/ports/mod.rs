//! Port trait definitions (Hexagonal Architecture)
//!
//! - CompletionBackend: one prompt in, one completion out
//!
//! Backends live in `adapters::backends`; services only see this trait.

pub mod completion;

pub use completion::{Completion, CompletionBackend, CompletionRequest, RawCompletion};
