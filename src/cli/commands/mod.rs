//! CLI command implementations.

pub mod chat;
pub mod check;
pub mod serve;
