//! Crew definitions (agents.yaml / tasks.yaml)
//!
//! Loads agent and task specs from a directory. Mapping order in the YAML
//! files is kept and becomes the declaration order used for planning.

pub mod loader;

pub use loader::{CrewLoader, AGENTS_FILE, TASKS_FILE};
