//! Task definitions.
//!
//! A task is one unit of work bound to exactly one agent. Its description is a
//! template whose placeholders are filled from the user's message and from the
//! outputs of the tasks it declares as predecessors.

use serde::{Deserialize, Serialize};

/// Placeholder name always available to every template.
pub const USER_INPUT_PLACEHOLDER: &str = "user_input";

/// A unit of work bound to exactly one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique key, also the placeholder name under which its output is exposed
    pub name: String,
    /// Description with `{placeholder}` slots
    pub description_template: String,
    /// Desired output shape (prompt guidance only, never enforced)
    pub expected_output_hint: String,
    /// Agent that executes this task
    pub agent_name: String,
    /// Tasks whose output must be available before this one runs
    #[serde(default)]
    pub predecessor_names: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        description_template: impl Into<String>,
        expected_output_hint: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description_template: description_template.into(),
            expected_output_hint: expected_output_hint.into(),
            agent_name: agent_name.into(),
            predecessor_names: Vec::new(),
        }
    }

    /// Declare a predecessor. Repeated names are kept once, in first-seen order.
    pub fn with_predecessor(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.predecessor_names.contains(&name) {
            self.predecessor_names.push(name);
        }
        self
    }

    /// Whether `name` is one of this task's declared predecessors.
    pub fn depends_on(&self, name: &str) -> bool {
        self.predecessor_names.iter().any(|p| p == name)
    }
}
