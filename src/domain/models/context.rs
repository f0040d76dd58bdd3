//! Per-request execution state.

use serde::{Deserialize, Serialize};

/// Token accounting reported by the completion backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Number of completion calls that reported usage
    pub calls: u32,
}

impl TokenUsage {
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            calls: 1,
        }
    }

    pub fn add(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.calls += other.calls;
    }

    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Accumulator of task outputs for one user request.
///
/// Created fresh per request and never shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    user_input: String,
    /// Insertion-ordered as tasks complete
    task_outputs: Vec<(String, String)>,
    usage: TokenUsage,
}

impl ExecutionContext {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            task_outputs: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Store a completed task's raw output. A repeated name replaces the earlier value in place.
    pub fn record_output(&mut self, task_name: impl Into<String>, output: impl Into<String>) {
        let task_name = task_name.into();
        let output = output.into();
        if let Some(slot) = self.task_outputs.iter_mut().find(|(name, _)| *name == task_name) {
            slot.1 = output;
        } else {
            self.task_outputs.push((task_name, output));
        }
    }

    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.usage.add(usage);
    }

    pub fn output(&self, task_name: &str) -> Option<&str> {
        self.task_outputs
            .iter()
            .find(|(name, _)| name == task_name)
            .map(|(_, output)| output.as_str())
    }

    pub fn contains(&self, task_name: &str) -> bool {
        self.output(task_name).is_some()
    }

    /// Outputs in completion order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.task_outputs
            .iter()
            .map(|(name, output)| (name.as_str(), output.as_str()))
    }

    /// Names of completed tasks in completion order.
    pub fn completed_tasks(&self) -> Vec<String> {
        self.task_outputs.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.task_outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_outputs.is_empty()
    }

    pub const fn usage(&self) -> &TokenUsage {
        &self.usage
    }
}
