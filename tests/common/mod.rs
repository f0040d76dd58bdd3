//! Common test utilities for integration tests
//!
//! Builds pipelines over a scripted `MockBackend` so tests can both drive
//! the chain and inspect which agents were called with which prompts.

#![allow(dead_code)]

use hypnobot::adapters::backends::{MockBackend, MockResponse};
use hypnobot::{AgentSpec, CompletionBackend, HypnoPipeline, PipelineOptions, TaskSpec};
use std::sync::Arc;

pub const GATE_TASK: &str = "categorization_task";

/// Agent spec with throwaway prompt fields.
pub fn agent(name: &str) -> AgentSpec {
    AgentSpec::new(name, format!("{name} role"), "Help the user", "Test agent")
}

/// Gate followed by one answering task.
pub fn two_task_chain() -> (Vec<AgentSpec>, Vec<TaskSpec>) {
    (
        vec![agent("categorizer"), agent("support_agent")],
        vec![
            TaskSpec::new(GATE_TASK, "Categorize: {user_input}", "A label", "categorizer"),
            TaskSpec::new("answer_task", "Answer: {user_input}", "An answer", "support_agent")
                .with_predecessor(GATE_TASK),
        ],
    )
}

/// Gate, draft, then a review that quotes the draft.
pub fn three_task_chain() -> (Vec<AgentSpec>, Vec<TaskSpec>) {
    (
        vec![agent("categorizer"), agent("support_agent"), agent("safety_officer")],
        vec![
            TaskSpec::new(GATE_TASK, "Categorize: {user_input}", "A label", "categorizer"),
            TaskSpec::new("draft_task", "Answer: {user_input}", "An answer", "support_agent")
                .with_predecessor(GATE_TASK),
            TaskSpec::new(
                "review_task",
                "Question: {user_input}\nDraft: {draft_task}",
                "A reviewed answer",
                "safety_officer",
            )
            .with_predecessor("draft_task"),
        ],
    )
}

pub fn gated_options() -> PipelineOptions {
    PipelineOptions {
        gate_task: Some(GATE_TASK.to_string()),
        ..Default::default()
    }
}

/// Pipeline over `backend`; the backend handle stays with the caller.
pub fn pipeline(crew: (Vec<AgentSpec>, Vec<TaskSpec>), backend: &Arc<MockBackend>) -> HypnoPipeline {
    let backend: Arc<dyn CompletionBackend> = backend.clone();
    pipeline_with_backend(crew, backend)
}

/// Gated pipeline over any backend.
pub fn pipeline_with_backend(
    (agents, tasks): (Vec<AgentSpec>, Vec<TaskSpec>),
    backend: Arc<dyn CompletionBackend>,
) -> HypnoPipeline {
    HypnoPipeline::new(agents, tasks, backend, gated_options()).expect("test crew should be valid")
}

/// Backend whose categorizer approves and whose other agents answer as given.
pub fn approving_backend(answers: &[(&str, &str)]) -> Arc<MockBackend> {
    let backend = answers.iter().fold(
        MockBackend::new().with_agent_response("categorizer", MockResponse::success("APPROPRIATE")),
        |backend, (agent, text)| backend.with_agent_response(*agent, MockResponse::success(*text)),
    );
    Arc::new(backend)
}

/// Initialize tracing output for a test run.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
