//! Sequential execution of a task chain for one request.
//!
//! Each task's prompt is rendered from the user input and its declared
//! predecessors' outputs, sent to its agent, and the raw answer is stored in
//! the request's `ExecutionContext`. A rejected gate stops the chain before
//! any other agent is called. A backend failure stops it too, and the
//! outputs gathered so far are returned with the error so the caller can
//! degrade gracefully.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{BackendError, ConfigurationError, PipelineError};
use crate::domain::models::{Categorization, ExecutionContext, RetryConfig, USER_INPUT_PLACEHOLDER};
use crate::services::agent_registry::{Agent, AgentOutput, AgentRegistry};
use crate::services::output_parser::parse_categorization;
use crate::services::service_message::is_service_message;
use crate::services::task_chain::{PlannedTask, TaskChain};

/// Longest service-message excerpt kept in the error.
const NOTICE_EXCERPT_CHARS: usize = 120;

/// Retry policy for transient backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Every call is attempted exactly once.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
        }
    }

    pub const fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// How a chain run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// Every task produced output.
    Completed,
    /// The gating task did not approve the request.
    Gated(Categorization),
    /// A completion call failed; later tasks were not run.
    Aborted {
        failed_task: String,
        error: BackendError,
    },
}

/// Context accumulated by a run, and how it ended.
#[derive(Debug, Clone)]
pub struct ChainRun {
    pub context: ExecutionContext,
    pub outcome: ChainOutcome,
}

/// Runs task chains against an agent registry.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    retry: RetryPolicy,
    skip_gate_on_error: bool,
    detect_service_messages: bool,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            retry: RetryPolicy::none(),
            skip_gate_on_error: false,
            detect_service_messages: true,
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the full chain when the gating call itself fails.
    #[must_use]
    pub const fn with_skip_gate_on_error(mut self, skip: bool) -> Self {
        self.skip_gate_on_error = skip;
        self
    }

    #[must_use]
    pub const fn with_service_message_detection(mut self, enabled: bool) -> Self {
        self.detect_service_messages = enabled;
        self
    }

    /// Execute `chain` for one user message.
    ///
    /// Configuration problems and cancellation are errors; backend failures
    /// are reported through [`ChainOutcome::Aborted`].
    #[instrument(skip(self, chain, user_input, cancel), fields(tasks = chain.len()))]
    pub async fn run(
        &self,
        chain: &TaskChain,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> Result<ChainRun, PipelineError> {
        let mut context = ExecutionContext::new(user_input);

        for (index, task) in chain.tasks().iter().enumerate() {
            if cancel.is_cancelled() {
                info!(task = task.name(), "Request cancelled before task");
                return Err(PipelineError::Cancelled);
            }

            let is_gate = chain.is_gate(task.name());
            let prompt = render_prompt(task, &context)?;
            let agent = self.registry.get(&task.spec.agent_name).ok_or_else(|| {
                ConfigurationError::UnknownAgent {
                    task: task.spec.name.clone(),
                    agent: task.spec.agent_name.clone(),
                }
            })?;

            info!(
                "Executing task {}/{}: {} (agent: {})",
                index + 1,
                chain.len(),
                task.name(),
                agent.name()
            );

            let started = Instant::now();
            match self.call_with_retry(agent, task, &prompt, is_gate, cancel).await? {
                Ok(output) => {
                    info!(
                        task = task.name(),
                        output_len = output.text.len(),
                        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Task completed"
                    );
                    if let Some(usage) = &output.usage {
                        context.record_usage(usage);
                    }
                    context.record_output(task.name(), output.text);

                    if is_gate {
                        let verdict = parse_categorization(context.output(task.name()).unwrap_or_default());
                        if !verdict.is_approved() {
                            info!(label = %verdict.label, "Gate rejected request");
                            return Ok(ChainRun {
                                context,
                                outcome: ChainOutcome::Gated(verdict),
                            });
                        }
                        debug!(label = %verdict.label, "Gate approved request");
                    }
                }
                Err(error) if is_gate && self.skip_gate_on_error => {
                    warn!(task = task.name(), %error, "Gating call failed, continuing without gate");
                }
                Err(error) => {
                    warn!(task = task.name(), %error, "Task failed, aborting chain");
                    return Ok(ChainRun {
                        context,
                        outcome: ChainOutcome::Aborted {
                            failed_task: task.spec.name.clone(),
                            error,
                        },
                    });
                }
            }
        }

        Ok(ChainRun {
            context,
            outcome: ChainOutcome::Completed,
        })
    }

    /// One task's call, retried per policy. The outer `Result` carries cancellation only.
    async fn call_with_retry(
        &self,
        agent: &Agent,
        task: &PlannedTask,
        prompt: &str,
        is_gate: bool,
        cancel: &CancellationToken,
    ) -> Result<Result<AgentOutput, BackendError>, PipelineError> {
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                result = agent.invoke(prompt, &task.spec.expected_output_hint) => result,
            };

            let result = result.and_then(|output| {
                if self.detect_service_messages && !is_gate && is_service_message(&output.text) {
                    Err(BackendError::ServiceMessage(
                        output.text.chars().take(NOTICE_EXCERPT_CHARS).collect(),
                    ))
                } else {
                    Ok(output)
                }
            });

            match result {
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Task {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        task.name(),
                        attempt,
                        self.retry.max_retries + 1,
                        error,
                        delay
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                other => return Ok(other),
            }
        }
    }
}

/// Fill the task's placeholders from the user input and its declared predecessors.
fn render_prompt(task: &PlannedTask, context: &ExecutionContext) -> Result<String, ConfigurationError> {
    task.template.render(task.name(), |name| {
        if name == USER_INPUT_PLACEHOLDER {
            Some(context.user_input())
        } else if task.spec.depends_on(name) {
            context.output(name)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::backends::{MockBackend, MockResponse};
    use crate::domain::models::{AgentSpec, ModelParams, TaskSpec};

    fn registry(backend: Arc<MockBackend>) -> Arc<AgentRegistry> {
        Arc::new(
            AgentRegistry::build(
                vec![
                    AgentSpec::new("categorizer", "Categorizer", "g", "b"),
                    AgentSpec::new("writer", "Writer", "g", "b"),
                    AgentSpec::new("reviewer", "Reviewer", "g", "b"),
                ],
                backend,
                &ModelParams::default(),
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    fn chain(registry: &AgentRegistry) -> TaskChain {
        TaskChain::from_ordered(
            vec![
                TaskSpec::new("gate", "Classify: {user_input}", "", "categorizer"),
                TaskSpec::new("draft", "Answer: {user_input}", "", "writer").with_predecessor("gate"),
                TaskSpec::new("review", "Review {draft} for {user_input}", "", "reviewer")
                    .with_predecessor("draft"),
            ],
            registry,
        )
        .unwrap()
        .with_gate("gate")
        .unwrap()
    }

    fn approving_backend() -> MockBackend {
        MockBackend::new()
            .with_agent_response("categorizer", MockResponse::success("APPROPRIATE"))
            .with_agent_response("writer", MockResponse::success("A calm, focused state."))
            .with_agent_response("reviewer", MockResponse::success("Looks good.\nSafety Level: 0"))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_full_run_threads_outputs() {
        let backend = Arc::new(approving_backend());
        let registry = registry(backend.clone());
        let chain = chain(&registry);
        let orchestrator = Orchestrator::new(registry);

        let run = orchestrator
            .run(&chain, "What is hypnosis?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcome, ChainOutcome::Completed);
        assert_eq!(run.context.completed_tasks(), vec!["gate", "draft", "review"]);
        assert_eq!(run.context.usage().calls, 3);

        let requests = backend.requests().await;
        assert_eq!(requests[2].prompt, "Review A calm, focused state. for What is hypnosis?");
    }

    #[tokio::test]
    async fn test_rejected_gate_stops_chain() {
        let backend = Arc::new(
            approving_backend()
                .with_agent_response("categorizer", MockResponse::success("INAPPROPRIATE: off topic")),
        );
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .run(&chain, "Tell me a joke", &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(run.outcome, ChainOutcome::Gated(ref v) if v.label == "INAPPROPRIATE: OFF TOPIC"));
        assert_eq!(backend.invocations("writer").await, 0);
        assert_eq!(backend.invocations("reviewer").await, 0);
    }

    #[tokio::test]
    async fn test_backend_error_aborts_with_partial_context() {
        let backend = Arc::new(
            approving_backend()
                .with_agent_response("writer", MockResponse::failure(BackendError::RateLimited)),
        );
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .run(&chain, "What is hypnosis?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            run.outcome,
            ChainOutcome::Aborted {
                failed_task: "draft".to_string(),
                error: BackendError::RateLimited,
            }
        );
        assert_eq!(run.context.completed_tasks(), vec!["gate"]);
        assert_eq!(backend.invocations("reviewer").await, 0);
    }

    #[tokio::test]
    async fn test_gate_failure_is_fatal_by_default() {
        let backend = Arc::new(
            approving_backend().with_agent_response(
                "categorizer",
                MockResponse::failure(BackendError::Transport("reset".to_string())),
            ),
        );
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(run.outcome, ChainOutcome::Aborted { ref failed_task, .. } if failed_task == "gate"));
        assert_eq!(backend.total_invocations().await, 1);
    }

    #[tokio::test]
    async fn test_gate_failure_skipped_when_allowed() {
        let backend = Arc::new(
            approving_backend().with_agent_response(
                "categorizer",
                MockResponse::failure(BackendError::Transport("reset".to_string())),
            ),
        );
        let registry = registry(backend.clone());
        // The draft must not require the gate's output when the gate may be skipped.
        let chain = TaskChain::from_ordered(
            vec![
                TaskSpec::new("gate", "Classify: {user_input}", "", "categorizer"),
                TaskSpec::new("draft", "Answer: {user_input}", "", "writer"),
            ],
            &registry,
        )
        .unwrap()
        .with_gate("gate")
        .unwrap();

        let run = Orchestrator::new(registry)
            .with_skip_gate_on_error(true)
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcome, ChainOutcome::Completed);
        assert_eq!(run.context.completed_tasks(), vec!["draft"]);
    }

    #[tokio::test]
    async fn test_transient_error_retried() {
        let backend = Arc::new(
            approving_backend().with_queued_response("writer", MockResponse::failure(BackendError::RateLimited)),
        );
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .with_retry_policy(RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            })
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcome, ChainOutcome::Completed);
        assert_eq!(backend.invocations("writer").await, 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let backend = Arc::new(approving_backend().with_agent_response(
            "writer",
            MockResponse::failure(BackendError::Authentication("bad key".to_string())),
        ));
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .with_retry_policy(RetryPolicy {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            })
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(run.outcome, ChainOutcome::Aborted { .. }));
        assert_eq!(backend.invocations("writer").await, 1);
    }

    #[tokio::test]
    async fn test_service_message_aborts_non_gate_task() {
        let backend = Arc::new(approving_backend().with_agent_response(
            "writer",
            MockResponse::success("Rate limit exceeded, please try again later."),
        ));
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            run.outcome,
            ChainOutcome::Aborted { error: BackendError::ServiceMessage(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_service_message_detection_can_be_disabled() {
        let backend = Arc::new(
            approving_backend().with_agent_response("writer", MockResponse::success("Sorry, try again.")),
        );
        let registry = registry(backend.clone());
        let chain = chain(&registry);

        let run = Orchestrator::new(registry)
            .with_service_message_detection(false)
            .run(&chain, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcome, ChainOutcome::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_no_calls() {
        let backend = Arc::new(approving_backend());
        let registry = registry(backend.clone());
        let chain = chain(&registry);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Orchestrator::new(registry).run(&chain, "hi", &cancel).await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(backend.total_invocations().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_call_stops_chain() {
        let backend = Arc::new(approving_backend().with_agent_response(
            "writer",
            MockResponse::success("slow").with_delay(Duration::from_secs(10)),
        ));
        let registry = registry(backend.clone());
        let chain = chain(&registry);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = Orchestrator::new(registry).run(&chain, "hi", &cancel).await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(backend.invocations("reviewer").await, 0);
    }
}
