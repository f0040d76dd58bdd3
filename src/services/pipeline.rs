//! The public entry point: one user message in, one `ChatResult` out.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::backends::build_backend;
use crate::domain::errors::{ConfigurationError, PipelineError};
use crate::domain::models::{AgentSpec, BackendConfig, ChatResult, Config, ModelParams, TaskSpec};
use crate::domain::ports::CompletionBackend;
use crate::infrastructure::credentials::resolve_api_key;
use crate::infrastructure::crew::CrewLoader;
use crate::services::agent_registry::AgentRegistry;
use crate::services::orchestrator::{ChainOutcome, Orchestrator, RetryPolicy};
use crate::services::result_assembler::ResultAssembler;
use crate::services::task_chain::TaskChain;

/// Knobs for assembling a pipeline from already-loaded specs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub gate_task: Option<String>,
    pub review_task: Option<String>,
    pub skip_gate_on_error: bool,
    pub detect_service_messages: bool,
    pub retry: RetryPolicy,
    pub defaults: ModelParams,
    pub call_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            gate_task: None,
            review_task: None,
            skip_gate_on_error: false,
            detect_service_messages: true,
            retry: RetryPolicy::none(),
            defaults: ModelParams::default(),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gate_task: config.pipeline.gate_task.clone(),
            review_task: config.pipeline.review_task.clone(),
            skip_gate_on_error: config.pipeline.skip_gate_on_error,
            detect_service_messages: config.pipeline.detect_service_messages,
            retry: RetryPolicy::from_config(&config.retry),
            defaults: default_params(&config.backend),
            call_timeout: Duration::from_secs(config.backend.timeout_secs),
        }
    }
}

fn default_params(backend: &BackendConfig) -> ModelParams {
    ModelParams {
        model: Some(backend.default_model.clone()),
        temperature: Some(backend.default_temperature),
        max_tokens: Some(backend.default_max_tokens),
    }
}

/// A validated crew bound to a completion backend.
///
/// Construction does every check that does not need the network, so a
/// pipeline that builds can only fail per request on backend errors, which
/// `process` turns into degraded results.
pub struct HypnoPipeline {
    chain: TaskChain,
    orchestrator: Orchestrator,
    assembler: ResultAssembler,
}

impl HypnoPipeline {
    /// Resolve credentials, load the crew from `pipeline.crew_dir`, and validate it.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let api_key = resolve_api_key(&config.backend)?;
        let backend = build_backend(&config.backend, &api_key)?;

        let loader = CrewLoader::new(&config.pipeline.crew_dir);
        let agents = loader.load_agent_specs()?;
        let tasks = loader.load_task_specs()?;

        info!(
            provider = %config.backend.provider,
            crew_dir = %loader.crew_dir().display(),
            agents = agents.len(),
            tasks = tasks.len(),
            "Loaded crew"
        );

        Self::new(agents, tasks, backend, PipelineOptions::from_config(config))
    }

    /// Build from explicit specs. Tasks run in the order given.
    pub fn new(
        agents: Vec<AgentSpec>,
        tasks: Vec<TaskSpec>,
        backend: Arc<dyn CompletionBackend>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let registry = AgentRegistry::build(agents, backend, &options.defaults, options.call_timeout)?;

        let mut chain = TaskChain::from_ordered(tasks, &registry)?;
        if let Some(gate) = options.gate_task.as_deref() {
            chain = chain.with_gate(gate)?;
        }
        if options.skip_gate_on_error {
            if let Some(gate) = chain.gate() {
                if let Some(task) = chain
                    .tasks()
                    .iter()
                    .find(|t| t.template.placeholders().contains(&gate))
                {
                    return Err(ConfigurationError::GateOutputUnavailable {
                        task: task.name().to_string(),
                        gate: gate.to_string(),
                    }
                    .into());
                }
            }
        }
        if let Some(review) = options.review_task.as_deref() {
            if !chain.contains(review) {
                return Err(ConfigurationError::UnknownTask(review.to_string()).into());
            }
        }

        let orchestrator = Orchestrator::new(Arc::new(registry))
            .with_retry_policy(options.retry)
            .with_skip_gate_on_error(options.skip_gate_on_error)
            .with_service_message_detection(options.detect_service_messages);

        Ok(Self {
            chain,
            orchestrator,
            assembler: ResultAssembler::new(options.review_task),
        })
    }

    pub const fn chain(&self) -> &TaskChain {
        &self.chain
    }

    /// Process one message. Backend failures come back as a degraded result,
    /// never as an error.
    pub async fn process(&self, user_input: &str) -> Result<ChatResult, PipelineError> {
        self.process_with_cancel(user_input, &CancellationToken::new()).await
    }

    /// Like [`process`](Self::process), abandoning in-flight work when `cancel` fires.
    pub async fn process_with_cancel(
        &self,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResult, PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("chat", request_id = %request_id);

        async {
            info!(input_len = user_input.len(), "Processing message");

            let run = self.orchestrator.run(&self.chain, user_input, cancel).await?;
            if let ChainOutcome::Aborted { failed_task, error } = &run.outcome {
                warn!(failed_task = %failed_task, %error, "Returning degraded result");
            }

            let mut result = self.assembler.assemble(&self.chain, &run);
            result.metadata.request_id = request_id.clone();

            info!(
                safety_level = result.safety_level.as_u8(),
                refused = result.metadata.refused,
                degraded = result.is_degraded(),
                "Message processed"
            );
            Ok::<_, PipelineError>(result)
        }
        .instrument(span)
        .await
    }
}
