//! Pipeline services: planning, execution, parsing and assembly.

pub mod agent_registry;
pub mod orchestrator;
pub mod output_parser;
pub mod pipeline;
pub mod result_assembler;
pub mod service_message;
pub mod task_chain;
pub mod template;

pub use agent_registry::{Agent, AgentOutput, AgentRegistry};
pub use orchestrator::{ChainOutcome, ChainRun, Orchestrator, RetryPolicy};
pub use pipeline::{HypnoPipeline, PipelineOptions};
pub use result_assembler::ResultAssembler;
pub use task_chain::{PlannedTask, TaskChain};
pub use template::PromptTemplate;
