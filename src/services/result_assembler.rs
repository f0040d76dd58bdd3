//! Shapes the final `ChatResult` from a chain run.
//!
//! Three paths: a completed chain is parsed for its review fields, a gated
//! chain becomes a templated refusal, and an aborted chain degrades to the
//! last good output with a cautious safety level.

use crate::domain::models::{
    Categorization, ChatMetadata, ChatResult, ExecutionContext, SafetyLevel,
};
use crate::infrastructure::logging::SecretScrubber;
use crate::services::orchestrator::{ChainOutcome, ChainRun};
use crate::services::output_parser::parse_review;
use crate::services::task_chain::TaskChain;

/// Shown when no usable answer exists.
pub const APOLOGY: &str =
    "I apologize, but I encountered an issue processing your message. Please try again.";

const REFUSAL_PREFIX: &str = "Sorry, we cannot proceed with this inquiry.";

/// Safety level of any failure path: never "safe", since nothing was reviewed.
pub const DEGRADED_SAFETY_LEVEL: SafetyLevel = SafetyLevel::Caution;

/// Builds chat results for one configured chain.
#[derive(Debug, Clone, Default)]
pub struct ResultAssembler {
    review_task: Option<String>,
    scrubber: SecretScrubber,
}

impl ResultAssembler {
    /// `review_task` supplies the safety fields; `None` means the last task.
    pub fn new(review_task: Option<String>) -> Self {
        Self {
            review_task,
            scrubber: SecretScrubber::new(),
        }
    }

    pub fn assemble(&self, chain: &TaskChain, run: &ChainRun) -> ChatResult {
        match &run.outcome {
            ChainOutcome::Completed => self.completed(chain, &run.context),
            ChainOutcome::Gated(verdict) => refusal(chain, &run.context, verdict),
            ChainOutcome::Aborted { failed_task, error } => {
                self.degraded(chain, &run.context, failed_task, &error.to_string())
            }
        }
    }

    fn completed(&self, chain: &TaskChain, context: &ExecutionContext) -> ChatResult {
        let original = first_substantive_output(chain, context).unwrap_or_default();

        let review_name = self
            .review_task
            .as_deref()
            .or_else(|| chain.last().map(|t| t.name()));
        let review_text = review_name.and_then(|name| context.output(name));
        let review = parse_review(review_text.unwrap_or_default());

        let final_name = chain.last().map(|t| t.name());
        let final_text = if final_name == review_name {
            review.decision_or_response.clone()
        } else {
            parse_review(final_name.and_then(|name| context.output(name)).unwrap_or_default())
                .decision_or_response
        };

        let final_response = if final_text.is_empty() {
            original.to_string()
        } else {
            final_text
        };

        let metadata = ChatMetadata {
            modifications: review.modifications,
            reasoning: review.reasoning,
            review_result: review_text.map(str::to_string),
            ..base_metadata(context)
        };

        ChatResult::new(original, final_response, review.safety_level, metadata)
    }

    fn degraded(
        &self,
        chain: &TaskChain,
        context: &ExecutionContext,
        failed_task: &str,
        error: &str,
    ) -> ChatResult {
        let original = first_substantive_output(chain, context).unwrap_or_default();
        let last_good = context
            .outputs()
            .filter(|(name, _)| !chain.is_gate(name))
            .map(|(_, output)| output)
            .last()
            .unwrap_or(APOLOGY);

        let metadata = ChatMetadata {
            error: Some(self.scrubber.scrub(error)),
            failed_task: Some(failed_task.to_string()),
            ..base_metadata(context)
        };

        ChatResult::new(original, last_good, DEGRADED_SAFETY_LEVEL, metadata)
    }
}

fn refusal(chain: &TaskChain, context: &ExecutionContext, verdict: &Categorization) -> ChatResult {
    let raw_first_line = chain
        .gate()
        .and_then(|gate| context.output(gate))
        .and_then(|text| text.lines().find(|line| !line.trim().is_empty()))
        .unwrap_or_default();

    let (category, reason) = match verdict.label.split_once(':') {
        Some((category, _)) => (
            category.trim().to_string(),
            raw_first_line
                .split_once(':')
                .map(|(_, reason)| reason.trim())
                .unwrap_or_default(),
        ),
        None => (verdict.label.trim().to_string(), ""),
    };

    let explanation = if verdict.explanation.is_empty() {
        reason
    } else {
        verdict.explanation.as_str()
    };

    let mut message = format!("{REFUSAL_PREFIX}\nCategory: {category}");
    if !explanation.is_empty() {
        message.push_str("\n\n");
        message.push_str(explanation);
    }

    let metadata = ChatMetadata {
        category: Some(category),
        refused: true,
        ..base_metadata(context)
    };

    ChatResult::new("", message, SafetyLevel::Safe, metadata)
}

fn first_substantive_output<'a>(chain: &TaskChain, context: &'a ExecutionContext) -> Option<&'a str> {
    chain
        .tasks()
        .iter()
        .filter(|task| !chain.is_gate(task.name()))
        .find_map(|task| context.output(task.name()))
}

fn base_metadata(context: &ExecutionContext) -> ChatMetadata {
    let usage = *context.usage();
    ChatMetadata {
        tasks_completed: context.completed_tasks(),
        usage: (usage.calls > 0).then_some(usage),
        ..Default::default()
    }
}
