//! Implementation of the `hypnobot check` command.
//!
//! Validates everything `chat` and `serve` need before any backend call: the
//! credential, the crew files, and the task chain built from them.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::backends::MockBackend;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ModelParams, TaskSpec};
use crate::infrastructure::credentials::{describe_key, env_var_for, resolve_api_key};
use crate::infrastructure::crew::CrewLoader;
use crate::services::agent_registry::AgentRegistry;
use crate::services::task_chain::TaskChain;

#[derive(Args, Debug)]
pub struct CheckArgs {}

#[derive(Debug, Default, Serialize)]
pub struct CheckOutput {
    pub success: bool,
    pub provider: String,
    pub credential: String,
    pub crew_dir: String,
    pub agents: Vec<String>,
    pub tasks: Vec<String>,
    pub gate_task: Option<String>,
    pub problems: Vec<String>,
    /// A valid order for the declared tasks, when the declared one is not
    pub suggested_order: Option<Vec<String>>,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Provider:   {}", self.provider),
            format!("Credential: {}", self.credential),
            format!("Crew dir:   {}", self.crew_dir),
        ];
        if !self.agents.is_empty() {
            lines.push(format!("Agents:     {}", self.agents.join(", ")));
        }
        if !self.tasks.is_empty() {
            lines.push(format!("Tasks:      {}", self.tasks.join(" -> ")));
        }
        if let Some(gate) = &self.gate_task {
            lines.push(format!("Gate:       {gate}"));
        }

        if self.success {
            lines.push(format!("\n{}", console::style("All checks passed.").green()));
        } else {
            lines.push(format!("\n{}", console::style("Problems:").red().bold()));
            lines.extend(self.problems.iter().map(|p| format!("  - {p}")));
        }
        if let Some(order) = &self.suggested_order {
            lines.push(format!("\nSuggested task order: {}", order.join(" -> ")));
        }
        lines.join("\n")
    }
}

pub fn execute(_args: CheckArgs, config: Config, json_mode: bool) -> Result<()> {
    let report = run_checks(&config);
    output(&report, json_mode);

    if !report.success {
        bail!("{} problem(s) found", report.problems.len());
    }
    Ok(())
}

pub fn run_checks(config: &Config) -> CheckOutput {
    let mut report = CheckOutput {
        provider: config.backend.provider.clone(),
        crew_dir: config.pipeline.crew_dir.clone(),
        gate_task: config.pipeline.gate_task.clone(),
        ..Default::default()
    };

    report.credential = match resolve_api_key(&config.backend) {
        Ok(key) => describe_key(&key),
        Err(err) => {
            report
                .problems
                .push(format!("{err} (set backend.api_key or {})", env_var_for(&config.backend.provider)));
            "unusable".to_string()
        }
    };

    let loader = CrewLoader::new(&config.pipeline.crew_dir);
    let agents = loader.load_agent_specs();
    let tasks = loader.load_task_specs();
    let (agents, tasks) = match (agents, tasks) {
        (Ok(agents), Ok(tasks)) => (agents, tasks),
        (agents, tasks) => {
            report.problems.extend(agents.err().map(|e| e.to_string()));
            report.problems.extend(tasks.err().map(|e| e.to_string()));
            return finish(report);
        }
    };

    report.agents = agents.iter().map(|a| a.name.clone()).collect();
    report.tasks = tasks.iter().map(|t| t.name.clone()).collect();

    // Validation only: no completion is ever requested.
    let registry = match AgentRegistry::build(
        agents,
        Arc::new(MockBackend::new()),
        &ModelParams::default(),
        Duration::from_secs(config.backend.timeout_secs),
    ) {
        Ok(registry) => registry,
        Err(err) => {
            report.problems.push(err.to_string());
            return finish(report);
        }
    };

    check_chain(&mut report, tasks, &registry, config.pipeline.gate_task.as_deref());
    if let Some(review) = &config.pipeline.review_task {
        if !report.tasks.contains(review) {
            report.problems.push(format!("Unknown review task: {review}"));
        }
    }

    finish(report)
}

fn check_chain(report: &mut CheckOutput, tasks: Vec<TaskSpec>, registry: &AgentRegistry, gate: Option<&str>) {
    let chain = match TaskChain::from_ordered(tasks.clone(), registry) {
        Ok(chain) => chain,
        Err(err) => {
            report.problems.push(err.to_string());
            if let Ok(planned) = TaskChain::plan(tasks, registry) {
                report.suggested_order = Some(planned.names().into_iter().map(str::to_string).collect());
            }
            return;
        }
    };

    if let Some(gate) = gate {
        if let Err(err) = chain.with_gate(gate) {
            report.problems.push(err.to_string());
        }
    }
}

fn finish(mut report: CheckOutput) -> CheckOutput {
    report.success = report.problems.is_empty();
    report
}
