//! Execution plan for a set of task specs.
//!
//! A `TaskChain` is the linear order tasks run in. It is either taken as given
//! (`from_ordered`, which rejects an order that violates a dependency) or
//! derived (`plan`, a stable topological sort). Both validate the same
//! structural rules and parse every template up front.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::errors::ConfigurationError;
use crate::domain::models::{TaskSpec, USER_INPUT_PLACEHOLDER};
use crate::services::agent_registry::AgentRegistry;
use crate::services::template::PromptTemplate;

/// A task with its parsed description.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub spec: TaskSpec,
    pub template: PromptTemplate,
}

impl PlannedTask {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Validated, linearly ordered task chain.
#[derive(Debug, Clone)]
pub struct TaskChain {
    tasks: Vec<PlannedTask>,
    gate: Option<String>,
}

impl TaskChain {
    /// Validate a chain whose order the caller already chose.
    pub fn from_ordered(tasks: Vec<TaskSpec>, registry: &AgentRegistry) -> Result<Self, ConfigurationError> {
        let planned = validate(tasks, registry)?;

        let mut seen: HashSet<&str> = HashSet::new();
        for task in &planned {
            if let Some(missing) = task
                .spec
                .predecessor_names
                .iter()
                .find(|p| !seen.contains(p.as_str()))
            {
                return Err(ConfigurationError::PredecessorOutOfOrder {
                    task: task.spec.name.clone(),
                    predecessor: missing.clone(),
                });
            }
            seen.insert(task.name());
        }

        Ok(Self {
            tasks: planned,
            gate: None,
        })
    }

    /// Order tasks so every predecessor runs first.
    ///
    /// Among tasks that are ready at the same time, the one declared first wins.
    pub fn plan(tasks: Vec<TaskSpec>, registry: &AgentRegistry) -> Result<Self, ConfigurationError> {
        let mut pending = validate(tasks, registry)?;
        let mut ordered: Vec<PlannedTask> = Vec::with_capacity(pending.len());
        let mut placed: HashSet<String> = HashSet::new();

        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|task| task.spec.predecessor_names.iter().all(|p| placed.contains(p)));

            // validate() already rejected cycles, so some task is always ready
            let Some(index) = next else {
                let names: Vec<String> = pending.iter().map(|t| t.spec.name.clone()).collect();
                return Err(ConfigurationError::DependencyCycle(names));
            };

            let task = pending.remove(index);
            placed.insert(task.spec.name.clone());
            ordered.push(task);
        }

        debug!(
            order = ?ordered.iter().map(PlannedTask::name).collect::<Vec<_>>(),
            "Planned task chain"
        );

        Ok(Self {
            tasks: ordered,
            gate: None,
        })
    }

    /// Designate the gating task. It must run first.
    pub fn with_gate(mut self, name: &str) -> Result<Self, ConfigurationError> {
        match self.tasks.iter().position(|t| t.spec.name == name) {
            None => Err(ConfigurationError::UnknownTask(name.to_string())),
            Some(0) => {
                self.gate = Some(name.to_string());
                Ok(self)
            }
            Some(_) => Err(ConfigurationError::GateNotFirst(name.to_string())),
        }
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&PlannedTask> {
        self.tasks.iter().find(|t| t.spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.task(name).is_some()
    }

    pub fn gate(&self) -> Option<&str> {
        self.gate.as_deref()
    }

    pub fn is_gate(&self, name: &str) -> bool {
        self.gate.as_deref() == Some(name)
    }

    /// The last task in the chain.
    pub fn last(&self) -> Option<&PlannedTask> {
        self.tasks.last()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(PlannedTask::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Structural checks shared by both constructors. Keeps declaration order.
fn validate(tasks: Vec<TaskSpec>, registry: &AgentRegistry) -> Result<Vec<PlannedTask>, ConfigurationError> {
    if tasks.is_empty() {
        return Err(ConfigurationError::EmptyChain);
    }

    let mut names: HashSet<&str> = HashSet::new();
    for task in &tasks {
        if !names.insert(task.name.as_str()) {
            return Err(ConfigurationError::DuplicateTask(task.name.clone()));
        }
    }

    for task in &tasks {
        if !registry.contains(&task.agent_name) {
            return Err(ConfigurationError::UnknownAgent {
                task: task.name.clone(),
                agent: task.agent_name.clone(),
            });
        }
        for predecessor in &task.predecessor_names {
            if predecessor == &task.name {
                return Err(ConfigurationError::SelfDependency(task.name.clone()));
            }
            if !names.contains(predecessor.as_str()) {
                return Err(ConfigurationError::UnknownPredecessor {
                    task: task.name.clone(),
                    predecessor: predecessor.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(&tasks) {
        return Err(ConfigurationError::DependencyCycle(path));
    }

    tasks
        .into_iter()
        .map(|spec| {
            let template = PromptTemplate::parse(&spec.description_template)?;
            if let Some(unknown) = template
                .placeholders()
                .into_iter()
                .find(|p| *p != USER_INPUT_PLACEHOLDER && !spec.depends_on(p))
            {
                return Err(ConfigurationError::UnknownPlaceholder {
                    task: spec.name.clone(),
                    placeholder: unknown.to_string(),
                });
            }
            Ok(PlannedTask { spec, template })
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// DFS over predecessor edges. Returns the cycle as `a -> ... -> a`.
fn find_cycle(tasks: &[TaskSpec]) -> Option<Vec<String>> {
    let graph: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|t| (t.name.as_str(), t.predecessor_names.as_slice()))
        .collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::InProgress);
        stack.push(node);

        for next in graph.get(node).copied().unwrap_or_default() {
            match marks.get(next.as_str()) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => {
                    let start = stack.iter().position(|n| *n == next.as_str()).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|n| (*n).to_string()).collect();
                    path.push(next.clone());
                    return Some(path);
                }
                None => {
                    if let Some(path) = visit(next.as_str(), graph, marks, stack) {
                        return Some(path);
                    }
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    for task in tasks {
        if !marks.contains_key(task.name.as_str()) {
            if let Some(path) = visit(task.name.as_str(), &graph, &mut marks, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}
