use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::errors::ConfigurationError;
use crate::domain::models::{AgentSpec, ModelParams, TaskSpec};

pub const AGENTS_FILE: &str = "agents.yaml";
pub const TASKS_FILE: &str = "tasks.yaml";

/// One entry of agents.yaml
#[derive(Debug, Deserialize)]
struct AgentEntry {
    role: String,
    goal: String,
    backstory: String,
    #[serde(default)]
    llm: ModelParams,
}

/// One entry of tasks.yaml
#[derive(Debug, Deserialize)]
struct TaskEntry {
    description: String,
    #[serde(default)]
    expected_output: String,
    agent: String,
    #[serde(default, alias = "predecessors")]
    context: Vec<String>,
}

/// Loader for crew definition files
pub struct CrewLoader {
    crew_dir: PathBuf,
}

impl CrewLoader {
    /// Create a new crew loader
    pub fn new<P: AsRef<Path>>(crew_dir: P) -> Self {
        Self {
            crew_dir: crew_dir.as_ref().to_path_buf(),
        }
    }

    pub fn crew_dir(&self) -> &Path {
        &self.crew_dir
    }

    /// Load agent specs from `<crew_dir>/agents.yaml`
    pub fn load_agent_specs(&self) -> Result<Vec<AgentSpec>, ConfigurationError> {
        let content = self.read(AGENTS_FILE)?;
        let specs = Self::agents_from_yaml(&content)?;
        info!(count = specs.len(), "Loaded agent definitions");
        Ok(specs)
    }

    /// Load task specs from `<crew_dir>/tasks.yaml`
    pub fn load_task_specs(&self) -> Result<Vec<TaskSpec>, ConfigurationError> {
        let content = self.read(TASKS_FILE)?;
        let specs = Self::tasks_from_yaml(&content)?;
        info!(count = specs.len(), "Loaded task definitions");
        Ok(specs)
    }

    /// Parse agent specs from YAML, in mapping order
    pub fn agents_from_yaml(yaml: &str) -> Result<Vec<AgentSpec>, ConfigurationError> {
        Ok(parse_entries::<AgentEntry>(yaml, AGENTS_FILE)?
            .into_iter()
            .map(|(name, entry)| {
                AgentSpec::new(name, entry.role, entry.goal, entry.backstory)
                    .with_model_params(entry.llm)
            })
            .collect())
    }

    /// Parse task specs from YAML, in mapping order
    pub fn tasks_from_yaml(yaml: &str) -> Result<Vec<TaskSpec>, ConfigurationError> {
        Ok(parse_entries::<TaskEntry>(yaml, TASKS_FILE)?
            .into_iter()
            .map(|(name, entry)| {
                let task = TaskSpec::new(name, entry.description, entry.expected_output, entry.agent);
                entry
                    .context
                    .into_iter()
                    .fold(task, |task, predecessor| task.with_predecessor(predecessor))
            })
            .collect())
    }

    fn read(&self, filename: &str) -> Result<String, ConfigurationError> {
        let path = self.crew_dir.join(filename);
        debug!("Loading crew file from: {}", path.display());

        std::fs::read_to_string(&path).map_err(|e| ConfigurationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Deserialize a top-level `name -> entry` mapping, keeping key order.
fn parse_entries<T>(yaml: &str, source_name: &str) -> Result<Vec<(String, T)>, ConfigurationError>
where
    T: for<'de> Deserialize<'de>,
{
    let malformed = |message: String| ConfigurationError::Malformed {
        source_name: source_name.to_string(),
        message,
    };

    let mapping: Mapping = serde_yaml::from_str(yaml).map_err(|e| malformed(e.to_string()))?;

    mapping
        .into_iter()
        .map(|(key, value)| {
            let name = match key {
                Value::String(name) if !name.trim().is_empty() => name,
                other => return Err(malformed(format!("invalid entry name: {other:?}"))),
            };
            let entry = serde_yaml::from_value::<T>(value)
                .map_err(|e| malformed(format!("entry '{name}': {e}")))?;
            Ok((name, entry))
        })
        .collect()
}
