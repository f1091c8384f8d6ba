//! Agent abstraction layer for Conduit.
//!
//! This module defines the contract every unit-of-work executor satisfies: given a
//! task's inputs and the outputs of the tasks it depends on, produce an
//! [`AgentResult`] or fail with an [`AgentError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Represents an error that can occur while an agent executes a task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentError {
    /// The task inputs were missing or malformed for this agent.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// The agent ran but could not complete the work.
    #[error("Execution Error: {0}")]
    ExecutionFailed(String),

    /// No backing model could be selected for the agent's role.
    #[error("No model available for role '{role}'")]
    NoModelAvailable {
        /// The role the agent requested a model for.
        role: String,
    },

    /// Other unexpected errors.
    #[error("Other Agent Error: {0}")]
    Other(String),
}

/// A file, document or other named output produced by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique artifact identifier.
    pub id: String,
    /// Artifact kind (e.g., "file", "report").
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Human-readable name.
    pub name: String,
    /// Where the artifact can be fetched from (path, URL, storage key).
    pub locator: String,
}

/// Cost and usage figures reported by an agent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Optional cost in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Optional number of backing model calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_calls: Option<u32>,
    /// Optional number of cache hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hits: Option<u32>,
}

/// The result produced by an agent for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the agent considers the task done.
    pub success: bool,
    /// Structured outputs, visible to dependent tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    /// Artifacts produced along the way.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Usage metrics.
    #[serde(default)]
    pub metrics: AgentMetrics,
}

impl AgentResult {
    /// Creates a successful result carrying `outputs`.
    #[must_use]
    pub fn success(outputs: Value) -> Self {
        Self {
            success: true,
            outputs: Some(outputs),
            artifacts: Vec::new(),
            error: None,
            metrics: AgentMetrics::default(),
        }
    }

    /// Creates a failed result with the given message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: None,
            artifacts: Vec::new(),
            error: Some(error.into()),
            metrics: AgentMetrics::default(),
        }
    }

    /// Attaches an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Replaces the metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Everything an agent sees when it is asked to run a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    /// The job this task belongs to.
    pub job_id: String,
    /// The task being executed.
    pub task_id: String,
    /// The task's declared type.
    pub task_type: String,
    /// The task's own inputs.
    pub inputs: Value,
    /// Optional constraints attached to the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
    /// Outputs of every dependency, keyed by dependency task id.
    #[serde(default)]
    pub dependency_outputs: BTreeMap<String, Value>,
}

impl AgentContext {
    /// Creates a context with no dependency outputs.
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        task_id: impl Into<String>,
        task_type: impl Into<String>,
        inputs: Value,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            task_id: task_id.into(),
            task_type: task_type.into(),
            inputs,
            constraints: None,
            dependency_outputs: BTreeMap::new(),
        }
    }

    /// Returns the outputs recorded for a dependency.
    pub fn dependency_output(&self, task_id: &str) -> Option<&Value> {
        self.dependency_outputs.get(task_id)
    }

    /// Looks up a key in the inputs first, then in the constraints.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.inputs
            .get(key)
            .or_else(|| self.constraints.as_ref().and_then(|c| c.get(key)))
    }
}

/// A trait that defines the interface for any task agent.
///
/// Agents are shared across concurrently running jobs, so implementations must be
/// `Send + Sync` and must not rely on being called sequentially.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the unique ID of the agent.
    fn id(&self) -> &str;

    /// Returns a description of the agent's purpose and capabilities.
    fn description(&self) -> &str;

    /// Executes one task.
    ///
    /// Returning `Ok` with `success == false` and returning `Err` are both treated as a
    /// failure of the task by the executor.
    ///
    /// # Errors
    /// Returns an `AgentError` if the task cannot be executed.
    async fn execute(&self, context: &AgentContext) -> Result<AgentResult, AgentError>;
}
