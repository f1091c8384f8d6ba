//! Task graph data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One unit of work in a task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier, unique within the graph.
    pub id: String,
    /// Task kind (e.g., "analysis", "codegen").
    #[serde(rename = "type")]
    pub task_type: String,
    /// Key of the agent that handles this task.
    pub agent_ref: String,
    /// Ids of tasks that must complete first.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Structured inputs for the agent.
    #[serde(default)]
    pub inputs: Value,
    /// Optional constraints (budget, targeting, criticality).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}

impl Task {
    /// Creates a task with no dependencies and empty inputs.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        agent_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            agent_ref: agent_ref.into(),
            dependencies: BTreeSet::new(),
            inputs: Value::Object(serde_json::Map::new()),
            constraints: None,
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.insert(task_id.into());
        self
    }

    /// Sets the inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Value) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// Coarse complexity estimate for a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Few, independent tasks.
    #[default]
    Simple,
    /// Several dependent tasks.
    Moderate,
    /// Deep or wide graphs.
    Complex,
}

/// Risk associated with executing a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only or easily reversible work.
    #[default]
    Low,
    /// Changes that need review.
    Medium,
    /// Changes that are hard to undo.
    High,
}

/// Planner-supplied metadata about a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    /// Complexity estimate.
    #[serde(default)]
    pub complexity: Complexity,
    /// Planner confidence (0.0 to 1.0).
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Risk level.
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Whether a human must approve before execution.
    #[serde(default)]
    pub requires_approval: bool,
}

fn default_confidence() -> f64 {
    1.0
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            complexity: Complexity::default(),
            confidence: default_confidence(),
            risk_level: RiskLevel::default(),
            requires_approval: false,
        }
    }
}

/// A set of tasks whose dependency relation forms a DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraph {
    /// Graph identifier.
    pub id: String,
    /// Tasks in planner order.
    pub tasks: Vec<Task>,
    /// Planner's duration estimate in milliseconds.
    #[serde(default)]
    pub estimated_duration_ms: u64,
    /// Planner metadata.
    #[serde(default)]
    pub metadata: GraphMetadata,
}

impl TaskGraph {
    /// Creates a graph from tasks with default metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: id.into(),
            tasks,
            estimated_duration_ms: 0,
            metadata: GraphMetadata::default(),
        }
    }

    /// Sets the duration estimate.
    #[must_use]
    pub fn with_estimated_duration_ms(mut self, estimated_duration_ms: u64) -> Self {
        self.estimated_duration_ms = estimated_duration_ms;
        self
    }

    /// Parses a graph from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Looks up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if the graph has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
