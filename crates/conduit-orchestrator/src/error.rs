// Error types for orchestration

use crate::job::JobStatus;
use thiserror::Error;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Orchestration errors
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Graph failed structural validation
    #[error("Invalid task graph: {}", .0.join("; "))]
    InvalidGraph(Vec<String>),

    /// Job not found in the store
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A job with the same id already exists
    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    /// Status change not allowed from the current state
    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: JobStatus,
        /// Requested status
        to: JobStatus,
    },

    /// No agent registered for a task's agent reference
    #[error("No agent registered for '{agent_ref}' (task '{task_id}')")]
    AgentNotFound {
        /// Task that referenced the agent
        task_id: String,
        /// Unknown agent reference
        agent_ref: String,
    },

    /// A task failed during execution
    #[error("Task '{task_id}' failed: {message}")]
    TaskFailed {
        /// Task that failed
        task_id: String,
        /// Failure message
        message: String,
    },

    /// No task became ready while tasks remained
    #[error("Scheduling deadlock: no runnable tasks among [{}]", .remaining.join(", "))]
    SchedulingDeadlock {
        /// Tasks that could never start
        remaining: Vec<String>,
    },

    /// Job store backend error
    #[error("Job store error: {0}")]
    Store(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OrchestrationError {
    /// Returns the task that caused the error, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::AgentNotFound { task_id, .. } | Self::TaskFailed { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}
