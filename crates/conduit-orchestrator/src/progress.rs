//! Progress reporting for graph execution.
//!
//! This module broadcasts execution events to any number of subscribers and keeps an
//! aggregate metrics snapshot across all jobs.

use crate::job::JobStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

/// Capacity of the event channel. Slow subscribers lag rather than block execution.
const EVENT_CAPACITY: usize = 256;

/// Execution event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A job was registered.
    JobSubmitted {
        /// Job ID.
        job_id: String,
        /// Number of tasks in the graph.
        total_tasks: usize,
    },
    /// A task was dispatched to its agent.
    TaskStarted {
        /// Job ID.
        job_id: String,
        /// Task ID.
        task_id: String,
        /// Agent reference.
        agent_ref: String,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// Job ID.
        job_id: String,
        /// Task ID.
        task_id: String,
        /// Duration reported by the agent.
        duration_ms: u64,
    },
    /// A task failed.
    TaskFailed {
        /// Job ID.
        job_id: String,
        /// Task ID.
        task_id: String,
        /// Error message.
        error: String,
    },
    /// A job reached a terminal state.
    JobFinished {
        /// Job ID.
        job_id: String,
        /// Terminal status.
        status: JobStatus,
    },
}

/// Aggregate execution metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMetrics {
    /// Jobs registered.
    pub jobs_submitted: usize,
    /// Jobs that completed.
    pub jobs_completed: usize,
    /// Jobs that failed.
    pub jobs_failed: usize,
    /// Jobs that were cancelled.
    pub jobs_cancelled: usize,
    /// Tasks currently dispatched.
    pub active_tasks: usize,
    /// Tasks that completed.
    pub tasks_completed: usize,
    /// Tasks that failed.
    pub tasks_failed: usize,
}

/// Progress reporter shared by every job of an executor.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    /// Broadcast sender for execution events.
    broadcast_tx: broadcast::Sender<ExecutionEvent>,
    /// Current metrics.
    metrics: Arc<Mutex<ProgressMetrics>>,
}

impl ProgressReporter {
    /// Creates a new progress reporter.
    #[must_use]
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { broadcast_tx, metrics: Arc::new(Mutex::new(ProgressMetrics::default())) }
    }

    /// Subscribes to execution events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Gets the current metrics snapshot.
    pub async fn snapshot(&self) -> ProgressMetrics {
        self.metrics.lock().await.clone()
    }

    /// Updates metrics for `event` and broadcasts it.
    pub async fn emit(&self, event: ExecutionEvent) {
        {
            let mut metrics = self.metrics.lock().await;
            match &event {
                ExecutionEvent::JobSubmitted { .. } => metrics.jobs_submitted += 1,
                ExecutionEvent::TaskStarted { .. } => metrics.active_tasks += 1,
                ExecutionEvent::TaskCompleted { .. } => {
                    metrics.tasks_completed += 1;
                    metrics.active_tasks = metrics.active_tasks.saturating_sub(1);
                }
                ExecutionEvent::TaskFailed { .. } => {
                    metrics.tasks_failed += 1;
                    metrics.active_tasks = metrics.active_tasks.saturating_sub(1);
                }
                ExecutionEvent::JobFinished { status, .. } => match status {
                    JobStatus::Completed => metrics.jobs_completed += 1,
                    JobStatus::Failed => metrics.jobs_failed += 1,
                    JobStatus::Cancelled => metrics.jobs_cancelled += 1,
                    JobStatus::Pending | JobStatus::Running => {}
                },
            }
        }

        debug!("Progress event: {:?}", event);
        // No subscribers is not an error.
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
