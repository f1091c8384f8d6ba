//! Job records and their state machine.
//!
//! A job is created `pending`, becomes `running` when execution begins and ends in
//! exactly one of `completed`, `failed` or `cancelled`. Every change goes through
//! [`Job::apply`], which rejects transitions out of a terminal state.

use crate::error::{OrchestrationError, Result};
use chrono::{DateTime, Utc};
use conduit_abstraction::{AgentMetrics, AgentResult, Artifact};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Registered, not yet executing.
    Pending,
    /// Tasks are being dispatched.
    Running,
    /// Every task succeeded.
    Completed,
    /// A task failed or scheduling deadlocked.
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl JobStatus {
    /// Returns `true` for `completed`, `failed` and `cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks if a job in this state may move to `to`.
    ///
    /// # Arguments
    /// * `to` - The target state
    ///
    /// # Returns
    /// Returns `true` if the transition is valid, `false` otherwise.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Pending, Self::Running | Self::Failed | Self::Cancelled) => true,
            (Self::Running, Self::Running) => true,
            (Self::Running, Self::Completed | Self::Failed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// How far a job has got.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Tasks that finished successfully.
    pub completed_count: usize,
    /// Tasks in the graph.
    pub total_count: usize,
    /// First task, in graph order, of the round currently in flight. Other tasks of the
    /// same round run concurrently and are not listed. `None` between rounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<String>,
}

impl JobProgress {
    /// Completion as a percentage (100 for an empty graph).
    pub fn percent(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }
        self.completed_count as f64 / self.total_count as f64 * 100.0
    }
}

/// Recorded outcome of one successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Always `true` for recorded outcomes.
    pub success: bool,
    /// Outputs returned by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    /// Artifacts returned by the agent.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Usage metrics returned by the agent.
    #[serde(default)]
    pub metrics: AgentMetrics,
}

impl From<AgentResult> for TaskOutcome {
    fn from(result: AgentResult) -> Self {
        Self {
            success: result.success,
            outputs: result.outputs,
            artifacts: result.artifacts,
            metrics: result.metrics,
        }
    }
}

/// A requested change to a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    /// Begin executing.
    Start,
    /// Record round progress.
    Progress {
        /// Tasks completed so far.
        completed_count: usize,
        /// Task in flight, or `None` between rounds.
        current_task_id: Option<String>,
    },
    /// Finish successfully with per-task results.
    Complete {
        /// Outcome of every task, keyed by task id.
        results: BTreeMap<String, TaskOutcome>,
    },
    /// Finish with an error.
    Fail {
        /// Error message.
        error: String,
        /// Task the error originated from, if any.
        task_id: Option<String>,
    },
    /// Stop on request.
    Cancel,
}

impl JobTransition {
    /// Status the job holds after this transition.
    pub fn target_status(&self) -> JobStatus {
        match self {
            Self::Start | Self::Progress { .. } => JobStatus::Running,
            Self::Complete { .. } => JobStatus::Completed,
            Self::Fail { .. } => JobStatus::Failed,
            Self::Cancel => JobStatus::Cancelled,
        }
    }
}

/// Runtime record of one graph execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub job_id: String,
    /// Graph being executed.
    pub graph_id: String,
    /// Current state.
    pub status: JobStatus,
    /// Progress counters.
    pub progress: JobProgress,
    /// Creation time, reset when execution starts.
    pub start_time: DateTime<Utc>,
    /// Time the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Task a failure originated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task_id: Option<String>,
    /// Per-task outcomes, present only once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, TaskOutcome>>,
    /// Planner's duration estimate.
    pub estimated_duration_ms: u64,
}

impl Job {
    /// Creates a pending job.
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        graph_id: impl Into<String>,
        total_count: usize,
        estimated_duration_ms: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            graph_id: graph_id.into(),
            status: JobStatus::Pending,
            progress: JobProgress { completed_count: 0, total_count, current_task_id: None },
            start_time: Utc::now(),
            end_time: None,
            error: None,
            failed_task_id: None,
            results: None,
            estimated_duration_ms,
        }
    }

    /// Applies a transition, or leaves the job untouched and returns an error.
    pub fn apply(&mut self, transition: JobTransition) -> Result<()> {
        let to = transition.target_status();
        if !self.status.can_transition_to(to) {
            return Err(OrchestrationError::InvalidTransition { from: self.status, to });
        }

        match transition {
            JobTransition::Start => {
                self.start_time = Utc::now();
            }
            JobTransition::Progress { completed_count, current_task_id } => {
                self.progress.completed_count = completed_count.min(self.progress.total_count);
                self.progress.current_task_id = current_task_id;
            }
            JobTransition::Complete { results } => {
                self.progress.completed_count = self.progress.total_count;
                self.progress.current_task_id = None;
                self.results = Some(results);
                self.end_time = Some(Utc::now());
            }
            JobTransition::Fail { error, task_id } => {
                self.progress.current_task_id = None;
                self.error = Some(error);
                self.failed_task_id = task_id;
                self.results = None;
                self.end_time = Some(Utc::now());
            }
            JobTransition::Cancel => {
                self.progress.current_task_id = None;
                self.end_time = Some(Utc::now());
            }
        }

        self.status = to;
        Ok(())
    }

    /// Milliseconds between the start time and `now` (or the end time, once terminal).
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_milliseconds().max(0) as u64
    }

    /// Estimated milliseconds until completion.
    ///
    /// Only defined while running with at least one completed task:
    /// elapsed / completed × remaining.
    pub fn estimated_remaining_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.status != JobStatus::Running || self.progress.completed_count == 0 {
            return None;
        }
        let completed = self.progress.completed_count as u64;
        let remaining = self.progress.total_count.saturating_sub(self.progress.completed_count) as u64;
        Some(self.elapsed_ms(now) / completed * remaining)
    }
}

/// Returned immediately by a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Id of the registered job.
    pub job_id: String,
    /// Always `pending` at submission time.
    pub status: JobStatus,
    /// Planner's duration estimate.
    pub estimated_duration_ms: u64,
}

/// Status view of a job for polling callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task_id: Option<String>,
}

impl StatusReport {
    /// Builds a report for `job` as of `now`.
    pub fn from_job(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            progress: job.progress.clone(),
            elapsed_ms: job.elapsed_ms(now),
            estimated_remaining_ms: job.estimated_remaining_ms(now),
            error: job.error.clone(),
            failed_task_id: job.failed_task_id.clone(),
        }
    }
}
