//! Task graph executor.
//!
//! Jobs execute in rounds. Each round dispatches every task whose dependencies have all
//! completed, waits for the whole round, then either records progress or fails the job
//! with the first failure in task order. Cancellation is observed at round boundaries;
//! results of tasks still in flight when a job is cancelled are discarded because the
//! store rejects any transition out of `cancelled`.

use crate::error::{OrchestrationError, Result};
use crate::graph::{Task, TaskGraph};
use crate::job::{Job, JobStatus, JobTransition, StatusReport, Submission, TaskOutcome};
use crate::progress::{ExecutionEvent, ProgressMetrics, ProgressReporter};
use crate::registry::AgentRegistry;
use crate::store::{InMemoryJobStore, JobStore};
use crate::validator;
use chrono::Utc;
use conduit_abstraction::{AgentContext, AgentResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on tasks running at once across all jobs. `None` or `0` is unbounded.
    pub max_concurrency: Option<usize>,
    /// Reject structurally invalid graphs at submission.
    pub validate_on_submit: bool,
    /// Finished jobs older than this many seconds are dropped when a new job is
    /// registered. `None` keeps every job.
    pub job_retention_secs: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrency: None, validate_on_submit: true, job_retention_secs: None }
    }
}

/// How a job's execution ended, before it is written to the store.
enum RunOutcome {
    Completed(BTreeMap<String, TaskOutcome>),
    Failed(OrchestrationError),
    Cancelled,
}

/// Drives task graphs to completion through registered agents.
#[derive(Clone)]
pub struct GraphExecutor {
    store: Arc<dyn JobStore>,
    agents: Arc<AgentRegistry>,
    progress: ProgressReporter,
    config: ExecutorConfig,
    limiter: Option<Arc<Semaphore>>,
}

impl fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("agents", &self.agents)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GraphExecutor {
    /// Creates an executor with an in-memory job store and default settings.
    #[must_use]
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self {
            store: Arc::new(InMemoryJobStore::new()),
            agents,
            progress: ProgressReporter::new(),
            config: ExecutorConfig::default(),
            limiter: None,
        }
    }

    /// Replaces the job store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = store;
        self
    }

    /// Applies executor settings.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.limiter = config
            .max_concurrency
            .filter(|limit| *limit > 0)
            .map(|limit| Arc::new(Semaphore::new(limit)));
        self.config = config;
        self
    }

    /// Current settings.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The agent registry tasks are resolved against.
    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    /// Subscribes to execution events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.progress.subscribe()
    }

    /// Aggregate metrics across every job this executor ran.
    pub async fn metrics(&self) -> ProgressMetrics {
        self.progress.snapshot().await
    }

    /// Registers a job for `graph` and starts executing it in the background.
    ///
    /// Returns as soon as the job is recorded as `pending`.
    ///
    /// # Errors
    /// Returns `InvalidGraph` when validation is enabled and the graph is malformed.
    pub async fn submit(&self, graph: TaskGraph) -> Result<Submission> {
        let job = self.register(&graph).await?;
        let submission = Submission {
            job_id: job.job_id.clone(),
            status: job.status,
            estimated_duration_ms: job.estimated_duration_ms,
        };

        let executor = self.clone();
        let job_id = job.job_id;
        tokio::spawn(async move {
            executor.run(&job_id, &graph).await;
        });

        Ok(submission)
    }

    /// Registers a job for `graph`, runs it to a terminal state and returns the record.
    ///
    /// # Errors
    /// Returns `InvalidGraph` when validation is enabled and the graph is malformed.
    pub async fn execute(&self, graph: TaskGraph) -> Result<Job> {
        let job = self.register(&graph).await?;
        self.run(&job.job_id, &graph).await;
        self.status(&job.job_id).await
    }

    /// Returns the current record of a job.
    pub async fn status(&self, job_id: &str) -> Result<Job> {
        self.store
            .get(job_id)
            .await
            .ok_or_else(|| OrchestrationError::JobNotFound(job_id.to_string()))
    }

    /// Returns a status report with elapsed time and an estimate of time remaining.
    pub async fn report(&self, job_id: &str) -> Result<StatusReport> {
        let job = self.status(job_id).await?;
        Ok(StatusReport::from_job(&job, Utc::now()))
    }

    /// Lists all jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    /// Requests cancellation of a job.
    ///
    /// Pending and running jobs become `cancelled`. A job that already reached a
    /// terminal state is left alone and its status is returned unchanged.
    pub async fn cancel(&self, job_id: &str) -> Result<JobStatus> {
        match self.store.apply(job_id, JobTransition::Cancel).await {
            Ok(job) => {
                info!(job_id = %job_id, "Job cancelled");
                self.progress
                    .emit(ExecutionEvent::JobFinished {
                        job_id: job_id.to_string(),
                        status: job.status,
                    })
                    .await;
                Ok(job.status)
            }
            Err(OrchestrationError::InvalidTransition { from, .. }) => {
                debug!(job_id = %job_id, status = %from, "Cancel ignored for finished job");
                Ok(from)
            }
            Err(e) => Err(e),
        }
    }

    /// Polls until a job reaches a terminal state.
    pub async fn wait(&self, job_id: &str, poll_interval: Duration) -> Result<Job> {
        loop {
            let job = self.status(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Removes terminal jobs that finished at least `retention` ago and returns how many
    /// were dropped. Pending and running jobs are never removed.
    pub async fn prune_finished(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let now = Utc::now();

        let mut removed = 0;
        for job in self.store.list().await {
            let expired = job.status.is_terminal()
                && job.end_time.is_some_and(|end| now - end >= retention);
            if expired && self.store.remove(&job.job_id).await.is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Pruned finished jobs");
        }
        removed
    }

    async fn register(&self, graph: &TaskGraph) -> Result<Job> {
        if let Some(secs) = self.config.job_retention_secs {
            self.prune_finished(Duration::from_secs(secs)).await;
        }

        if self.config.validate_on_submit {
            let report = validator::validate(graph);
            if !report.valid {
                warn!(graph_id = %graph.id, errors = report.errors.len(), "Rejected invalid task graph");
                return Err(OrchestrationError::InvalidGraph(report.errors));
            }
        }

        let job = Job::new(
            Uuid::new_v4().to_string(),
            graph.id.clone(),
            graph.len(),
            graph.estimated_duration_ms,
        );
        self.store.insert(job.clone()).await?;
        self.progress
            .emit(ExecutionEvent::JobSubmitted {
                job_id: job.job_id.clone(),
                total_tasks: graph.len(),
            })
            .await;

        info!(job_id = %job.job_id, graph_id = %graph.id, tasks = graph.len(), "Job submitted");
        Ok(job)
    }

    /// Runs a registered job and records its terminal state.
    async fn run(&self, job_id: &str, graph: &TaskGraph) {
        if let Err(e) = self.store.apply(job_id, JobTransition::Start).await {
            debug!(job_id = %job_id, error = %e, "Job not started");
            return;
        }
        info!(job_id = %job_id, "Job started");

        let transition = match self.drive(job_id, graph).await {
            RunOutcome::Completed(results) => JobTransition::Complete { results },
            RunOutcome::Failed(err) => {
                let task_id = err.task_id().map(str::to_string);
                JobTransition::Fail { error: err.to_string(), task_id }
            }
            RunOutcome::Cancelled => {
                info!(job_id = %job_id, "Job stopped after cancellation");
                return;
            }
        };

        match self.store.apply(job_id, transition).await {
            Ok(job) => {
                match job.status {
                    JobStatus::Completed => info!(job_id = %job_id, "Job completed"),
                    _ => error!(
                        job_id = %job_id,
                        task_id = ?job.failed_task_id,
                        error = ?job.error,
                        "Job failed"
                    ),
                }
                self.progress
                    .emit(ExecutionEvent::JobFinished { job_id: job_id.to_string(), status: job.status })
                    .await;
            }
            Err(e) => {
                debug!(job_id = %job_id, error = %e, "Discarding outcome of job that is no longer running");
            }
        }
    }

    /// Executes rounds until every task completed, one failed, or the job was cancelled.
    async fn drive(&self, job_id: &str, graph: &TaskGraph) -> RunOutcome {
        let mut pending: Vec<&Task> = graph.tasks.iter().collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
        let mut results: BTreeMap<String, TaskOutcome> = BTreeMap::new();

        while !pending.is_empty() {
            if !self.is_running(job_id).await {
                return RunOutcome::Cancelled;
            }

            let (ready, blocked): (Vec<&Task>, Vec<&Task>) = pending
                .into_iter()
                .partition(|task| task.dependencies.iter().all(|dep| completed.contains(dep)));
            pending = blocked;

            if ready.is_empty() {
                let remaining: Vec<String> = pending.iter().map(|t| t.id.clone()).collect();
                warn!(job_id = %job_id, remaining = ?remaining, "Scheduling deadlock");
                return RunOutcome::Failed(OrchestrationError::SchedulingDeadlock { remaining });
            }

            let dispatched = self
                .store
                .apply(
                    job_id,
                    JobTransition::Progress {
                        completed_count: completed.len(),
                        current_task_id: Some(ready[0].id.clone()),
                    },
                )
                .await;
            if dispatched.is_err() {
                return RunOutcome::Cancelled;
            }

            debug!(job_id = %job_id, round = ?ready.iter().map(|t| &t.id).collect::<Vec<_>>(), "Dispatching round");
            let handles: Vec<JoinHandle<Result<AgentResult>>> = ready
                .iter()
                .map(|task| {
                    let context = Self::build_context(job_id, task, &outputs);
                    self.spawn_task(job_id, task, context)
                })
                .collect();
            let joined = join_all(handles).await;

            let mut first_failure = None;
            for (task, outcome) in ready.iter().zip(joined) {
                let outcome = outcome.unwrap_or_else(|join_err| {
                    Err(OrchestrationError::TaskFailed {
                        task_id: task.id.clone(),
                        message: format!("agent panicked: {}", join_err),
                    })
                });
                match outcome {
                    Ok(result) => {
                        outputs.insert(task.id.clone(), result.outputs.clone().unwrap_or(Value::Null));
                        completed.insert(task.id.clone());
                        results.insert(task.id.clone(), TaskOutcome::from(result));
                    }
                    Err(err) => {
                        self.progress
                            .emit(ExecutionEvent::TaskFailed {
                                job_id: job_id.to_string(),
                                task_id: task.id.clone(),
                                error: err.to_string(),
                            })
                            .await;
                        if first_failure.is_none() {
                            first_failure = Some(err);
                        }
                    }
                }
            }

            if let Some(err) = first_failure {
                return RunOutcome::Failed(err);
            }

            let recorded = self
                .store
                .apply(
                    job_id,
                    JobTransition::Progress { completed_count: completed.len(), current_task_id: None },
                )
                .await;
            if recorded.is_err() {
                return RunOutcome::Cancelled;
            }
        }

        RunOutcome::Completed(results)
    }

    async fn is_running(&self, job_id: &str) -> bool {
        matches!(self.store.get(job_id).await, Some(job) if job.status == JobStatus::Running)
    }

    fn build_context(job_id: &str, task: &Task, outputs: &BTreeMap<String, Value>) -> AgentContext {
        let mut context =
            AgentContext::new(job_id, task.id.clone(), task.task_type.clone(), task.inputs.clone());
        context.constraints.clone_from(&task.constraints);
        context.dependency_outputs = task
            .dependencies
            .iter()
            .filter_map(|dep| outputs.get(dep).map(|value| (dep.clone(), value.clone())))
            .collect();
        context
    }

    /// Runs one task on its own tokio task so a panicking agent only fails that task.
    fn spawn_task(
        &self,
        job_id: &str,
        task: &Task,
        context: AgentContext,
    ) -> JoinHandle<Result<AgentResult>> {
        let agents = Arc::clone(&self.agents);
        let progress = self.progress.clone();
        let limiter = self.limiter.clone();
        let job_id = job_id.to_string();
        let task_id = task.id.clone();
        let agent_ref = task.agent_ref.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(limiter) => Some(limiter.acquire_owned().await.map_err(|_| {
                    OrchestrationError::TaskFailed {
                        task_id: task_id.clone(),
                        message: "concurrency limiter closed".to_string(),
                    }
                })?),
                None => None,
            };

            let agent = agents.get_agent(&agent_ref).await.ok_or_else(|| {
                OrchestrationError::AgentNotFound { task_id: task_id.clone(), agent_ref: agent_ref.clone() }
            })?;

            progress
                .emit(ExecutionEvent::TaskStarted {
                    job_id: job_id.clone(),
                    task_id: task_id.clone(),
                    agent_ref: agent_ref.clone(),
                })
                .await;
            debug!(job_id = %job_id, task_id = %task_id, agent_ref = %agent_ref, "Executing task");

            let started = Instant::now();
            let mut result = agent.execute(&context).await.map_err(|e| OrchestrationError::TaskFailed {
                task_id: task_id.clone(),
                message: e.to_string(),
            })?;

            if !result.success {
                return Err(OrchestrationError::TaskFailed {
                    task_id,
                    message: result.error.unwrap_or_else(|| "agent reported failure".to_string()),
                });
            }

            if result.metrics.duration_ms == 0 {
                result.metrics.duration_ms = started.elapsed().as_millis() as u64;
            }
            progress
                .emit(ExecutionEvent::TaskCompleted {
                    job_id,
                    task_id,
                    duration_ms: result.metrics.duration_ms,
                })
                .await;

            Ok(result)
        })
    }
}
