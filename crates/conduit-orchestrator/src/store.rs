//! Job store.
//!
//! The store owns every job record. Callers read snapshots; all mutation goes through
//! [`JobStore::apply`], which checks and applies a transition under one write lock.

use crate::error::{OrchestrationError, Result};
use crate::job::{Job, JobTransition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Registers a new job.
    ///
    /// # Errors
    /// Returns `DuplicateJob` if a job with the same id exists.
    async fn insert(&self, job: Job) -> Result<()>;

    /// Returns a snapshot of a job.
    async fn get(&self, job_id: &str) -> Option<Job>;

    /// Returns snapshots of all jobs, oldest first.
    async fn list(&self) -> Vec<Job>;

    /// Atomically applies a transition and returns the updated snapshot.
    ///
    /// # Errors
    /// Returns `JobNotFound` for unknown ids and `InvalidTransition` when the job's
    /// current state does not admit the change.
    async fn apply(&self, job_id: &str, transition: JobTransition) -> Result<Job>;

    /// Removes a job, returning it if present.
    async fn remove(&self, job_id: &str) -> Option<Job>;
}

/// In-process job store backed by a map under a `tokio` read-write lock.
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl fmt::Debug for InMemoryJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryJobStore")
            .field("job_count", &self.jobs.try_read().map(|j| j.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { jobs: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Number of stored jobs.
    pub async fn count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(OrchestrationError::DuplicateJob(job.job_id));
        }
        debug!(job_id = %job.job_id, graph_id = %job.graph_id, "Registering job");
        jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.job_id.cmp(&b.job_id)));
        all
    }

    async fn apply(&self, job_id: &str, transition: JobTransition) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| OrchestrationError::JobNotFound(job_id.to_string()))?;

        let from = job.status;
        if let Err(e) = job.apply(transition) {
            debug!(job_id = %job_id, from = %from, error = %e, "Rejected job transition");
            return Err(e);
        }
        if from != job.status {
            debug!(job_id = %job_id, from = %from, to = %job.status, "Job transition");
        }
        Ok(job.clone())
    }

    async fn remove(&self, job_id: &str) -> Option<Job> {
        let removed = self.jobs.write().await.remove(job_id);
        if removed.is_none() {
            warn!(job_id = %job_id, "Attempted to remove non-existent job");
        }
        removed
    }
}
