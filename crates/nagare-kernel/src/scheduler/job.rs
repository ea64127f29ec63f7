//! Background job management.
//!
//! Provides the `JobManager` for tracking jobs started with `spawn { ... }`
//! or `& { ... }`. Each job runs as its own tokio task; its completion is a
//! shared future, so any number of `join`s observe the same cached result.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::ast::Value;

/// Unique identifier for a background job. Rendered as `%N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl JobId {
    /// Parse a handle such as `%3` (the `%` is optional).
    pub fn parse(handle: &str) -> Option<Self> {
        handle.strip_prefix('%').unwrap_or(handle).parse().ok().map(JobId)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Job is currently running.
    Running,
    /// Job finished; its status may still be non-zero.
    Done,
    /// Job was aborted by a fatal error.
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Final state of a job once its frame has torn down.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    /// Status of the job's last statement (1 after a fatal error).
    pub status: i64,
    /// Everything the job yielded, in order.
    pub output: Vec<Value>,
    /// The fatal error that aborted the job, if any.
    pub error: Option<String>,
}

impl JobResult {
    pub fn finished(status: i64, output: Vec<Value>) -> Self {
        Self { status, output, error: None }
    }

    pub fn failed(error: impl Into<String>, output: Vec<Value>) -> Self {
        Self {
            status: 1,
            output,
            error: Some(error.into()),
        }
    }

    fn job_status(&self) -> JobStatus {
        if self.error.is_some() {
            JobStatus::Failed
        } else {
            JobStatus::Done
        }
    }
}

/// Information about a job for listing.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job ID.
    pub id: JobId,
    /// Short description of the spawned block.
    pub command: String,
    /// Current status.
    pub status: JobStatus,
}

type Completion = Shared<BoxFuture<'static, JobResult>>;

struct Job {
    command: String,
    completion: Completion,
    /// Filled by the task itself, so status is visible before any join.
    finished: Arc<OnceLock<JobResult>>,
}

impl Job {
    fn status(&self) -> JobStatus {
        match self.finished.get() {
            Some(result) => result.job_status(),
            None => JobStatus::Running,
        }
    }
}

/// Manager for background jobs.
pub struct JobManager {
    /// Counter for generating unique job IDs.
    next_id: AtomicU64,
    /// Map of job ID to job.
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobManager {
    /// Create a new job manager.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn a new background job.
    ///
    /// `make` receives the job's id so the job knows who it is (a job may
    /// not join itself). Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(&self, command: String, make: F) -> JobId
    where
        F: FnOnce(JobId) -> Fut,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let finished = Arc::new(OnceLock::new());
        let slot = Arc::clone(&finished);
        let task = make(id);
        let handle = tokio::spawn(async move {
            let result = task.await;
            let _ = slot.set(result.clone());
            result
        });
        let slot = Arc::clone(&finished);
        let completion = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let result = JobResult::failed(format!("job panicked: {}", e), Vec::new());
                    let _ = slot.set(result.clone());
                    result
                }
            }
        }
        .boxed()
        .shared();

        tracing::debug!(job = %id, command = %command, "job spawned");
        self.jobs().insert(id, Job { command, completion, finished });
        id
    }

    /// Wait for a specific job to complete. Repeated calls return the
    /// same result.
    pub async fn wait(&self, id: JobId) -> Option<JobResult> {
        let completion = self.jobs().get(&id).map(|job| job.completion.clone())?;
        let result = completion.await;
        tracing::debug!(job = %id, status = result.status, "job joined");
        Some(result)
    }

    /// Wait for all jobs to complete, in id order.
    pub async fn wait_all(&self) -> Vec<(JobId, JobResult)> {
        let mut ids: Vec<JobId> = self.jobs().keys().copied().collect();
        ids.sort();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(result) = self.wait(id).await {
                results.push((id, result));
            }
        }
        results
    }

    /// List all jobs with their status, in id order.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut infos: Vec<JobInfo> = self
            .jobs()
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                command: job.command.clone(),
                status: job.status(),
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get the number of running jobs.
    pub fn running_count(&self) -> usize {
        self.jobs()
            .values()
            .filter(|job| job.status() == JobStatus::Running)
            .count()
    }

    /// Check if a specific job exists.
    pub fn exists(&self, id: JobId) -> bool {
        self.jobs().contains_key(&id)
    }

    /// Get info for a specific job.
    pub fn get(&self, id: JobId) -> Option<JobInfo> {
        self.jobs().get(&id).map(|job| JobInfo {
            id,
            command: job.command.clone(),
            status: job.status(),
        })
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
