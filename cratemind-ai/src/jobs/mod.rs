//! In-memory job registry
//!
//! Tracks every batch submission from creation to a terminal state. A job is
//! mutated only through `advance` and `finalize`; status moves forward only
//! (`processing -> completed | failed`) and `processed` never exceeds `total`.
//!
//! Retention is an absolute TTL measured from the terminal timestamp. Expired
//! jobs disappear from `get` immediately and are purged by the sweeper task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// New submissions
    Analysis,
    /// Stored tracks sent through the engine again
    Reanalysis,
    /// Catalog lookups for tracks missing enrichment
    Enrichment,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Analysis => "analysis",
            JobKind::Reanalysis => "reanalysis",
            JobKind::Enrichment => "enrichment",
        }
    }
}

/// Result summary for one successfully persisted item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub track_id: String,
    pub filename: String,
    pub tempo: f64,
    pub half_time: bool,
    pub genre: Option<String>,
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub filename: String,
    pub error: String,
}

/// Outcome of one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemReport {
    Success(ItemSummary),
    Failure(ItemError),
}

impl ItemReport {
    pub fn failure(filename: impl Into<String>, error: impl Into<String>) -> Self {
        ItemReport::Failure(ItemError {
            filename: filename.into(),
            error: error.into(),
        })
    }

    pub fn filename(&self) -> &str {
        match self {
            ItemReport::Success(s) => &s.filename,
            ItemReport::Failure(e) => &e.filename,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ItemReport::Success(_) => None,
            ItemReport::Failure(e) => Some(&e.error),
        }
    }
}

/// Terminal outcome passed to `finalize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Whole-job failure with a single top-level error
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Unknown job: {0}")]
    UnknownJob(Uuid),

    #[error("Job {0} is already finalized")]
    AlreadyFinalized(Uuid),

    #[error("Job {job_id} already recorded all {total} items")]
    Overflow { job_id: Uuid, total: usize },

    #[error("Job {job_id} cannot complete with {processed} of {total} items recorded")]
    Incomplete {
        job_id: Uuid,
        processed: usize,
        total: usize,
    },
}

/// Point-in-time view of a job, as returned to pollers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub progress_percent: u8,
    pub errors: Vec<ItemError>,
    /// Only present once the job completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ItemSummary>>,
    /// Top-level error of a failed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
}

#[derive(Debug)]
struct Job {
    id: Uuid,
    kind: JobKind,
    status: JobStatus,
    total: usize,
    processed: usize,
    errors: Vec<ItemError>,
    results: Vec<ItemSummary>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    /// Monotonic terminal time for retention
    ended: Option<Instant>,
}

impl Job {
    fn new(kind: JobKind, total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Processing,
            total,
            processed: 0,
            errors: Vec::new(),
            results: Vec::new(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            ended: None,
        }
    }

    fn is_expired(&self, retention: Duration) -> bool {
        self.ended.map(|t| t.elapsed() >= retention).unwrap_or(false)
    }

    fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed * 100) / self.total).min(100) as u8
    }

    fn snapshot(&self) -> JobSnapshot {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        let millis = (end - self.started_at).num_milliseconds().max(0);

        JobSnapshot {
            job_id: self.id,
            kind: self.kind,
            status: self.status,
            total: self.total,
            processed: self.processed,
            progress_percent: self.progress_percent(),
            errors: self.errors.clone(),
            results: (self.status == JobStatus::Completed).then(|| self.results.clone()),
            error: self.error.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_seconds: (millis as f64 / 100.0).round() / 10.0,
        }
    }
}

/// Concurrency-safe job table owned by the orchestrator
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Register a new job in `processing` state
    pub async fn create(&self, kind: JobKind, total: usize) -> Uuid {
        let job = Job::new(kind, total);
        let id = job.id;
        self.jobs.write().await.insert(id, job);
        debug!(job_id = %id, kind = kind.as_str(), total, "Job created");
        id
    }

    /// Record one item; returns the new processed count
    pub async fn advance(&self, job_id: Uuid, report: ItemReport) -> Result<usize, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(JobError::UnknownJob(job_id))?;

        if job.status.is_terminal() {
            warn!(job_id = %job_id, filename = report.filename(), "Item reported after job finalized");
            return Err(JobError::AlreadyFinalized(job_id));
        }
        if job.processed >= job.total {
            warn!(job_id = %job_id, total = job.total, "Item reported beyond job total");
            return Err(JobError::Overflow {
                job_id,
                total: job.total,
            });
        }

        match report {
            ItemReport::Success(summary) => job.results.push(summary),
            ItemReport::Failure(error) => job.errors.push(error),
        }
        job.processed += 1;
        Ok(job.processed)
    }

    /// Move a job to its terminal state
    ///
    /// A failed job is marked fully processed so terminal jobs always have
    /// `processed == total`.
    pub async fn finalize(&self, job_id: Uuid, outcome: JobOutcome) -> Result<JobSnapshot, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(JobError::UnknownJob(job_id))?;

        if job.status.is_terminal() {
            return Err(JobError::AlreadyFinalized(job_id));
        }

        match outcome {
            JobOutcome::Completed => {
                if job.processed < job.total {
                    return Err(JobError::Incomplete {
                        job_id,
                        processed: job.processed,
                        total: job.total,
                    });
                }
                job.status = JobStatus::Completed;
            }
            JobOutcome::Failed(error) => {
                job.status = JobStatus::Failed;
                job.processed = job.total;
                job.error = Some(error);
            }
        }
        job.ended_at = Some(Utc::now());
        job.ended = Some(Instant::now());

        let snapshot = job.snapshot();
        info!(
            job_id = %job_id,
            status = ?snapshot.status,
            processed = snapshot.processed,
            errors = snapshot.errors.len(),
            duration_seconds = snapshot.duration_seconds,
            "Job finalized"
        );
        Ok(snapshot)
    }

    /// Snapshot of a job, `None` when unknown or past retention
    pub async fn get(&self, job_id: Uuid) -> Option<JobSnapshot> {
        {
            let jobs = self.jobs.read().await;
            let job = jobs.get(&job_id)?;
            if !job.is_expired(self.retention) {
                return Some(job.snapshot());
            }
        }

        self.jobs.write().await.remove(&job_id);
        debug!(job_id = %job_id, "Expired job evicted on read");
        None
    }

    /// Drop every finalized job past retention; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(self.retention));
        before - jobs.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub async fn processing_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .count()
    }

    /// Periodically purge expired jobs until `shutdown` is cancelled
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Job sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = registry.purge_expired().await;
                        if purged > 0 {
                            debug!(purged, "Purged expired jobs");
                        }
                    }
                }
            }
        })
    }
}
