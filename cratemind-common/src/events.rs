//! Analysis job events broadcast to SSE clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Job lifecycle events emitted by the batch orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// A job was created and its background task started
    JobStarted {
        job_id: Uuid,
        /// Job kind label ("analysis", "reanalysis", "enrichment")
        kind: String,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One item of a job was recorded
    JobProgress {
        job_id: Uuid,
        processed: usize,
        total: usize,
        progress_percent: u8,
        filename: String,
        /// Present when the item failed
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Every item was recorded
    JobCompleted {
        job_id: Uuid,
        processed: usize,
        error_count: usize,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// The job failed as a whole
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            AnalysisEvent::JobStarted { .. } => "JobStarted",
            AnalysisEvent::JobProgress { .. } => "JobProgress",
            AnalysisEvent::JobCompleted { .. } => "JobCompleted",
            AnalysisEvent::JobFailed { .. } => "JobFailed",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            AnalysisEvent::JobStarted { job_id, .. }
            | AnalysisEvent::JobProgress { job_id, .. }
            | AnalysisEvent::JobCompleted { job_id, .. }
            | AnalysisEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for [`AnalysisEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Returns `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AnalysisEvent,
    ) -> Result<usize, broadcast::error::SendError<AnalysisEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: AnalysisEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
