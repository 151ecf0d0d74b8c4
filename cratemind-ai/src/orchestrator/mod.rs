//! Batch orchestrator
//!
//! `submit` creates a job and returns its id at once; the work runs on a
//! background task. Each analyzed item goes through the correction pipeline,
//! quality scoring and genre classification before it is written to the
//! Track Store. Item failures accumulate on the job; an engine failure fails
//! the whole job with a single top-level error.
//!
//! Every background task runs under a supervisor that marks the job failed if
//! the task returns an error or panics, so no job stays `processing` forever.

mod item;

use crate::correction::CorrectionPipeline;
use crate::engine::{AnalysisEngine, MISSING_RESULT};
use crate::enrichment::EnrichmentSource;
use crate::jobs::{ItemReport, JobKind, JobOutcome, JobRegistry};
use crate::models::{AnalysisRequest, Enrichment, EngineOutput, ItemOutcome, Provenance, Track};
use crate::store::{TrackFilter, TrackStore};
use crate::taxonomy::SharedTaxonomy;
use chrono::Utc;
use cratemind_common::events::{AnalysisEvent, EventBus};
use cratemind_common::{Error, Result};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_PERSIST_CONCURRENCY: usize = 4;

/// A file submitted for analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSubmission {
    pub path: String,
    /// Display name; the path's file name when omitted
    #[serde(default)]
    pub filename: Option<String>,
}

impl TrackSubmission {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: None,
        }
    }
}

/// Returned on submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    pub job_id: Uuid,
    pub total: usize,
}

/// One unit of work in an analysis job
#[derive(Debug, Clone)]
struct BatchItem {
    id: String,
    filename: String,
    file_path: String,
    provenance: Provenance,
    /// Enrichment already stored for a re-analyzed track
    enrichment: Option<Enrichment>,
}

impl BatchItem {
    fn from_submission(submission: TrackSubmission) -> Self {
        let filename = submission.filename.unwrap_or_else(|| {
            Path::new(&submission.path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| submission.path.clone())
        });

        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            file_path: submission.path,
            provenance: Provenance::Upload,
            enrichment: None,
        }
    }

    fn from_track(track: Track) -> Self {
        Self {
            id: track.id,
            filename: track.filename,
            file_path: track.file_path,
            provenance: track.provenance,
            enrichment: track.enrichment,
        }
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    engine: Arc<dyn AnalysisEngine>,
    store: Arc<dyn TrackStore>,
    taxonomy: SharedTaxonomy,
    jobs: JobRegistry,
    corrections: Arc<CorrectionPipeline>,
    events: EventBus,
    enrichment: Option<Arc<dyn EnrichmentSource>>,
    persist_concurrency: usize,
    /// Message of the most recent job failure
    last_error: Arc<RwLock<Option<String>>>,
}

impl BatchOrchestrator {
    pub fn new(
        engine: Arc<dyn AnalysisEngine>,
        store: Arc<dyn TrackStore>,
        taxonomy: SharedTaxonomy,
        jobs: JobRegistry,
        corrections: CorrectionPipeline,
        events: EventBus,
    ) -> Self {
        Self {
            engine,
            store,
            taxonomy,
            jobs,
            corrections: Arc::new(corrections),
            events,
            enrichment: None,
            persist_concurrency: DEFAULT_PERSIST_CONCURRENCY,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_enrichment(mut self, source: Arc<dyn EnrichmentSource>) -> Self {
        self.enrichment = Some(source);
        self
    }

    pub fn with_persist_concurrency(mut self, concurrency: usize) -> Self {
        self.persist_concurrency = concurrency.max(1);
        self
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    pub fn taxonomy(&self) -> &SharedTaxonomy {
        &self.taxonomy
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn has_enrichment(&self) -> bool {
        self.enrichment.is_some()
    }

    /// Error of the last job that failed, if any
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Start analyzing new uploads. Returns as soon as the job exists.
    pub async fn submit(&self, files: Vec<TrackSubmission>) -> JobTicket {
        let items: Vec<BatchItem> = files.into_iter().map(BatchItem::from_submission).collect();
        self.start_analysis(JobKind::Analysis, items).await
    }

    /// Send stored tracks through the engine and the correction path again
    ///
    /// Defaults to every upload. Track ids and stored enrichment are kept.
    pub async fn submit_reanalysis(&self, filter: Option<TrackFilter>) -> Result<JobTicket> {
        let filter = filter.unwrap_or(TrackFilter::Provenance(Provenance::Upload));
        let tracks = self.store.get_tracks_by_filter(filter).await?;
        let items = tracks.into_iter().map(BatchItem::from_track).collect();
        Ok(self.start_analysis(JobKind::Reanalysis, items).await)
    }

    /// Look up catalog descriptors for tracks that have none yet
    pub async fn submit_enrichment(&self, limit: Option<usize>) -> Result<JobTicket> {
        let source = self
            .enrichment
            .clone()
            .ok_or_else(|| Error::Config("No enrichment source configured".to_string()))?;

        let mut tracks = self
            .store
            .get_tracks_by_filter(TrackFilter::MissingEnrichment)
            .await?;
        if let Some(limit) = limit {
            tracks.truncate(limit);
        }

        let total = tracks.len();
        let job_id = self.start_job(JobKind::Enrichment, total).await;
        let this = self.clone();
        self.spawn_supervised(job_id, async move {
            this.run_enrichment(job_id, source, tracks).await
        });

        Ok(JobTicket { job_id, total })
    }

    /// Keep the most recently analyzed upload of each filename, delete the rest
    ///
    /// Returns the removed track ids.
    pub async fn remove_duplicate_uploads(&self) -> Result<Vec<String>> {
        let tracks = self
            .store
            .get_tracks_by_filter(TrackFilter::DuplicateFilenames)
            .await?;

        let mut keep: HashMap<&str, &Track> = HashMap::new();
        for track in &tracks {
            let newest = keep.entry(track.filename.as_str()).or_insert(track);
            if track.analyzed_at > newest.analyzed_at {
                *newest = track;
            }
        }

        let removed: Vec<String> = tracks
            .iter()
            .filter(|t| keep.get(t.filename.as_str()).map(|k| k.id != t.id).unwrap_or(false))
            .map(|t| t.id.clone())
            .collect();

        for id in &removed {
            self.store.delete_track(id).await?;
        }

        info!(
            groups = keep.len(),
            removed = removed.len(),
            "Removed duplicate uploads"
        );
        Ok(removed)
    }

    async fn start_job(&self, kind: JobKind, total: usize) -> Uuid {
        let job_id = self.jobs.create(kind, total).await;
        info!(job_id = %job_id, kind = kind.as_str(), total, "Job started");
        self.events.emit_lossy(AnalysisEvent::JobStarted {
            job_id,
            kind: kind.as_str().to_string(),
            total,
            timestamp: Utc::now(),
        });
        job_id
    }

    async fn start_analysis(&self, kind: JobKind, items: Vec<BatchItem>) -> JobTicket {
        let total = items.len();
        let job_id = self.start_job(kind, total).await;
        let this = self.clone();
        self.spawn_supervised(job_id, async move { this.run_analysis(job_id, items).await });
        JobTicket { job_id, total }
    }

    /// Run `work` on its own task and fail the job if it errors or panics
    fn spawn_supervised<F>(&self, job_id: Uuid, work: F)
    where
        F: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        let jobs = self.jobs.clone();
        let events = self.events.clone();
        let last_error = Arc::clone(&self.last_error);

        tokio::spawn(async move {
            let failure = match tokio::spawn(work).await {
                Ok(Ok(())) => None,
                Ok(Err(message)) => Some(message),
                Err(join_error) => Some(format!("Analysis task aborted: {}", join_error)),
            };

            let Some(message) = failure else {
                return;
            };

            error!(job_id = %job_id, error = %message, "Job failed");
            *last_error.write().await = Some(message.clone());
            match jobs.finalize(job_id, JobOutcome::Failed(message.clone())).await {
                Ok(_) => events.emit_lossy(AnalysisEvent::JobFailed {
                    job_id,
                    error: message,
                    timestamp: Utc::now(),
                }),
                Err(e) => warn!(job_id = %job_id, error = %e, "Could not mark job failed"),
            }
        });
    }

    async fn run_analysis(
        &self,
        job_id: Uuid,
        items: Vec<BatchItem>,
    ) -> std::result::Result<(), String> {
        let requests: Vec<AnalysisRequest> = items
            .iter()
            .map(|i| AnalysisRequest::new(i.id.clone(), i.file_path.clone()))
            .collect();

        let mut output = if requests.is_empty() {
            EngineOutput::new()
        } else {
            self.engine
                .analyze(&requests)
                .await
                .map_err(|e| e.to_string())?
        };

        let work: Vec<(BatchItem, ItemOutcome)> = items
            .into_iter()
            .map(|item| {
                let outcome = output
                    .remove(&item.id)
                    .unwrap_or_else(|| Err(MISSING_RESULT.to_string()));
                (item, outcome)
            })
            .collect();

        let total = work.len();
        let reports = stream::iter(work)
            .map(|(item, outcome)| self.analyzed_item(item, outcome))
            .buffer_unordered(self.persist_concurrency);

        self.record_all(job_id, total, reports).await
    }

    async fn run_enrichment(
        &self,
        job_id: Uuid,
        source: Arc<dyn EnrichmentSource>,
        tracks: Vec<Track>,
    ) -> std::result::Result<(), String> {
        let total = tracks.len();
        let reports = stream::iter(tracks)
            .map(|track| self.enriched_item(source.as_ref(), track))
            .buffer_unordered(self.persist_concurrency);

        self.record_all(job_id, total, reports).await
    }

    /// Record every report, then complete the job
    async fn record_all<S>(
        &self,
        job_id: Uuid,
        total: usize,
        reports: S,
    ) -> std::result::Result<(), String>
    where
        S: Stream<Item = ItemReport>,
    {
        futures::pin_mut!(reports);
        while let Some(report) = reports.next().await {
            self.record(job_id, total, report).await;
        }

        let snapshot = self
            .jobs
            .finalize(job_id, JobOutcome::Completed)
            .await
            .map_err(|e| e.to_string())?;

        self.events.emit_lossy(AnalysisEvent::JobCompleted {
            job_id,
            processed: snapshot.processed,
            error_count: snapshot.errors.len(),
            duration_seconds: snapshot.duration_seconds,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn record(&self, job_id: Uuid, total: usize, report: ItemReport) {
        let filename = report.filename().to_string();
        let error = report.error().map(str::to_string);

        match self.jobs.advance(job_id, report).await {
            Ok(processed) => {
                self.events.emit_lossy(AnalysisEvent::JobProgress {
                    job_id,
                    processed,
                    total,
                    progress_percent: percent(processed, total),
                    filename,
                    error,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "Item result dropped"),
        }
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        ((processed * 100) / total).min(100) as u8
    }
}
