//! Test helper utilities
//!
//! Fake engines, stores and enrichment sources for driving the orchestrator
//! without an analyzer binary.

#![allow(dead_code)]

use async_trait::async_trait;
use cratemind_ai::correction::{CorrectionPipeline, TempoPinRule};
use cratemind_ai::engine::{AnalysisEngine, EngineError};
use cratemind_ai::enrichment::{EnrichmentError, EnrichmentSource};
use cratemind_ai::jobs::{JobRegistry, JobSnapshot};
use cratemind_ai::models::{AnalysisRequest, AnalysisResult, EngineOutput, Enrichment, ItemOutcome, Track};
use cratemind_ai::store::{SqliteTrackStore, TrackFilter, TrackStore};
use cratemind_ai::taxonomy::{self, GenreDefinition, GenreTaxonomy, SharedTaxonomy};
use cratemind_ai::BatchOrchestrator;
use cratemind_common::events::EventBus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Engine that answers from a function of the audio path
pub struct FnEngine<F> {
    respond: F,
    pub calls: AtomicUsize,
}

impl<F> FnEngine<F>
where
    F: Fn(&str) -> Option<ItemOutcome> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<F> AnalysisEngine for FnEngine<F>
where
    F: Fn(&str) -> Option<ItemOutcome> + Send + Sync,
{
    async fn analyze(&self, batch: &[AnalysisRequest]) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(batch
            .iter()
            .filter_map(|r| (self.respond)(&r.file_path).map(|o| (r.id.clone(), o)))
            .collect())
    }
}

/// Engine that always fails wholesale, like a non-zero exit
pub struct ExitingEngine;

#[async_trait]
impl AnalysisEngine for ExitingEngine {
    async fn analyze(&self, _batch: &[AnalysisRequest]) -> Result<EngineOutput, EngineError> {
        Err(EngineError::ExitStatus {
            code: Some(2),
            stderr: "analyzer crashed".to_string(),
        })
    }
}

/// Store whose writes always fail
pub struct FailingStore;

#[async_trait]
impl TrackStore for FailingStore {
    async fn upsert_track(&self, _track: &Track) -> cratemind_common::Result<()> {
        Err(cratemind_common::Error::Internal("disk I/O error".to_string()))
    }

    async fn get_track(&self, _id: &str) -> cratemind_common::Result<Option<Track>> {
        Ok(None)
    }

    async fn get_tracks_by_filter(&self, _filter: TrackFilter) -> cratemind_common::Result<Vec<Track>> {
        Ok(Vec::new())
    }

    async fn delete_track(&self, _id: &str) -> cratemind_common::Result<bool> {
        Ok(false)
    }
}

/// Catalog that knows every track whose filename contains `known`
pub struct StaticCatalog {
    pub known: String,
    pub energy: f64,
    pub valence: f64,
}

#[async_trait]
impl EnrichmentSource for StaticCatalog {
    async fn lookup(&self, track: &Track) -> Result<Option<Enrichment>, EnrichmentError> {
        if !track.filename.contains(&self.known) {
            return Ok(None);
        }
        Ok(Some(Enrichment {
            external_id: format!("cat-{}", track.filename),
            energy: Some(self.energy),
            danceability: Some(0.6),
            valence: Some(self.valence),
            loudness: Some(-7.5),
            key: Some(5),
            enriched_at: chrono::Utc::now(),
        }))
    }
}

pub fn analysis(tempo: f64, energy: Option<f64>) -> ItemOutcome {
    let mut result = AnalysisResult::with_tempo(tempo);
    result.energy = energy;
    Ok(result)
}

pub async fn memory_store() -> Arc<SqliteTrackStore> {
    Arc::new(SqliteTrackStore::in_memory().await.unwrap())
}

/// Electronic with house, drum & bass, and UK garage holding dubstep
pub fn club_taxonomy() -> SharedTaxonomy {
    let defs = vec![
        GenreDefinition::new("Electronic", "electronic", None, (80.0, 180.0), (0.3, 1.0)),
        GenreDefinition::new("House", "house", Some("electronic"), (115.0, 130.0), (0.5, 0.9)),
        GenreDefinition::new("Drum & Bass", "drum-and-bass", Some("electronic"), (160.0, 180.0), (0.6, 1.0)),
        GenreDefinition::new("UK Garage", "uk-garage", Some("electronic"), (130.0, 140.0), (0.6, 0.9)),
        GenreDefinition::new("Dubstep", "dubstep", Some("uk-garage"), (138.0, 142.0), (0.6, 0.9)),
    ];
    taxonomy::shared(GenreTaxonomy::from_definitions(defs).unwrap())
}

pub fn orchestrator(
    engine: Arc<dyn AnalysisEngine>,
    store: Arc<dyn TrackStore>,
) -> BatchOrchestrator {
    orchestrator_with_pins(engine, store, Vec::new())
}

pub fn orchestrator_with_pins(
    engine: Arc<dyn AnalysisEngine>,
    store: Arc<dyn TrackStore>,
    pins: Vec<TempoPinRule>,
) -> BatchOrchestrator {
    BatchOrchestrator::new(
        engine,
        store,
        club_taxonomy(),
        JobRegistry::new(Duration::from_secs(300)),
        CorrectionPipeline::new(pins),
        EventBus::new(100),
    )
}

/// Poll until the job reaches a terminal status
pub async fn wait_for_job(orchestrator: &BatchOrchestrator, job_id: Uuid) -> JobSnapshot {
    for _ in 0..300 {
        if let Some(snapshot) = orchestrator.jobs().get(job_id).await {
            if snapshot.status.is_terminal() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal status", job_id);
}
