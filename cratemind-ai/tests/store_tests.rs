//! SQLite Track Store behavior

use chrono::{Duration, Utc};
use cratemind_ai::models::{AnalysisResult, Enrichment, Provenance, Track};
use cratemind_ai::store::{SqliteTrackStore, TrackFilter, TrackStore};
use tempfile::TempDir;

fn track(id: &str, filename: &str, provenance: Provenance) -> Track {
    let mut result = AnalysisResult::with_tempo(174.0);
    result.half_time = true;
    result.energy = Some(0.8);
    result.key = Some("A minor".to_string());
    let mut track = Track::from_analysis(id, filename, format!("/music/{}", filename), provenance, result);
    track.effective_tempo = 87.0;
    track
}

#[tokio::test]
async fn test_round_trip_preserves_fields() {
    let store = SqliteTrackStore::in_memory().await.unwrap();

    let mut original = track("t1", "Roller.mp3", Provenance::Upload);
    original.quality_score = Some(0.85);
    original.quality_breakdown.insert("duration".to_string(), 1.0);
    original.quality_breakdown.insert("loudness".to_string(), 0.7);
    original.genre = Some("drum-and-bass".to_string());
    original.enrichment = Some(Enrichment {
        external_id: "cat-1".to_string(),
        energy: Some(0.9),
        danceability: Some(0.5),
        valence: None,
        loudness: Some(-6.0),
        key: Some(9),
        enriched_at: Utc::now(),
    });

    store.upsert_track(&original).await.unwrap();
    let loaded = store.get_track("t1").await.unwrap().unwrap();

    assert_eq!(loaded.filename, "Roller.mp3");
    assert_eq!(loaded.raw_tempo, 174.0);
    assert_eq!(loaded.effective_tempo, 87.0);
    assert!(loaded.half_time);
    assert_eq!(loaded.key.as_deref(), Some("A minor"));
    assert_eq!(loaded.quality_score, Some(0.85));
    assert_eq!(loaded.quality_breakdown.get("loudness"), Some(&0.7));
    assert_eq!(loaded.genre.as_deref(), Some("drum-and-bass"));
    assert_eq!(loaded.provenance, Provenance::Upload);

    let enrichment = loaded.enrichment.unwrap();
    assert_eq!(enrichment.external_id, "cat-1");
    assert_eq!(enrichment.key, Some(9));
    assert_eq!(enrichment.valence, None);
}

#[tokio::test]
async fn test_upsert_replaces_existing_row() {
    let store = SqliteTrackStore::in_memory().await.unwrap();

    let mut t = track("t1", "Roller.mp3", Provenance::Upload);
    store.upsert_track(&t).await.unwrap();

    t.raw_tempo = 172.0;
    t.effective_tempo = 172.0;
    t.half_time = false;
    t.genre = None;
    store.upsert_track(&t).await.unwrap();

    let all = store.get_tracks_by_filter(TrackFilter::All).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].effective_tempo, 172.0);
    assert!(!all[0].half_time);
    assert_eq!(all[0].genre, None);
}

#[tokio::test]
async fn test_filters() {
    let store = SqliteTrackStore::in_memory().await.unwrap();

    let mut enriched = track("u1", "Anthem.mp3", Provenance::Upload);
    enriched.enrichment = Some(Enrichment {
        external_id: "cat-9".to_string(),
        energy: None,
        danceability: None,
        valence: None,
        loudness: None,
        key: None,
        enriched_at: Utc::now(),
    });
    store.upsert_track(&enriched).await.unwrap();

    let mut newer = track("u2", "Anthem.mp3", Provenance::Upload);
    newer.analyzed_at = Utc::now() + Duration::minutes(5);
    store.upsert_track(&newer).await.unwrap();

    store.upsert_track(&track("u3", "Solo.mp3", Provenance::Upload)).await.unwrap();
    store.upsert_track(&track("i1", "Anthem.mp3", Provenance::Imported)).await.unwrap();

    let uploads = store
        .get_tracks_by_filter(TrackFilter::Provenance(Provenance::Upload))
        .await
        .unwrap();
    assert_eq!(uploads.len(), 3);

    let imported = store
        .get_tracks_by_filter(TrackFilter::Provenance(Provenance::Imported))
        .await
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].id, "i1");

    let mut missing: Vec<_> = store
        .get_tracks_by_filter(TrackFilter::MissingEnrichment)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    missing.sort();
    assert_eq!(missing, vec!["i1", "u2", "u3"]);

    let duplicates = store
        .get_tracks_by_filter(TrackFilter::DuplicateFilenames)
        .await
        .unwrap();
    let ids: Vec<_> = duplicates.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["u2", "u1"]);
}

#[tokio::test]
async fn test_delete() {
    let store = SqliteTrackStore::in_memory().await.unwrap();
    store.upsert_track(&track("t1", "a.mp3", Provenance::Upload)).await.unwrap();

    assert!(store.delete_track("t1").await.unwrap());
    assert!(!store.delete_track("t1").await.unwrap());
    assert!(store.get_track("t1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("cratemind.db");

    {
        let store = SqliteTrackStore::connect(&db_path).await.unwrap();
        store.upsert_track(&track("t1", "a.mp3", Provenance::Upload)).await.unwrap();
        store.pool().close().await;
    }

    let reopened = SqliteTrackStore::connect(&db_path).await.unwrap();
    assert!(reopened.get_track("t1").await.unwrap().is_some());
}
