//! SQLite-backed Track Store

use super::{retry_on_lock, TrackFilter, TrackStore};
use crate::models::{Enrichment, Provenance, Track};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cratemind_common::{Error, Result};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;

/// Default ceiling on lock-contention retries
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

const TRACK_COLUMNS: &str = r#"
    id, filename, file_path, duration_seconds, raw_tempo, effective_tempo, half_time,
    musical_key, energy, valence, loudness, tempo_confidence, silence_ratio,
    quality_score, quality_breakdown, genre, provenance,
    enrichment_external_id, enrichment_energy, enrichment_danceability, enrichment_valence,
    enrichment_loudness, enrichment_key, enriched_at, analyzed_at
"#;

#[derive(Clone)]
pub struct SqliteTrackStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteTrackStore {
    /// Wrap an existing pool and create the schema
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        init_tables(&pool).await?;
        Ok(Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        })
    }

    /// Open (or create) the database file
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::new(pool).await
    }

    /// Private in-memory database
    ///
    /// A single connection that never recycles, so the data lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            duration_seconds REAL,
            raw_tempo REAL NOT NULL,
            effective_tempo REAL NOT NULL,
            half_time INTEGER NOT NULL DEFAULT 0,
            musical_key TEXT,
            energy REAL,
            valence REAL,
            loudness REAL,
            tempo_confidence REAL,
            silence_ratio REAL,
            quality_score REAL,
            quality_breakdown TEXT NOT NULL DEFAULT '{}',
            genre TEXT,
            provenance TEXT NOT NULL,
            enrichment_external_id TEXT,
            enrichment_energy REAL,
            enrichment_danceability REAL,
            enrichment_valence REAL,
            enrichment_loudness REAL,
            enrichment_key INTEGER,
            enriched_at TEXT,
            analyzed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_filename ON tracks(filename)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_provenance ON tracks(provenance)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (tracks)");
    Ok(())
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    let provenance: String = row.get("provenance");
    let provenance: Provenance = provenance.parse().map_err(Error::Internal)?;

    let breakdown: String = row.get("quality_breakdown");
    let quality_breakdown: BTreeMap<String, f64> = serde_json::from_str(&breakdown)
        .map_err(|e| Error::Internal(format!("Failed to deserialize quality_breakdown: {}", e)))?;

    let analyzed_at: String = row.get("analyzed_at");

    let enriched_at: Option<String> = row.get("enriched_at");
    let external_id: Option<String> = row.get("enrichment_external_id");
    let enrichment = match (enriched_at, external_id) {
        (Some(at), Some(external_id)) => Some(Enrichment {
            external_id,
            energy: row.get("enrichment_energy"),
            danceability: row.get("enrichment_danceability"),
            valence: row.get("enrichment_valence"),
            loudness: row.get("enrichment_loudness"),
            key: row.get::<Option<i64>, _>("enrichment_key").map(|k| k as i32),
            enriched_at: parse_timestamp(&at, "enriched_at")?,
        }),
        _ => None,
    };

    Ok(Track {
        id: row.get("id"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        duration_seconds: row.get("duration_seconds"),
        raw_tempo: row.get("raw_tempo"),
        effective_tempo: row.get("effective_tempo"),
        half_time: row.get::<i64, _>("half_time") != 0,
        key: row.get("musical_key"),
        energy: row.get("energy"),
        valence: row.get("valence"),
        loudness: row.get("loudness"),
        tempo_confidence: row.get("tempo_confidence"),
        silence_ratio: row.get("silence_ratio"),
        quality_score: row.get("quality_score"),
        quality_breakdown,
        genre: row.get("genre"),
        provenance,
        enrichment,
        analyzed_at: parse_timestamp(&analyzed_at, "analyzed_at")?,
    })
}

#[async_trait]
impl TrackStore for SqliteTrackStore {
    async fn upsert_track(&self, track: &Track) -> Result<()> {
        // Prepare all values before touching the pool
        let breakdown = serde_json::to_string(&track.quality_breakdown)
            .map_err(|e| Error::Internal(format!("Failed to serialize quality_breakdown: {}", e)))?;
        let analyzed_at = track.analyzed_at.to_rfc3339();
        let enrichment = track.enrichment.as_ref();
        let enriched_at = enrichment.map(|e| e.enriched_at.to_rfc3339());
        let half_time = i64::from(track.half_time);

        let sql = format!(
            r#"
            INSERT INTO tracks ({}) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                file_path = excluded.file_path,
                duration_seconds = excluded.duration_seconds,
                raw_tempo = excluded.raw_tempo,
                effective_tempo = excluded.effective_tempo,
                half_time = excluded.half_time,
                musical_key = excluded.musical_key,
                energy = excluded.energy,
                valence = excluded.valence,
                loudness = excluded.loudness,
                tempo_confidence = excluded.tempo_confidence,
                silence_ratio = excluded.silence_ratio,
                quality_score = excluded.quality_score,
                quality_breakdown = excluded.quality_breakdown,
                genre = excluded.genre,
                provenance = excluded.provenance,
                enrichment_external_id = excluded.enrichment_external_id,
                enrichment_energy = excluded.enrichment_energy,
                enrichment_danceability = excluded.enrichment_danceability,
                enrichment_valence = excluded.enrichment_valence,
                enrichment_loudness = excluded.enrichment_loudness,
                enrichment_key = excluded.enrichment_key,
                enriched_at = excluded.enriched_at,
                analyzed_at = excluded.analyzed_at
            "#,
            TRACK_COLUMNS
        );

        retry_on_lock("upsert_track", self.max_lock_wait_ms, || async {
            sqlx::query(&sql)
                .bind(&track.id)
                .bind(&track.filename)
                .bind(&track.file_path)
                .bind(track.duration_seconds)
                .bind(track.raw_tempo)
                .bind(track.effective_tempo)
                .bind(half_time)
                .bind(&track.key)
                .bind(track.energy)
                .bind(track.valence)
                .bind(track.loudness)
                .bind(track.tempo_confidence)
                .bind(track.silence_ratio)
                .bind(track.quality_score)
                .bind(&breakdown)
                .bind(&track.genre)
                .bind(track.provenance.as_str())
                .bind(enrichment.map(|e| e.external_id.as_str()))
                .bind(enrichment.and_then(|e| e.energy))
                .bind(enrichment.and_then(|e| e.danceability))
                .bind(enrichment.and_then(|e| e.valence))
                .bind(enrichment.and_then(|e| e.loudness))
                .bind(enrichment.and_then(|e| e.key).map(i64::from))
                .bind(&enriched_at)
                .bind(&analyzed_at)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

            Ok(())
        })
        .await
    }

    async fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let row = sqlx::query(&format!("SELECT {} FROM tracks WHERE id = ?", TRACK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(track_from_row).transpose()
    }

    async fn get_tracks_by_filter(&self, filter: TrackFilter) -> Result<Vec<Track>> {
        let query = match filter {
            TrackFilter::All => format!(
                "SELECT {} FROM tracks ORDER BY analyzed_at, id",
                TRACK_COLUMNS
            ),
            TrackFilter::Provenance(_) => format!(
                "SELECT {} FROM tracks WHERE provenance = ? ORDER BY analyzed_at, id",
                TRACK_COLUMNS
            ),
            TrackFilter::MissingEnrichment => format!(
                "SELECT {} FROM tracks WHERE enriched_at IS NULL ORDER BY analyzed_at, id",
                TRACK_COLUMNS
            ),
            TrackFilter::DuplicateFilenames => format!(
                r#"
                SELECT {} FROM tracks
                WHERE provenance = 'upload' AND filename IN (
                    SELECT filename FROM tracks
                    WHERE provenance = 'upload'
                    GROUP BY filename
                    HAVING COUNT(*) > 1
                )
                ORDER BY filename, analyzed_at DESC, id
                "#,
                TRACK_COLUMNS
            ),
        };

        let mut q = sqlx::query(&query);
        if let TrackFilter::Provenance(p) = filter {
            q = q.bind(p.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(track_from_row).collect()
    }

    async fn delete_track(&self, id: &str) -> Result<bool> {
        let result = retry_on_lock("delete_track", self.max_lock_wait_ms, || async {
            sqlx::query("DELETE FROM tracks WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
