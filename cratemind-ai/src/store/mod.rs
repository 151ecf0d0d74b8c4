//! Track Store contract
//!
//! The pipeline depends only on these operations, never on a storage engine.
//! [`SqliteTrackStore`] is the production implementation.

pub mod retry;
pub mod sqlite;

pub use retry::retry_on_lock;
pub use sqlite::SqliteTrackStore;

use crate::models::{Provenance, Track};
use async_trait::async_trait;
use cratemind_common::Result;

/// Track selection predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFilter {
    All,
    Provenance(Provenance),
    /// No catalog enrichment recorded yet
    MissingEnrichment,
    /// Uploads whose filename appears on more than one upload, grouped by
    /// filename and newest first within a group
    DuplicateFilenames,
}

#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Insert or fully replace a track. All-or-nothing.
    async fn upsert_track(&self, track: &Track) -> Result<()>;

    async fn get_track(&self, id: &str) -> Result<Option<Track>>;

    async fn get_tracks_by_filter(&self, filter: TrackFilter) -> Result<Vec<Track>>;

    /// Returns false when no track had this id
    async fn delete_track(&self, id: &str) -> Result<bool>;
}
