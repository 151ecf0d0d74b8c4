//! Third-party catalog enrichment
//!
//! Looks tracks up in an external catalog by artist/title parsed from the
//! filename and returns the catalog's audio descriptors. Merging into the
//! track is done by the correction pipeline's gap-fill rule.

pub mod catalog_client;
pub mod filename;

pub use catalog_client::CatalogClient;

use crate::models::{Enrichment, Track};
use async_trait::async_trait;
use thiserror::Error;

/// Item error recorded for tracks the catalog does not know
pub const NO_CATALOG_MATCH: &str = "no catalog match";

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid catalog configuration: {0}")]
    Config(String),
}

/// Source of catalog descriptors
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// `Ok(None)` when the catalog has no match for the track
    async fn lookup(&self, track: &Track) -> Result<Option<Enrichment>, EnrichmentError>;
}
