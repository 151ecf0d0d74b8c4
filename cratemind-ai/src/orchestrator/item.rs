//! Per-item processing shared by analysis and enrichment jobs

use super::{BatchItem, BatchOrchestrator};
use crate::correction::quality;
use crate::enrichment::{EnrichmentSource, NO_CATALOG_MATCH};
use crate::jobs::{ItemReport, ItemSummary};
use crate::models::{ItemOutcome, Track};
use tracing::{debug, warn};

const DATABASE_ERROR: &str = "Database error";

impl From<&Track> for ItemSummary {
    fn from(track: &Track) -> Self {
        Self {
            track_id: track.id.clone(),
            filename: track.filename.clone(),
            tempo: track.effective_tempo,
            half_time: track.half_time,
            genre: track.genre.clone(),
            quality_score: track.quality_score,
        }
    }
}

impl BatchOrchestrator {
    pub(super) async fn analyzed_item(&self, item: BatchItem, outcome: ItemOutcome) -> ItemReport {
        match outcome {
            Ok(result) => {
                let mut track = Track::from_analysis(
                    item.id,
                    item.filename,
                    item.file_path,
                    item.provenance,
                    result,
                );
                track.enrichment = item.enrichment;
                self.finish_and_persist(track).await
            }
            Err(error) => {
                warn!(filename = %item.filename, error = %error, "Analysis failed for item");
                ItemReport::failure(item.filename, error)
            }
        }
    }

    pub(super) async fn enriched_item(
        &self,
        source: &dyn EnrichmentSource,
        mut track: Track,
    ) -> ItemReport {
        match source.lookup(&track).await {
            Ok(Some(enrichment)) => {
                track.enrichment = Some(enrichment);
                self.finish_and_persist(track).await
            }
            Ok(None) => {
                debug!(filename = %track.filename, "No catalog match");
                ItemReport::failure(track.filename, NO_CATALOG_MATCH)
            }
            Err(e) => {
                warn!(filename = %track.filename, error = %e, "Catalog lookup failed");
                ItemReport::failure(track.filename, e.to_string())
            }
        }
    }

    /// Correct, score, classify and store one track
    async fn finish_and_persist(&self, mut track: Track) -> ItemReport {
        self.corrections.apply(&mut track);
        quality::fill(&mut track);

        track.genre = self
            .taxonomy
            .read()
            .await
            .best_match(track.effective_tempo, track.energy)
            .map(|node| node.slug.clone());

        match self.store.upsert_track(&track).await {
            Ok(()) => ItemReport::Success(ItemSummary::from(&track)),
            Err(e) => {
                let message = persistence_error(&e.to_string());
                warn!(filename = %track.filename, error = %message, "Failed to store track");
                ItemReport::failure(track.filename, message)
            }
        }
    }
}

fn persistence_error(message: &str) -> String {
    if message.starts_with(DATABASE_ERROR) {
        message.to_string()
    } else {
        format!("{}: {}", DATABASE_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_prefix() {
        assert_eq!(persistence_error("disk full"), "Database error: disk full");
        assert_eq!(
            persistence_error("Database error: database is locked"),
            "Database error: database is locked"
        );
    }
}
