//! Rule 4: enrichment gap-fill
//!
//! Catalog energy and valence only fill fields the local analysis left empty.
//! Catalog loudness and key stay on the enrichment record for audit.

use crate::models::Track;

/// Returns true when the track changed
pub fn apply(track: &mut Track) -> bool {
    let Some(enrichment) = &track.enrichment else {
        return false;
    };

    let mut changed = false;
    if track.energy.is_none() && enrichment.energy.is_some() {
        track.energy = enrichment.energy;
        changed = true;
    }
    if track.valence.is_none() && enrichment.valence.is_some() {
        track.valence = enrichment.valence;
        changed = true;
    }
    changed
}
