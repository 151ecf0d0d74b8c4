//! Quality score for analyzed tracks
//!
//! Used when the engine does not report its own score. Each available signal
//! contributes an equally weighted sub-score in [0, 1].

use crate::models::Track;
use std::collections::BTreeMap;

pub fn duration_score(seconds: f64) -> f64 {
    if seconds < 10.0 {
        0.3
    } else if seconds < 30.0 {
        0.6
    } else if seconds < 60.0 {
        0.8
    } else {
        1.0
    }
}

pub fn loudness_score(db: f64) -> f64 {
    if db < -30.0 {
        0.4
    } else if db < -20.0 {
        0.7
    } else {
        1.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Overall score and breakdown, or `None` when no signal is available
pub fn score(track: &Track) -> Option<(f64, BTreeMap<String, f64>)> {
    let mut breakdown = BTreeMap::new();

    if let Some(d) = track.duration_seconds {
        breakdown.insert("duration".to_string(), duration_score(d));
    }
    if let Some(l) = track.loudness {
        breakdown.insert("loudness".to_string(), loudness_score(l));
    }
    if let Some(s) = track.silence_ratio {
        breakdown.insert("silence".to_string(), (1.0 - s).clamp(0.0, 1.0));
    }
    if let Some(c) = track.tempo_confidence {
        breakdown.insert("tempo".to_string(), c.clamp(0.0, 1.0));
    }

    if breakdown.is_empty() {
        return None;
    }

    let overall = breakdown.values().sum::<f64>() / breakdown.len() as f64;
    Some((round2(overall), breakdown))
}

/// Fill the track's quality fields unless the engine already set a score
pub fn fill(track: &mut Track) {
    if track.quality_score.is_some() {
        return;
    }
    if let Some((overall, breakdown)) = score(track) {
        track.quality_score = Some(overall);
        track.quality_breakdown = breakdown;
    }
}
