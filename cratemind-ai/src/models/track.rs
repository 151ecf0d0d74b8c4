//! Persisted track record
//!
//! A track is created on its first successful analysis and mutated in place by
//! re-analysis, correction passes and enrichment merges. Writes always replace
//! the whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::analysis::AnalysisResult;

/// Tolerance used when checking the tempo invariant
const TEMPO_EPSILON: f64 = 1e-9;

/// Where a track came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// User upload
    Upload,
    /// Imported from an external library
    Imported,
    Other,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Upload => "upload",
            Provenance::Imported => "imported",
            Provenance::Other => "other",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(Provenance::Upload),
            "imported" => Ok(Provenance::Imported),
            "other" => Ok(Provenance::Other),
            other => Err(format!("unknown provenance: {}", other)),
        }
    }
}

/// Descriptors obtained from a third-party catalog lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    /// Catalog track id
    pub external_id: String,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub valence: Option<f64>,
    /// dB
    pub loudness: Option<f64>,
    /// Pitch class (0 = C, 11 = B, -1 = unknown)
    pub key: Option<i32>,
    pub enriched_at: DateTime<Utc>,
}

/// Analyzed track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub filename: String,
    pub file_path: String,
    pub duration_seconds: Option<f64>,
    /// Tempo as detected (or as overridden by a correction rule)
    pub raw_tempo: f64,
    /// Felt tempo: `raw_tempo`, or half of it when `half_time` is set
    pub effective_tempo: f64,
    pub half_time: bool,
    /// Pitch-class string, e.g. "F# minor"
    pub key: Option<String>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub loudness: Option<f64>,
    pub tempo_confidence: Option<f64>,
    pub silence_ratio: Option<f64>,
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub quality_breakdown: BTreeMap<String, f64>,
    /// Best-matching genre slug; `None` means unclassified
    pub genre: Option<String>,
    pub provenance: Provenance,
    pub enrichment: Option<Enrichment>,
    pub analyzed_at: DateTime<Utc>,
}

impl Track {
    /// Build an uncorrected record from engine output
    ///
    /// The engine's own effective tempo is ignored; the half-time rule derives it.
    pub fn from_analysis(
        id: impl Into<String>,
        filename: impl Into<String>,
        file_path: impl Into<String>,
        provenance: Provenance,
        result: AnalysisResult,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            file_path: file_path.into(),
            duration_seconds: result.duration,
            raw_tempo: result.tempo,
            effective_tempo: result.tempo,
            half_time: result.half_time,
            key: result.key,
            energy: result.energy,
            valence: result.valence,
            loudness: result.loudness,
            tempo_confidence: result.confidence,
            silence_ratio: result.silence_ratio,
            quality_score: result.quality_score,
            quality_breakdown: result.quality_breakdown.unwrap_or_default(),
            genre: None,
            provenance,
            enrichment: None,
            analyzed_at: Utc::now(),
        }
    }

    /// True when `effective_tempo` agrees with `raw_tempo` and `half_time`
    pub fn tempo_is_consistent(&self) -> bool {
        let expected = if self.half_time {
            self.raw_tempo / 2.0
        } else {
            self.raw_tempo
        };
        (self.effective_tempo - expected).abs() < TEMPO_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_round_trip() {
        for p in [Provenance::Upload, Provenance::Imported, Provenance::Other] {
            assert_eq!(p.as_str().parse::<Provenance>().unwrap(), p);
        }
        assert!("bootleg".parse::<Provenance>().is_err());
        assert_eq!(serde_json::to_value(Provenance::Upload).unwrap(), "upload");
    }

    #[test]
    fn test_from_analysis_starts_unhalved() {
        let result = AnalysisResult {
            tempo: 172.0,
            half_time: true,
            effective_tempo: Some(86.0),
            ..AnalysisResult::with_tempo(172.0)
        };

        let track = Track::from_analysis("t1", "a.mp3", "/m/a.mp3", Provenance::Upload, result);
        assert_eq!(track.raw_tempo, 172.0);
        assert_eq!(track.effective_tempo, 172.0);
        assert!(track.half_time);
        assert!(!track.tempo_is_consistent());
    }
}
