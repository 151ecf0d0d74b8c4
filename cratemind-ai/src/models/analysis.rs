//! Analysis engine request and result types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One entry of the request payload sent to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: String,
    pub file_path: String,
}

impl AnalysisRequest {
    pub fn new(id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
        }
    }
}

/// Successful engine output for one file
///
/// Accepts both the camelCase names of the engine contract and the snake_case
/// names older analyzer scripts print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(alias = "bpm")]
    pub tempo: f64,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, alias = "half_time", alias = "is_halftime")]
    pub half_time: bool,
    #[serde(default, alias = "effective_tempo", alias = "effective_bpm")]
    pub effective_tempo: Option<f64>,
    #[serde(default, alias = "tempo_confidence", alias = "bpm_confidence")]
    pub confidence: Option<f64>,
    #[serde(default, alias = "silence_ratio")]
    pub silence_ratio: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, alias = "quality_score")]
    pub quality_score: Option<f64>,
    #[serde(default, alias = "quality_breakdown")]
    pub quality_breakdown: Option<BTreeMap<String, f64>>,
}

impl AnalysisResult {
    /// Result carrying only a tempo
    pub fn with_tempo(tempo: f64) -> Self {
        Self {
            tempo,
            energy: None,
            valence: None,
            loudness: None,
            key: None,
            half_time: false,
            effective_tempo: None,
            confidence: None,
            silence_ratio: None,
            duration: None,
            quality_score: None,
            quality_breakdown: None,
        }
    }
}

/// Per-item engine outcome: a result or the engine's error string
pub type ItemOutcome = Result<AnalysisResult, String>;

/// Engine output keyed by request id
pub type EngineOutput = HashMap<String, ItemOutcome>;
