//! Rule 3: manual tempo pins
//!
//! Known-bad detections that no automated rule resolves are pinned by
//! filename pattern. Patterns use `%` or `*` as wildcards and match the whole
//! filename case-insensitively (`%PASSOUT%BLOOD%`). The first matching pin wins.

use crate::models::Track;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("Pin pattern is empty")]
    EmptyPattern,

    #[error("Pin tempo must be positive, got {0}")]
    InvalidTempo(f64),

    #[error("Invalid pin pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One compiled pin
#[derive(Debug, Clone)]
pub struct TempoPinRule {
    pattern: String,
    tempo: f64,
    reason: Option<String>,
    matcher: Regex,
}

impl TempoPinRule {
    pub fn new(pattern: &str, tempo: f64) -> Result<Self, PinError> {
        if pattern.trim().is_empty() {
            return Err(PinError::EmptyPattern);
        }
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(PinError::InvalidTempo(tempo));
        }

        let body = pattern
            .split(['%', '*'])
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let matcher =
            Regex::new(&format!("(?is)^{}$", body)).map_err(|source| PinError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            tempo,
            reason: None,
            matcher,
        })
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn matches(&self, filename: &str) -> bool {
        self.matcher.is_match(filename)
    }
}

/// Returns true when the track changed
pub fn apply(pins: &[TempoPinRule], track: &mut Track) -> bool {
    let Some(pin) = pins.iter().find(|p| p.matches(&track.filename)) else {
        return false;
    };

    if track.raw_tempo == pin.tempo && track.effective_tempo == pin.tempo && !track.half_time {
        return false;
    }

    debug!(
        track_id = %track.id,
        pattern = %pin.pattern,
        tempo = pin.tempo,
        reason = pin.reason().unwrap_or(""),
        "Tempo pinned"
    );
    track.raw_tempo = pin.tempo;
    track.effective_tempo = pin.tempo;
    track.half_time = false;
    true
}
