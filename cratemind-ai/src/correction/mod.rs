//! Tempo and descriptor correction rules
//!
//! Rules run in a fixed order on every analyzed track, from the first
//! analysis and from every re-analysis or enrichment pass:
//!
//! 1. half-time reconciliation
//! 2. filename tempo override
//! 3. manual pin list
//! 4. enrichment gap-fill
//!
//! A later rule may override an earlier one. Running the whole pipeline on an
//! already corrected track leaves it unchanged.

pub mod enrichment;
pub mod filename;
pub mod half_time;
pub mod pins;
pub mod quality;

pub use pins::{PinError, TempoPinRule};

use crate::models::Track;
use tracing::debug;

/// Which rules fired on a track
///
/// A rule can fire and still leave the record as it was, e.g. a filename
/// label that a pin then overrides with the same value as before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub half_time: bool,
    pub filename: bool,
    pub pinned: bool,
    pub enrichment: bool,
    modified: bool,
}

impl CorrectionReport {
    /// True when the track differs from its state before the pipeline ran
    pub fn changed(&self) -> bool {
        self.modified
    }
}

/// The ordered correction pipeline
#[derive(Debug, Clone, Default)]
pub struct CorrectionPipeline {
    pins: Vec<TempoPinRule>,
}

impl CorrectionPipeline {
    pub fn new(pins: Vec<TempoPinRule>) -> Self {
        Self { pins }
    }

    pub fn pins(&self) -> &[TempoPinRule] {
        &self.pins
    }

    /// Apply all rules in order
    pub fn apply(&self, track: &mut Track) -> CorrectionReport {
        let before = track.clone();
        let mut report = CorrectionReport {
            half_time: half_time::apply(track),
            filename: filename::apply(track),
            pinned: pins::apply(&self.pins, track),
            enrichment: enrichment::apply(track),
            modified: false,
        };
        report.modified = *track != before;

        if report.changed() {
            debug!(
                track_id = %track.id,
                filename = %track.filename,
                tempo = track.effective_tempo,
                half_time = track.half_time,
                ?report,
                "Corrections applied"
            );
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{AnalysisResult, Provenance, Track};

    pub fn track(filename: &str, tempo: f64, half_time: bool) -> Track {
        let result = AnalysisResult {
            half_time,
            ..AnalysisResult::with_tempo(tempo)
        };
        Track::from_analysis("t1", filename, format!("/music/{}", filename), Provenance::Upload, result)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::track;
    use super::*;

    fn pipeline() -> CorrectionPipeline {
        CorrectionPipeline::new(vec![TempoPinRule::new("%PASSOUT%BLOOD%", 174.0).unwrap()])
    }

    #[test]
    fn test_filename_beats_half_time() {
        let mut t = track("Track 174bpm.mp3", 172.0, true);
        pipeline().apply(&mut t);

        assert_eq!(t.raw_tempo, 174.0);
        assert_eq!(t.effective_tempo, 174.0);
        assert!(!t.half_time);
    }

    #[test]
    fn test_pin_beats_filename() {
        let mut t = track("Passout - Blood 140.mp3", 70.0, false);
        let report = pipeline().apply(&mut t);

        assert!(report.filename);
        assert!(report.pinned);
        assert_eq!(t.effective_tempo, 174.0);
        assert!(!t.half_time);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let p = pipeline();
        for (name, tempo, half) in [
            ("Track 174bpm.mp3", 86.0, false),
            ("Halftime Roller.wav", 172.0, true),
            ("passout_blood_final.mp3", 140.0, true),
            ("Passout - Blood 140.mp3", 70.0, false),
            ("05 Untitled.mp3", 99.0, false),
        ] {
            let mut once = track(name, tempo, half);
            p.apply(&mut once);
            let mut twice = once.clone();
            let report = p.apply(&mut twice);

            assert_eq!(once, twice, "{}", name);
            assert!(!report.changed(), "{}", name);
            assert!(twice.tempo_is_consistent(), "{}", name);
        }
    }
}
