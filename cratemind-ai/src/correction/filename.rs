//! Rule 2: filename tempo override
//!
//! Users often name files after their tempo ("Roller 174bpm.wav"). A label in
//! [60, 200] that differs from the detected tempo by more than 10% replaces
//! both raw and effective tempo and clears the half-time flag.

use crate::models::Track;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const MIN_TEMPO: f64 = 60.0;
pub const MAX_TEMPO: f64 = 200.0;

/// Relative difference above which the label wins
pub const OVERRIDE_THRESHOLD: f64 = 0.10;

/// "174bpm", "128 BPM"
static LABELLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{2,3})\s*bpm\b").expect("valid tempo label pattern"));

static BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2,3})\b").expect("valid bare number pattern"));

fn first_in_range(re: &Regex, text: &str) -> Option<f64> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .find(|t| (MIN_TEMPO..=MAX_TEMPO).contains(t))
}

/// Tempo label in a filename
///
/// Numbers followed by "bpm" win over bare 2-3 digit numbers. The extension is
/// ignored.
pub fn tempo_hint(filename: &str) -> Option<f64> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .replace('_', " ");

    first_in_range(&LABELLED, &stem).or_else(|| first_in_range(&BARE, &stem))
}

/// Returns true when the track changed
pub fn apply(track: &mut Track) -> bool {
    let Some(candidate) = tempo_hint(&track.filename) else {
        return false;
    };

    // Relative to the labelled value; candidates are always within range, so non-zero
    let difference = (candidate - track.effective_tempo).abs() / candidate;
    if difference <= OVERRIDE_THRESHOLD {
        return false;
    }

    track.raw_tempo = candidate;
    track.effective_tempo = candidate;
    track.half_time = false;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::test_support::track;

    #[test]
    fn test_tempo_hint() {
        assert_eq!(tempo_hint("Track 174bpm.mp3"), Some(174.0));
        assert_eq!(tempo_hint("Roller 128 BPM.wav"), Some(128.0));
        assert_eq!(tempo_hint("01 Intro 140.mp3"), Some(140.0));
        assert_eq!(tempo_hint("dj_set_172bpm.mp3"), Some(172.0));
        // Labelled token preferred over an earlier bare one
        assert_eq!(tempo_hint("Mix 99 - part 170bpm.flac"), Some(170.0));
        // Out of range values are skipped
        assert_eq!(tempo_hint("Track 45 999.mp3"), None);
        assert_eq!(tempo_hint("Song 2.mp3"), None);
        assert_eq!(tempo_hint("Track 1234.mp3"), None);
    }

    #[test]
    fn test_override_when_far_off() {
        let mut t = track("Track 174bpm.mp3", 86.0, false);
        assert!(apply(&mut t));
        assert_eq!(t.raw_tempo, 174.0);
        assert_eq!(t.effective_tempo, 174.0);
        assert!(!t.half_time);

        // Second application is a no-op
        assert!(!apply(&mut t));
        assert_eq!(t.effective_tempo, 174.0);
    }

    #[test]
    fn test_close_detection_is_kept() {
        let mut t = track("Track 174bpm.mp3", 172.5, false);
        assert!(!apply(&mut t));
        assert_eq!(t.effective_tempo, 172.5);
    }

    #[test]
    fn test_difference_measured_against_label() {
        // 9.5% of 100 is within tolerance
        let mut t = track("Tune 100bpm.mp3", 90.5, false);
        assert!(!apply(&mut t));
        assert_eq!(t.effective_tempo, 90.5);

        // 10.5% of 100, although under 10% of 110.5
        let mut t = track("Tune 100bpm.mp3", 110.5, false);
        assert!(apply(&mut t));
        assert_eq!(t.effective_tempo, 100.0);

        let mut t = track("Tune 100bpm.mp3", 89.9, false);
        assert!(apply(&mut t));
        assert_eq!(t.raw_tempo, 100.0);
    }

    #[test]
    fn test_half_time_cleared_on_override() {
        let mut t = track("Liquid 87bpm.wav", 174.0, true);
        t.effective_tempo = 87.0 * 1.5;
        assert!(apply(&mut t));
        assert_eq!(t.effective_tempo, 87.0);
        assert!(!t.half_time);
    }
}
