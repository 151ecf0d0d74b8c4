//! Rule 1: half-time reconciliation

use crate::models::Track;

/// Derive the effective tempo from the raw tempo and the half-time flag
///
/// The engine's confidence is kept as-is. Returns true when the track changed.
pub fn apply(track: &mut Track) -> bool {
    let effective = if track.half_time {
        track.raw_tempo / 2.0
    } else {
        track.raw_tempo
    };

    if track.effective_tempo == effective {
        return false;
    }
    track.effective_tempo = effective;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::test_support::track;

    #[test]
    fn test_halves_flagged_tempo() {
        let mut t = track("roller.mp3", 172.0, true);
        t.tempo_confidence = Some(0.42);

        assert!(apply(&mut t));
        assert_eq!(t.effective_tempo, 86.0);
        assert_eq!(t.raw_tempo, 172.0);
        assert_eq!(t.tempo_confidence, Some(0.42));
        assert!(!apply(&mut t));
    }

    #[test]
    fn test_unflagged_tempo_is_raw() {
        let mut t = track("plain.mp3", 124.0, false);
        t.effective_tempo = 62.0;

        assert!(apply(&mut t));
        assert_eq!(t.effective_tempo, 124.0);
    }
}
