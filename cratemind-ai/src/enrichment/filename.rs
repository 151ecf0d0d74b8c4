//! Artist/title extraction from upload filenames

use once_cell::sync::Lazy;
use regex::Regex;

/// Cleanup patterns, applied in order
static CLEANUP: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Audio extension
        r"(?i)\.(mp3|m4a|wav|flac|aac|aiff?|ogg)$",
        // Download-site prefix
        r"(?i)^y2mate\.(is|com) - ",
        // Video id and bitrate suffix: "-dQw4w9WgXcQ-160k-1650000000"
        r"-[\w-]{11}-\d+k-\d+$",
        // Leading track number
        r"^\d{2,3}\.?\s+",
        // Project version numbers: " 1.2", " 3.5 final"
        r"\s+\d+\.\d+.*$",
        // Mix/version/edit markers
        r"(?i)\s*\([^)]*?(mix|version|edit|project|mastering)[^)]*?\)",
        r"(?i)\s*\[[^\]]*?(mix|version|edit)[^\]]*?\]",
        r"(?i)\s*\(clip\)",
        r"(?i)\s+v\d+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid filename cleanup pattern"))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl ParsedName {
    /// Catalog search query ("artist title"), `None` when nothing usable remains
    pub fn query(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{} {}", artist, title)),
            (None, Some(title)) => Some(title.clone()),
            (Some(artist), None) => Some(artist.clone()),
            (None, None) => None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Split a cleaned filename into artist and title on " - " (or an en dash)
pub fn parse_filename(filename: &str) -> ParsedName {
    let mut cleaned = filename.trim().to_string();
    for re in CLEANUP.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    for separator in [" - ", " \u{2013} "] {
        if let Some((artist, title)) = cleaned.split_once(separator) {
            return ParsedName {
                artist: non_empty(artist),
                title: non_empty(title),
            };
        }
    }

    ParsedName {
        artist: None,
        title: non_empty(&cleaned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_site_names() {
        let parsed = parse_filename(
            "Y2Mate.is - Burial - Archangel (Official Video)-dQw4w9WgXcQ-160k-1650000000.mp3",
        );
        assert_eq!(parsed.artist.as_deref(), Some("Burial"));
        assert_eq!(parsed.title.as_deref(), Some("Archangel (Official Video)"));
    }

    #[test]
    fn test_markers_and_track_numbers() {
        let parsed = parse_filename("03 Four Tet - Baby (Extended Mix).wav");
        assert_eq!(parsed.artist.as_deref(), Some("Four Tet"));
        assert_eq!(parsed.title.as_deref(), Some("Baby"));
        assert_eq!(parsed.query().as_deref(), Some("Four Tet Baby"));

        let parsed = parse_filename("Artist - Tune - Part Two [Radio Edit].flac");
        assert_eq!(parsed.artist.as_deref(), Some("Artist"));
        assert_eq!(parsed.title.as_deref(), Some("Tune - Part Two"));
    }

    #[test]
    fn test_project_files() {
        let parsed = parse_filename("Sketch 2.1 final.mp3");
        assert_eq!(parsed.artist, None);
        assert_eq!(parsed.title.as_deref(), Some("Sketch"));

        let parsed = parse_filename("Bassline v3.wav");
        assert_eq!(parsed.title.as_deref(), Some("Bassline"));

        assert_eq!(parse_filename(".mp3").query(), None);
    }
}
