//! Taxonomy seed loading

use super::{GenreDefinition, GenreTaxonomy, TaxonomyError};
use std::path::Path;
use tracing::info;

/// Seed compiled into the binary
pub const BUILTIN_SEED: &str = include_str!("../../data/genre_seed.json");

/// Parse a JSON seed: an ordered list of genre definitions
pub fn parse_seed(json: &str) -> Result<Vec<GenreDefinition>, TaxonomyError> {
    serde_json::from_str(json).map_err(|e| TaxonomyError::Seed(e.to_string()))
}

impl GenreTaxonomy {
    pub fn builtin() -> Result<Self, TaxonomyError> {
        let taxonomy = Self::from_definitions(parse_seed(BUILTIN_SEED)?)?;
        info!(genres = taxonomy.len(), "Loaded built-in genre taxonomy");
        Ok(taxonomy)
    }

    pub fn from_seed_file(path: &Path) -> Result<Self, TaxonomyError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| TaxonomyError::Seed(format!("{}: {}", path.display(), e)))?;
        let taxonomy = Self::from_definitions(parse_seed(&json)?)?;
        info!(
            genres = taxonomy.len(),
            path = %path.display(),
            "Loaded genre taxonomy seed"
        );
        Ok(taxonomy)
    }

    /// Seed file when given, built-in seed otherwise
    pub fn load(seed_path: Option<&Path>) -> Result<Self, TaxonomyError> {
        match seed_path {
            Some(path) => Self::from_seed_file(path),
            None => Self::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_seed_loads() {
        let taxonomy = GenreTaxonomy::builtin().unwrap();
        assert!(taxonomy.len() >= 40);

        let liquid = taxonomy.get("liquid-dnb").unwrap();
        assert_eq!(liquid.parent_slug.as_deref(), Some("drum-and-bass"));
        assert_eq!(liquid.depth, 2);

        let grime = taxonomy.lineage("grime").unwrap();
        let slugs: Vec<_> = grime.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(slugs, vec!["reggae", "dub", "uk-garage", "grime"]);
    }

    #[test]
    fn test_seed_accepts_legacy_field_names() {
        let defs = parse_seed(
            r#"[{"name": "Soul", "slug": "soul", "bpmMin": 70, "bpmMax": 110,
                 "energyMin": 0.4, "energyMax": 0.75, "originLocation": "USA"}]"#,
        )
        .unwrap();
        assert_eq!(defs[0].tempo_min, Some(70.0));
        assert_eq!(defs[0].origin.as_deref(), Some("USA"));
    }

    #[test]
    fn test_bad_seed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            GenreTaxonomy::from_seed_file(&path),
            Err(TaxonomyError::Seed(_))
        ));
        assert!(matches!(
            GenreTaxonomy::load(Some(&dir.path().join("absent.json"))),
            Err(TaxonomyError::Seed(_))
        ));
    }
}
