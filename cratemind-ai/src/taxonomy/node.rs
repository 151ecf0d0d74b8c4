//! Genre node definitions and resolved nodes

use super::TaxonomyError;
use serde::{Deserialize, Serialize};

/// Closed interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// One seed entry
///
/// Missing range bounds are inherited from the parent node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreDefinition {
    pub name: String,
    pub slug: String,
    #[serde(default, alias = "parent")]
    pub parent_slug: Option<String>,
    #[serde(default, alias = "bpmMin")]
    pub tempo_min: Option<f64>,
    #[serde(default, alias = "bpmMax")]
    pub tempo_max: Option<f64>,
    #[serde(default)]
    pub energy_min: Option<f64>,
    #[serde(default)]
    pub energy_max: Option<f64>,
    #[serde(default)]
    pub era_start: Option<i32>,
    #[serde(default)]
    pub era_end: Option<i32>,
    #[serde(default)]
    pub decade: Option<String>,
    #[serde(default, alias = "originLocation")]
    pub origin: Option<String>,
    #[serde(default)]
    pub cultural_context: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl GenreDefinition {
    /// Minimal definition with explicit ranges
    pub fn new(
        name: &str,
        slug: &str,
        parent_slug: Option<&str>,
        tempo: (f64, f64),
        energy: (f64, f64),
    ) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            parent_slug: parent_slug.map(str::to_string),
            tempo_min: Some(tempo.0),
            tempo_max: Some(tempo.1),
            energy_min: Some(energy.0),
            energy_max: Some(energy.1),
            era_start: None,
            era_end: None,
            decade: None,
            origin: None,
            cultural_context: None,
            description: None,
        }
    }
}

/// A linked node with resolved ranges
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreNode {
    pub slug: String,
    pub name: String,
    pub parent_slug: Option<String>,
    pub tempo: Range,
    pub energy: Range,
    /// 0 for roots
    pub depth: usize,
    pub children: Vec<String>,
    pub era_start: Option<i32>,
    pub era_end: Option<i32>,
    pub decade: Option<String>,
    pub origin: Option<String>,
    pub cultural_context: Option<String>,
    pub description: Option<String>,
}

impl GenreNode {
    /// Resolve a definition against its (already resolved) parent
    pub(crate) fn resolve(
        def: GenreDefinition,
        parent: Option<&GenreNode>,
        children: Vec<String>,
    ) -> Result<Self, TaxonomyError> {
        let tempo = resolve_range(
            &def.slug,
            "tempo",
            def.tempo_min,
            def.tempo_max,
            parent.map(|p| p.tempo),
        )?;
        let energy = resolve_range(
            &def.slug,
            "energy",
            def.energy_min,
            def.energy_max,
            parent.map(|p| p.energy),
        )?;

        Ok(Self {
            parent_slug: parent.map(|p| p.slug.clone()),
            depth: parent.map(|p| p.depth + 1).unwrap_or(0),
            slug: def.slug,
            name: def.name,
            tempo,
            energy,
            children,
            era_start: def.era_start,
            era_end: def.era_end,
            decade: def.decade,
            origin: def.origin,
            cultural_context: def.cultural_context,
            description: def.description,
        })
    }

    pub fn matches(&self, tempo: f64, energy: f64) -> bool {
        self.tempo.contains(tempo) && self.energy.contains(energy)
    }

    /// Combined width used to break depth ties
    pub fn span(&self) -> f64 {
        self.tempo.span() + self.energy.span()
    }
}

fn resolve_range(
    slug: &str,
    field: &'static str,
    min: Option<f64>,
    max: Option<f64>,
    inherited: Option<Range>,
) -> Result<Range, TaxonomyError> {
    let min = min.or(inherited.map(|r| r.min));
    let max = max.or(inherited.map(|r| r.max));

    let (Some(min), Some(max)) = (min, max) else {
        return Err(TaxonomyError::MissingRange {
            slug: slug.to_string(),
            field,
        });
    };

    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(TaxonomyError::InvalidRange {
            slug: slug.to_string(),
            field,
            min,
            max,
        });
    }

    Ok(Range { min, max })
}

/// Nested, serializable view of a subtree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreTree {
    pub slug: String,
    pub name: String,
    pub tempo: Range,
    pub energy: Range,
    pub children: Vec<GenreTree>,
}
