//! Data models for cratemind-ai

pub mod analysis;
pub mod track;

pub use analysis::{AnalysisRequest, AnalysisResult, EngineOutput, ItemOutcome};
pub use track::{Enrichment, Provenance, Track};
