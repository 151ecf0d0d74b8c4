//! Engine output parsing

use super::{EngineError, MISSING_RESULT};
use crate::models::{AnalysisRequest, AnalysisResult, EngineOutput, ItemOutcome};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// One engine output entry: `{error}` or an analysis object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireEntry {
    Failed { error: String },
    Analyzed(AnalysisResult),
}

impl From<WireEntry> for ItemOutcome {
    fn from(entry: WireEntry) -> Self {
        match entry {
            WireEntry::Failed { error } => Err(error),
            WireEntry::Analyzed(result) => Ok(result),
        }
    }
}

/// Parse batch output (`{id: entry}`) and align it with the request
///
/// Ids the engine omitted become item errors; ids nobody asked for are dropped.
pub fn parse_batch_output(
    stdout: &[u8],
    requests: &[AnalysisRequest],
) -> Result<EngineOutput, EngineError> {
    let mut entries: HashMap<String, WireEntry> =
        serde_json::from_slice(stdout).map_err(|e| EngineError::Parse(e.to_string()))?;

    let mut output = EngineOutput::with_capacity(requests.len());
    for request in requests {
        let outcome = match entries.remove(&request.id) {
            Some(entry) => entry.into(),
            None => Err(MISSING_RESULT.to_string()),
        };
        output.insert(request.id.clone(), outcome);
    }

    if !entries.is_empty() {
        debug!(unexpected = entries.len(), "Ignoring engine results for unknown ids");
    }

    Ok(output)
}

/// Parse single-file output (one entry object)
pub fn parse_single_output(stdout: &[u8]) -> Result<ItemOutcome, EngineError> {
    let entry: WireEntry =
        serde_json::from_slice(stdout).map_err(|e| EngineError::Parse(e.to_string()))?;
    Ok(entry.into())
}
