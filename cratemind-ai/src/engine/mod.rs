//! Analysis engine adapter
//!
//! The engine is an external process that derives tempo, energy and timbral
//! descriptors. [`AnalysisEngine`] is the seam the orchestrator drives; the
//! production implementation is [`ProcessEngine`].
//!
//! A call fails wholesale only when the engine cannot be started, times out,
//! exits non-zero or prints output that does not parse. Per-item `error`
//! entries in otherwise valid output are a partial success.

pub mod process;
pub mod wire;

pub use process::ProcessEngine;

use crate::models::{AnalysisRequest, EngineOutput};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Item error recorded when the engine omits an id from its output
pub const MISSING_RESULT: &str = "no result returned by analysis engine";

/// Whole-call engine failure
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request payload could not be written
    #[error("Failed to write engine request: {0}")]
    Request(#[source] std::io::Error),

    /// The engine process could not be started
    #[error("Failed to start analysis engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Analysis engine timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit (or killed by signal when `code` is `None`)
    #[error("Analysis engine exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// Output does not match the expected schema
    #[error("Failed to parse analysis engine output: {0}")]
    Parse(String),
}

impl EngineError {
    /// Transport failures: the process could not be run to a clean exit
    pub fn is_transport(&self) -> bool {
        !matches!(self, EngineError::Parse(_))
    }
}

/// Request/response contract with the analysis engine
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Analyze a batch. Every request id appears in the returned map.
    async fn analyze(&self, batch: &[AnalysisRequest]) -> Result<EngineOutput, EngineError>;
}

/// Default worker limit: all cores but one, at least one
pub fn default_worker_limit() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Clamp a configured worker count to `[1, 2 * cores]`
pub fn clamp_worker_limit(requested: usize) -> usize {
    requested.clamp(1, 2 * num_cpus::get().max(1))
}
