//! External analysis engine run as a child process
//!
//! Batch mode writes the request list to a temporary JSON file, passes its path
//! as the last argument and reads `{id: entry}` from stdout. Per-file mode runs
//! one process per file with the audio path as the last argument and reads a
//! single entry from stdout, with at most `workers` processes alive at once.

use super::wire::{parse_batch_output, parse_single_output};
use super::{clamp_worker_limit, default_worker_limit, AnalysisEngine, EngineError};
use crate::config::EngineConfig;
use crate::models::{AnalysisRequest, EngineOutput, ItemOutcome};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How the engine is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// One process for the whole batch
    #[default]
    Batch,
    /// One process per file, bounded by the worker limit
    PerFile,
}

/// Process-backed [`AnalysisEngine`]
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    mode: EngineMode,
    timeout: Duration,
    workers: usize,
    temp_dir: Option<PathBuf>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, mode: EngineMode) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mode,
            timeout: Duration::from_secs(600),
            workers: default_worker_limit(),
            temp_dir: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            mode: config.mode,
            timeout: Duration::from_secs(config.timeout_secs),
            workers: config.worker_limit(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = clamp_worker_limit(workers);
        self
    }

    /// Directory for request payloads (system temp dir when unset)
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Write the request payload to a temporary file removed when the guard drops
    fn write_request(&self, batch: &[AnalysisRequest]) -> Result<TempPath, EngineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cratemind-request-").suffix(".json");

        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(EngineError::Request)?;

        serde_json::to_writer(&mut file, batch)
            .map_err(|e| EngineError::Request(std::io::Error::other(e)))?;
        file.flush().map_err(EngineError::Request)?;

        Ok(file.into_temp_path())
    }

    /// Run the engine with `last_arg` appended, bounded by the timeout
    async fn run(&self, last_arg: &Path) -> Result<Output, EngineError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(last_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the wait future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))?
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !output.stderr.is_empty() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Analysis engine diagnostics"
            );
        }

        Ok(output)
    }

    async fn analyze_batch(&self, batch: &[AnalysisRequest]) -> Result<EngineOutput, EngineError> {
        let request_path = self.write_request(batch)?;
        debug!(path = %request_path.display(), items = batch.len(), "Wrote engine request");

        let result = self.run(&request_path).await;
        drop(request_path);

        let output = result?;
        parse_batch_output(&output.stdout, batch)
    }

    async fn analyze_one(&self, request: &AnalysisRequest) -> Result<ItemOutcome, EngineError> {
        let output = self.run(Path::new(&request.file_path)).await.map_err(|e| {
            warn!(file = %request.file_path, error = %e, "Analysis engine failed for file");
            e
        })?;
        parse_single_output(&output.stdout)
    }

    /// Fan out one process per file; the first engine failure aborts the batch
    async fn analyze_per_file(
        &self,
        batch: &[AnalysisRequest],
    ) -> Result<EngineOutput, EngineError> {
        stream::iter(batch.to_vec())
            .map(|request| {
                let engine = self.clone();
                async move {
                    let outcome = engine.analyze_one(&request).await?;
                    Ok::<_, EngineError>((request.id, outcome))
                }
            })
            .buffer_unordered(self.workers)
            .try_collect()
            .await
    }
}

#[async_trait]
impl AnalysisEngine for ProcessEngine {
    async fn analyze(&self, batch: &[AnalysisRequest]) -> Result<EngineOutput, EngineError> {
        if batch.is_empty() {
            return Ok(EngineOutput::new());
        }

        let start = Instant::now();
        info!(
            program = %self.program,
            mode = ?self.mode,
            items = batch.len(),
            "Invoking analysis engine"
        );

        let output = match self.mode {
            EngineMode::Batch => self.analyze_batch(batch).await?,
            EngineMode::PerFile => self.analyze_per_file(batch).await?,
        };

        let failed = output.values().filter(|o| o.is_err()).count();
        info!(
            items = output.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis engine finished"
        );
        Ok(output)
    }
}
