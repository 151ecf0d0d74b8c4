//! Service configuration for cratemind-ai
//!
//! Loaded from `cratemind-ai.toml`. Every section is optional; a missing file
//! yields the defaults below.

use crate::correction::{PinError, TempoPinRule};
use crate::engine::process::EngineMode;
use crate::engine::{clamp_worker_limit, default_worker_limit};
use cratemind_common::config::{load_toml_config, LoggingConfig};
use cratemind_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides `[enrichment] api_token`
pub const CATALOG_TOKEN_ENV: &str = "CRATEMIND_CATALOG_TOKEN";

pub const DEFAULT_PORT: u16 = 5740;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Data folder holding the SQLite database
    pub root_folder: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub jobs: JobsConfig,
    pub taxonomy: TaxonomyConfig,
    pub tempo_pins: Vec<TempoPin>,
    pub enrichment: Option<EnrichmentConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            jobs: JobsConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            tempo_pins: Vec::new(),
            enrichment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyzer executable
    pub program: String,
    /// Arguments placed before the request/audio path
    pub args: Vec<String>,
    pub mode: EngineMode,
    pub timeout_secs: u64,
    /// Concurrent engine processes in per-file mode
    pub workers: Option<usize>,
    /// Directory for request payloads
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "cratemind-analyzer".to_string(),
            args: Vec::new(),
            mode: EngineMode::Batch,
            timeout_secs: 600,
            workers: None,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn worker_limit(&self) -> usize {
        self.workers
            .map(clamp_worker_limit)
            .unwrap_or_else(default_worker_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// How long finished jobs stay queryable
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    /// Items corrected and persisted concurrently per job
    pub persist_concurrency: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 300,
            sweep_interval_secs: 30,
            persist_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// JSON seed; the built-in seed is used when unset
    pub seed_path: Option<PathBuf>,
}

/// `[[tempo_pins]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoPin {
    pub pattern: String,
    pub tempo: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_requests_per_second() -> u32 {
    5
}

impl ServiceConfig {
    /// Load from `path`, defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.program.trim().is_empty() {
            return Err(Error::Config("engine.program must not be empty".to_string()));
        }
        if self.engine.timeout_secs == 0 {
            return Err(Error::Config("engine.timeout_secs must be positive".to_string()));
        }
        if self.jobs.persist_concurrency == 0 {
            return Err(Error::Config("jobs.persist_concurrency must be positive".to_string()));
        }
        if self.jobs.sweep_interval_secs == 0 {
            return Err(Error::Config("jobs.sweep_interval_secs must be positive".to_string()));
        }
        self.pin_rules()?;
        Ok(())
    }

    /// Compile the manual pin list, preserving order
    pub fn pin_rules(&self) -> Result<Vec<TempoPinRule>> {
        self.tempo_pins
            .iter()
            .map(|pin| {
                TempoPinRule::new(&pin.pattern, pin.tempo)
                    .map(|rule| rule.with_reason(pin.reason.clone()))
                    .map_err(|e: PinError| Error::Config(e.to_string()))
            })
            .collect()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Resolve the catalog API token: ENV → TOML
pub fn resolve_catalog_token(config: &EnrichmentConfig) -> Option<String> {
    let env_token = std::env::var(CATALOG_TOKEN_ENV).ok().filter(|t| is_valid_token(t));
    let toml_token = config.api_token.clone().filter(|t| is_valid_token(t));

    match (env_token, toml_token) {
        (Some(env), Some(_)) => {
            warn!(
                "Catalog token found in environment and TOML. Using {} (highest priority).",
                CATALOG_TOKEN_ENV
            );
            Some(env)
        }
        (Some(env), None) => {
            info!("Catalog token loaded from environment");
            Some(env)
        }
        (None, Some(toml)) => {
            info!("Catalog token loaded from TOML config");
            Some(toml)
        }
        (None, None) => None,
    }
}
