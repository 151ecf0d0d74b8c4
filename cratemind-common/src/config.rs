//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CRATEMIND_ROOT`)
//! 3. TOML config file value
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "CRATEMIND_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "cratemind.db";

/// Logging section shared by every service TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set (e.g. "info", "cratemind_ai=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolves the root folder for a module following the priority order above
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_value: None,
        }
    }

    /// Root folder passed on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder read from the module's TOML file
    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve the root folder. Never fails: falls back to the compiled default.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, path = %path.display(), "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, path = %path, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!(module = %self.module_name, path = %path.display(), "Root folder from TOML config");
            return path.clone();
        }

        let fallback = default_root_folder();
        info!(module = %self.module_name, path = %fallback.display(), "Root folder from compiled default");
        fallback
    }
}

/// Creates the root folder on first start and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!(path = %self.root_folder.display(), "Created root folder");
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cratemind"))
        .unwrap_or_else(|| PathBuf::from("./cratemind_data"))
}

/// Default TOML location for a module: `<config dir>/cratemind/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cratemind").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file, returning defaults when the file does not exist
///
/// A file that exists but fails to parse is a configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!(path = %path.display(), "Config file loaded");
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct SampleConfig {
        root_folder: Option<PathBuf>,
        logging: LoggingConfig,
    }

    #[test]
    #[serial]
    fn test_cli_arg_wins_over_env() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
        let resolved = RootFolderResolver::new("test")
            .with_cli_arg(Some(PathBuf::from("/tmp/from-cli")))
            .with_toml_value(Some(PathBuf::from("/tmp/from-toml")))
            .resolve();
        std::env::remove_var(ROOT_FOLDER_ENV);

        assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
    }

    #[test]
    #[serial]
    fn test_env_wins_over_toml() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
        let resolved = RootFolderResolver::new("test")
            .with_toml_value(Some(PathBuf::from("/tmp/from-toml")))
            .resolve();
        std::env::remove_var(ROOT_FOLDER_ENV);

        assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
    }

    #[test]
    #[serial]
    fn test_falls_back_to_default() {
        std::env::remove_var(ROOT_FOLDER_ENV);
        let resolved = RootFolderResolver::new("test").resolve();
        assert_eq!(resolved, default_root_folder());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config: SampleConfig = load_toml_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SampleConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("svc.toml");
        let config = SampleConfig {
            root_folder: Some(PathBuf::from("/music")),
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        };

        write_toml_config(&config, &path).unwrap();
        assert!(!path.with_extension("toml.tmp").exists());

        let loaded: SampleConfig = load_toml_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "logging = [unclosed").unwrap();

        let result: Result<SampleConfig> = load_toml_config(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_initializer_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        let init = RootFolderInitializer::new(root.clone());

        init.ensure_directory_exists().unwrap();
        assert!(root.is_dir());
        assert_eq!(init.database_path(), root.join(DATABASE_FILE));
    }
}
