//! Integration tests for root folder resolution and TOML helpers

use cratemind_common::config::{
    load_toml_config, write_toml_config, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, ROOT_FOLDER_ENV,
};
use serde::{Deserialize, Serialize};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ServiceToml {
    root_folder: Option<PathBuf>,
    port: Option<u16>,
    logging: LoggingConfig,
}

#[test]
#[serial]
fn toml_root_folder_used_when_no_cli_or_env() {
    std::env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cratemind-ai.toml");
    std::fs::write(&path, "root_folder = \"/srv/crates\"\nport = 5740\n").unwrap();

    let toml: ServiceToml = load_toml_config(&path).unwrap();
    let resolved = RootFolderResolver::new("cratemind-ai")
        .with_toml_value(toml.root_folder)
        .resolve();

    assert_eq!(resolved, PathBuf::from("/srv/crates"));
    assert_eq!(toml.port, Some(5740));
    assert_eq!(toml.logging.level, "info");
}

#[test]
#[serial]
fn empty_env_value_is_ignored() {
    std::env::set_var(ROOT_FOLDER_ENV, "  ");
    let resolved = RootFolderResolver::new("cratemind-ai")
        .with_toml_value(Some(PathBuf::from("/srv/toml")))
        .resolve();
    std::env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/srv/toml"));
}

#[test]
fn write_overwrites_existing_file_atomically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cratemind-ai.toml");

    let first = ServiceToml {
        port: Some(1),
        ..Default::default()
    };
    write_toml_config(&first, &path).unwrap();

    let second = ServiceToml {
        port: Some(2),
        logging: LoggingConfig {
            level: "warn".to_string(),
        },
        ..Default::default()
    };
    write_toml_config(&second, &path).unwrap();

    let loaded: ServiceToml = load_toml_config(&path).unwrap();
    assert_eq!(loaded, second);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn initializer_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let init = RootFolderInitializer::new(dir.path().join("root"));

    init.ensure_directory_exists().unwrap();
    init.ensure_directory_exists().unwrap();

    assert!(init.root_folder().is_dir());
    assert!(init.database_path().ends_with("cratemind.db"));
}
