//! Unit tests for configuration and graceful degradation
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that
//! manipulate LIBRIS_ROOT_FOLDER or LIBRIS_ROOT are marked #[serial].

use libris_common::config::{
    load_toml_config, write_toml_config, AiProviderConfig, CompiledDefaults, LoggingConfig,
    PipelineConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert!(defaults.root_folder.to_string_lossy().contains("libris"));
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    let test_path = "/tmp/libris-test-env-folder";
    env::set_var("LIBRIS_ROOT_FOLDER", test_path);

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from(test_path));

    env::remove_var("LIBRIS_ROOT_FOLDER");
}

#[test]
#[serial]
fn test_resolver_root_folder_takes_precedence() {
    env::remove_var("LIBRIS_ROOT_FOLDER");
    env::remove_var("LIBRIS_ROOT");

    env::set_var("LIBRIS_ROOT_FOLDER", "/tmp/libris-priority-1");
    env::set_var("LIBRIS_ROOT", "/tmp/libris-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/libris-priority-1"));

    env::remove_var("LIBRIS_ROOT_FOLDER");
    env::remove_var("LIBRIS_ROOT");
}

#[test]
#[serial]
fn test_resolver_missing_config_file_falls_back_to_default() {
    env::remove_var("LIBRIS_ROOT_FOLDER");
    env::remove_var("LIBRIS_ROOT");

    let root_folder = RootFolderResolver::new("nonexistent-test-module-12345").resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/libris-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("libris.db"));
    assert_eq!(initializer.blob_path(), root.join("blobs"));
}

#[test]
fn test_initializer_creates_nested_directories_idempotently() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("level1").join("level2");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
    assert!(initializer.blob_path().is_dir());
    assert!(!initializer.database_exists());
}

#[test]
fn test_toml_roundtrip_with_provider_section() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("libris-ai.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/libris")),
        logging: LoggingConfig::default(),
        ai: AiProviderConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://localhost:9999/v1".to_string()),
            text_model: None,
            image_model: None,
        },
        tmdb_api_key: None,
        pipeline: PipelineConfig {
            batch_size: Some(3),
            ..Default::default()
        },
    };

    write_toml_config(&config, &path).unwrap();
    let parsed = load_toml_config(&path).unwrap();

    assert_eq!(parsed, config);
}

#[test]
fn test_missing_sections_use_defaults() {
    let toml_str = r#"
        root_folder = "/srv/libris"
        [logging]
        level = "debug"
    "#;

    let config: TomlConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.ai.api_key, None);
    assert_eq!(config.pipeline.poll_interval_secs, None);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_load_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "root_folder = [").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Parse TOML failed"));
}
