//! Tests for configuration loading and graceful degradation
//!
//! Tests that manipulate DCR_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use std::env;
use std::path::PathBuf;

use dcr_common::config::{
    load_toml_config, resolve_config_path, ConfigOverrides, ReviewConfig, CONFIG_ENV_VAR,
};
use dcr_common::Error;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn test_load_full_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
bind_address = "0.0.0.0"
port = 8123
page_size = 12
image_root = "/srv/images"
symmetric_unverify = true
auto_advance = false
open_browser = true

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = ReviewConfig::load(Some(&path), ConfigOverrides::default()).unwrap();
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8123);
    assert_eq!(config.page_size, 12);
    assert_eq!(config.image_root, PathBuf::from("/srv/images"));
    assert!(config.symmetric_unverify);
    assert!(!config.auto_advance);
    assert!(config.open_browser);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.source, Some(path));

    let options = config.session_options();
    assert_eq!(options.page_size, 12);
    assert!(options.symmetric_unverify);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let config = ReviewConfig::load(Some(&path), ConfigOverrides::default()).unwrap();
    assert_eq!(config.port, 3000);
    assert_eq!(config.page_size, 30);
    assert!(config.source.is_none());
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"\n").unwrap();

    let result = ReviewConfig::load(Some(&path), ConfigOverrides::default());
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_unreadable_config_path_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    // Exists but is a directory, so reading it fails
    let path = temp_dir.path().join("config.toml");
    std::fs::create_dir(&path).unwrap();

    let result = ReviewConfig::load(Some(&path), ConfigOverrides::default());
    match result {
        Err(Error::Config(message)) => assert!(message.contains("Failed to read")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
fn test_zero_page_size_in_file_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "page_size = 0\n").unwrap();

    let result = ReviewConfig::load(Some(&path), ConfigOverrides::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_cli_overrides_beat_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = 8123\npage_size = 12\n").unwrap();

    let overrides = ConfigOverrides {
        port: Some(4000),
        image_root: Some(PathBuf::from("/data")),
        ..ConfigOverrides::default()
    };
    let config = ReviewConfig::load(Some(&path), overrides).unwrap();
    assert_eq!(config.port, 4000);
    assert_eq!(config.page_size, 12);
    assert_eq!(config.image_root, PathBuf::from("/data"));
}

#[test]
#[serial]
fn test_env_var_locates_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("from-env.toml");
    std::fs::write(&path, "port = 7001\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(resolve_config_path(None), Some(path.clone()));
    let config = ReviewConfig::load(None, ConfigOverrides::default()).unwrap();
    assert_eq!(config.port, 7001);

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/dcr-env-config.toml");

    let cli = PathBuf::from("/tmp/dcr-cli-config.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli));

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_default_path_without_overrides() {
    env::remove_var(CONFIG_ENV_VAR);

    let resolved = resolve_config_path(None);
    if let Some(path) = resolved {
        assert!(path.ends_with("dcr/config.toml"));
    }
}
