//! Unit tests for configuration resolution
//!
//! Tests cover:
//! - Missing TOML files fall back to compiled defaults
//! - Priority order: overrides > TOML file > defaults
//! - Malformed TOML reports a configuration error
//! - Platform config file discovery
//!
//! Note: Tests that manipulate XDG_CONFIG_HOME are marked with #[serial]
//! so they do not race each other.

use overlay_common::config::{
    default_config_file, load_toml_config, resolve_config, ConfigOverrides, OverlayConfig,
};
use overlay_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;

fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}

#[test]
fn test_missing_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_defaults_when_nothing_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let config = resolve_config(ConfigOverrides::default(), Some(&path)).unwrap();
    assert_eq!(config, OverlayConfig::default());
    assert_eq!(config.port, 3000);
    assert_eq!(config.autosave_secs, 30);
}

#[test]
fn test_toml_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
port = 4100
state_file = "/var/lib/overlay/state.json"
autosave_secs = 0
log_level = "info"
"#,
    );

    let config = resolve_config(ConfigOverrides::default(), Some(&path)).unwrap();
    assert_eq!(config.port, 4100);
    assert_eq!(config.state_file, PathBuf::from("/var/lib/overlay/state.json"));
    assert_eq!(config.autosave_secs, 0);
    assert_eq!(config.log_level, "info");
    // Untouched keys keep their defaults
    assert_eq!(config.catalog_file, PathBuf::from("catalog.json"));
    assert_eq!(config.history_file, PathBuf::from("web/data/donations.json"));
}

#[test]
fn test_overrides_beat_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "port = 4100\nweb_root = \"public\"\nhistory_file = \"toml.json\"\n",
    );

    let overrides = ConfigOverrides {
        port: Some(5000),
        history_file: Some(PathBuf::from("cli.json")),
        ..Default::default()
    };

    let config = resolve_config(overrides, Some(&path)).unwrap();
    assert_eq!(config.port, 5000);
    assert_eq!(config.web_root, PathBuf::from("public"));
    assert_eq!(config.history_file, PathBuf::from("cli.json"));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "port = \"not a number\"\n");

    let err = resolve_config(ConfigOverrides::default(), Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}

#[test]
fn test_unknown_key_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "prot = 4100\n");

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_config_file_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("stream-overlay");
    fs::create_dir_all(&app_dir).unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    assert!(default_config_file().is_none());

    fs::write(app_dir.join("config.toml"), "port = 4200\n").unwrap();
    assert_eq!(default_config_file(), Some(app_dir.join("config.toml")));

    let config = resolve_config(ConfigOverrides::default(), None).unwrap();
    assert_eq!(config.port, 4200);

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }
}
