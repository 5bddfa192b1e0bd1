//! Integration tests for config file resolution and reloading
//!
//! Tests that manipulate CHAOS_CONFIG are marked with #[serial] so they never
//! race each other.

use chaos_common::config::{
    read_config_file, resolve_config_path, write_config_file, ChaosConfig, ConfigStore,
    CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let cli = PathBuf::from("/tmp/from-cli.toml");
    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_falls_back_to_default_location() {
    env::set_var(CONFIG_ENV_VAR, "  ");

    let resolved = resolve_config_path(None);
    if let Some(path) = resolved {
        assert!(path.ends_with("chaos/config.toml"));
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let store = ConfigStore::new(Some(temp_dir.path().join("absent.toml")));

    assert_eq!(store.load(), ChaosConfig::default());
}

#[test]
fn test_write_then_read_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = ChaosConfig::default();
    config.request.command = "!rq".to_string();
    config.filter.playlist = Some("Chaos Picks".to_string());
    config.chat.channels = vec!["somechannel".to_string()];

    write_config_file(&config, &path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = read_config_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_reload_picks_up_edits() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[request]\nqueue_size = 4\n").unwrap();

    let store = ConfigStore::new(Some(path.clone()));
    assert_eq!(store.load().request.queue_size, 4);

    std::fs::write(&path, "[request]\nqueue_size = 9\n").unwrap();
    assert_eq!(store.load().request.queue_size, 9);
}

#[test]
fn test_parse_error_keeps_last_good_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[request]\nlimit_per_user = 7\n").unwrap();

    let store = ConfigStore::new(Some(path.clone()));
    assert_eq!(store.load().request.limit_per_user, 7);

    std::fs::write(&path, "[request\nlimit_per_user = ").unwrap();
    let config = store.load();
    assert_eq!(config.request.limit_per_user, 7);
    assert_eq!(store.current().request.limit_per_user, 7);
}

#[tokio::test]
async fn test_async_reload_follows_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[request]\nlimit_per_user = 3\n").unwrap();

    let store = ConfigStore::new(Some(path.clone()));
    assert_eq!(store.reload().await.request.limit_per_user, 3);

    std::fs::write(&path, "[request]\nlimit_per_user = 5\n").unwrap();
    assert_eq!(store.reload().await.request.limit_per_user, 5);

    // Broken file keeps the last good snapshot
    std::fs::write(&path, "[request\n").unwrap();
    assert_eq!(store.reload().await.request.limit_per_user, 5);

    std::fs::remove_file(&path).unwrap();
    assert_eq!(store.reload().await.request.limit_per_user, 2);
}

#[tokio::test]
async fn test_async_reload_without_file_keeps_fixed_snapshot() {
    let mut config = ChaosConfig::default();
    config.request.queue_size = 3;

    let store = ConfigStore::fixed(config);
    assert_eq!(store.reload().await.request.queue_size, 3);
}

#[test]
fn test_deleted_file_reverts_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[filter]\nmin_seconds = 200.0\n").unwrap();

    let store = ConfigStore::new(Some(path.clone()));
    assert_eq!(store.load().filter.min_seconds, 200.0);

    std::fs::remove_file(&path).unwrap();
    assert_eq!(store.load().filter.min_seconds, 60.0);
}

#[test]
fn test_wrong_value_type_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[request]\nqueue_size = \"lots\"\n").unwrap();

    assert!(read_config_file(&path).is_err());
}
