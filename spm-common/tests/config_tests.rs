//! Configuration resolution tests
//!
//! Tests that touch `SPM_*` environment variables are marked `#[serial]` so
//! they never race each other.

use serial_test::serial;
use spm_common::config::{
    load_toml_config, resolve_root_folder, CacheBackend, ConfigOverrides, ResolvedConfig,
    TomlConfig, DEFAULT_PORT, DEFAULT_STASH_URL, ENV_PORT, ENV_ROOT_FOLDER, ENV_STASH_API_KEY,
    ENV_STASH_URL,
};
use std::env;
use std::path::PathBuf;

fn clear_env() {
    for name in [ENV_ROOT_FOLDER, ENV_STASH_URL, ENV_STASH_API_KEY, ENV_PORT] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();

    let resolved = ResolvedConfig::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();

    assert_eq!(resolved.stash_url, DEFAULT_STASH_URL);
    assert_eq!(resolved.port, DEFAULT_PORT);
    assert!(resolved.stash_api_key.is_none());
    assert_eq!(resolved.cache.backend, CacheBackend::Memory);
    assert_eq!(resolved.log_level, "info");
    assert!(resolved.database_path().ends_with("spm.db"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    clear_env();
    env::set_var(ENV_STASH_URL, "http://env-host:9999/");
    env::set_var(ENV_ROOT_FOLDER, "/tmp/spm-env-root");

    let toml_config = TomlConfig {
        stash_url: Some("http://toml-host:9999".to_string()),
        root_folder: Some(PathBuf::from("/tmp/spm-toml-root")),
        ..Default::default()
    };
    let resolved = ResolvedConfig::resolve(ConfigOverrides::default(), toml_config).unwrap();

    // Trailing slash is trimmed so `/graphql` can be appended safely
    assert_eq!(resolved.stash_url, "http://env-host:9999");
    assert_eq!(resolved.root_folder, PathBuf::from("/tmp/spm-env-root"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env();
    env::set_var(ENV_PORT, "7001");
    env::set_var(ENV_STASH_API_KEY, "env-key");

    let overrides = ConfigOverrides {
        port: Some(7002),
        stash_api_key: Some("cli-key".to_string()),
        ..Default::default()
    };
    let resolved = ResolvedConfig::resolve(overrides, TomlConfig::default()).unwrap();

    assert_eq!(resolved.port, 7002);
    assert_eq!(resolved.stash_api_key.as_deref(), Some("cli-key"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_config_error() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let result = ResolvedConfig::resolve(ConfigOverrides::default(), TomlConfig::default());
    assert!(result.is_err());

    clear_env();
}

#[test]
#[serial]
fn test_root_folder_falls_back_to_toml() {
    clear_env();
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/spm")),
        ..Default::default()
    };
    assert_eq!(resolve_root_folder(None, &toml_config), PathBuf::from("/srv/spm"));
}

#[test]
fn test_missing_toml_file_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert!(config.stash_url.is_none());
}

#[test]
fn test_malformed_toml_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spm.toml");
    std::fs::write(&path, "port = \"not a number\"\n[cache\n").unwrap();
    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_zero_ttl_rejected() {
    clear_env();
    let mut toml_config = TomlConfig::default();
    toml_config.cache.ttl_minutes = 0;
    assert!(ResolvedConfig::resolve(ConfigOverrides::default(), toml_config).is_err());
}
