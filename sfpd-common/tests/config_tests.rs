//! Unit tests for configuration resolution
//!
//! Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate SFPD_* or GD_GEM_* variables are marked #[serial].

use serial_test::serial;
use sfpd_common::config::{
    EtlConfig, DEFAULT_INSTANCE_ID, DEFAULT_LATEST_URL, ENV_DATA_DIR, ENV_WAREHOUSE_PASSWORD,
    ENV_WAREHOUSE_URL, ENV_WAREHOUSE_USER,
};
use sfpd_common::template::MissingVariablePolicy;
use sfpd_common::Error;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

fn clear_env() {
    env::remove_var(ENV_DATA_DIR);
    env::remove_var(ENV_WAREHOUSE_URL);
    env::remove_var(ENV_WAREHOUSE_USER);
    env::remove_var(ENV_WAREHOUSE_PASSWORD);
}

#[test]
fn test_defaults_when_toml_is_empty() {
    let config = EtlConfig::from_toml_str("").unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.feed.latest_url, DEFAULT_LATEST_URL);
    assert_eq!(config.warehouse.instance_id, DEFAULT_INSTANCE_ID);
    assert_eq!(config.warehouse.locations_table, "locations_tmp");
    assert_eq!(config.warehouse.sfpd_table, "sfpd_tmp");
    assert_eq!(config.geocoder.min_interval_ms, 0);
    assert_eq!(config.templates.missing_variable, MissingVariablePolicy::Error);
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = EtlConfig::from_toml_str(
        r#"
        data_dir = "/tmp/sfpd-data"

        [geocoder]
        base_url = "http://localhost:8080"

        [templates]
        missing_variable = "blank"
        "#,
    )
    .unwrap();

    assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/sfpd-data")));
    assert_eq!(config.geocoder.base_url, "http://localhost:8080");
    assert_eq!(config.geocoder.timeout_secs, 30);
    assert_eq!(config.templates.missing_variable, MissingVariablePolicy::Blank);
    assert_eq!(config.feed.latest_url, DEFAULT_LATEST_URL);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = EtlConfig::from_toml_str("data_dir = [").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_derived_paths_live_in_data_dir() {
    let config = EtlConfig {
        data_dir: Some(PathBuf::from("/srv/sfpd")),
        ..Default::default()
    };

    assert_eq!(config.cache_db_path(), Path::new("/srv/sfpd/data.db"));
    assert_eq!(config.archive_path(), Path::new("/srv/sfpd/data.zip"));
    assert_eq!(config.extract_dir(), Path::new("/srv/sfpd/incidents"));
    assert_eq!(
        config.import_csv_path(),
        Path::new("/srv/sfpd/locations_filtered_condensed.csv")
    );
}

#[test]
fn test_explicit_missing_config_file_fails() {
    let err = EtlConfig::load(Some(Path::new("/nonexistent/sfpd-etl.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "data_dir = \"/from/toml\"").unwrap();
    writeln!(file, "[warehouse]").unwrap();
    writeln!(file, "username = \"toml-user\"").unwrap();

    env::set_var(ENV_DATA_DIR, "/from/env");
    env::set_var(ENV_WAREHOUSE_USER, "env-user");

    let config = EtlConfig::resolve(Some(file.path()), None).unwrap();
    assert_eq!(config.data_dir, Some(PathBuf::from("/from/env")));
    assert_eq!(config.warehouse.username.as_deref(), Some("env-user"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_DATA_DIR, "/from/env");

    let file = tempfile::NamedTempFile::new().unwrap();
    let config = EtlConfig::resolve(Some(file.path()), Some(Path::new("/from/cli"))).unwrap();
    assert_eq!(config.data_dir(), PathBuf::from("/from/cli"));

    clear_env();
}

#[test]
#[serial]
fn test_empty_env_vars_are_ignored() {
    clear_env();
    env::set_var(ENV_WAREHOUSE_USER, "");
    env::set_var(ENV_WAREHOUSE_PASSWORD, "   ");

    let mut config = EtlConfig::default();
    config.apply_env();
    assert!(config.warehouse.username.is_none());
    assert!(config.warehouse.password.is_none());

    clear_env();
}

#[test]
fn test_credentials_fail_fast_when_missing() {
    let config = EtlConfig::default();
    let err = config.warehouse.credentials().unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains(ENV_WAREHOUSE_USER)),
        other => panic!("expected Config error, got {:?}", other),
    }

    let mut config = EtlConfig::default();
    config.warehouse.username = Some("analyst".to_string());
    config.warehouse.password = Some(String::new());
    let err = config.warehouse.credentials().unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains(ENV_WAREHOUSE_PASSWORD)),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_credentials_debug_redacts_password() {
    let mut config = EtlConfig::default();
    config.warehouse.username = Some("analyst".to_string());
    config.warehouse.password = Some("hunter2".to_string());

    let credentials = config.warehouse.credentials().unwrap();
    assert_eq!(credentials.username, "analyst");
    assert!(!format!("{:?}", credentials).contains("hunter2"));
    assert!(!format!("{:?}", config.warehouse).contains("hunter2"));
}

#[test]
fn test_connection_url_default_and_override() {
    let mut config = EtlConfig::default();
    assert_eq!(
        config.warehouse.connection_url(),
        format!("postgres://secure.gooddata.com/{}", DEFAULT_INSTANCE_ID)
    );

    config.warehouse.url = Some("sqlite::memory:".to_string());
    assert_eq!(config.warehouse.connection_url(), "sqlite::memory:");
}

#[test]
fn test_ensure_data_dir_creates_directory() {
    let root = tempfile::tempdir().unwrap();
    let config = EtlConfig {
        data_dir: Some(root.path().join("nested").join("sfpd")),
        ..Default::default()
    };

    let dir = config.ensure_data_dir().unwrap();
    assert!(dir.is_dir());
}
