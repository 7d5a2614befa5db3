//! Integration tests for configuration parsing and handling.
//!
//! These tests verify that `kinship.toml` files load, that environment
//! overrides apply, and that group options carry the configuration.

mod common;

use std::sync::Arc;

use common::{Db, Post};
use kinship::KinshipConfig;
use kinship::prelude::*;
use tempfile::TempDir;

/// Test loading configuration from a file
#[test]
fn test_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kinship.toml");
    std::fs::write(
        &path,
        r#"
        [loading]
        slow_load_threshold_ms = 50

        [debug]
        log_loads = true
        "#,
    )
    .unwrap();

    let config = KinshipConfig::from_file(&path).unwrap();

    assert_eq!(config.loading.slow_load_threshold_ms, 50);
    assert!(config.debug.log_loads);
    assert!(config.presentation.strict_selection);
}

/// Test a file missing from an existing directory surfaces a configuration error
#[test]
fn test_config_missing_file_in_dir() {
    let temp_dir = TempDir::new().unwrap();
    let err = KinshipConfig::from_file(temp_dir.path().join("kinship.toml")).unwrap_err();
    assert!(err.is_configuration());
}

/// Test a missing file surfaces a configuration error
#[test]
fn test_config_missing_file() {
    let err = KinshipConfig::from_file("/nonexistent/kinship.toml").unwrap_err();
    assert!(err.is_configuration());
}

/// Test invalid TOML is rejected
#[test]
fn test_config_invalid_toml() {
    let err = KinshipConfig::from_str("[loading\nslow_load_threshold_ms = 1").unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("invalid kinship.toml"));
}

/// Test environment overrides only apply to the named environment
#[test]
fn test_config_environment_selection() {
    let content = r#"
        [loading]
        slow_load_threshold_ms = 1000

        [environments.test.loading]
        slow_load_threshold_ms = 0
    "#;

    let test = KinshipConfig::from_str(content).unwrap().with_environment("test");
    assert!(test.loading.slow_load_threshold().is_none());

    let other = KinshipConfig::from_str(content).unwrap().with_environment("staging");
    assert_eq!(other.loading.slow_load_threshold_ms, 1000);
}

/// Test configuration round-trips through serde
#[test]
fn test_config_serialize() {
    let config = KinshipConfig::default();
    let toml = toml::to_string(&config).unwrap();
    let parsed = KinshipConfig::from_str(&toml).unwrap();
    assert_eq!(
        parsed.loading.slow_load_threshold_ms,
        config.loading.slow_load_threshold_ms
    );
}

/// Test groups expose the configuration they were built with
#[tokio::test]
async fn test_group_options_carry_config() {
    let db = Db::seeded();
    let config = Arc::new(
        KinshipConfig::from_str("[loading]\nslow_load_threshold_ms = 1\n[debug]\nlog_loads = true")
            .unwrap(),
    );

    let posts = Post::from_array_with(
        &db.posts,
        db.clone(),
        GroupOptions::new().with_config(config.clone()),
    )
    .unwrap();

    assert_eq!(posts[0].config().loading.slow_load_threshold_ms, 1);
    posts[0].load("author").await.unwrap();
    assert_eq!(db.call_count("users"), 1);
}
