//! Configuration resolution and graceful degradation
//!
//! Tests that touch FOPS_CONFIG are marked #[serial] so they never run in
//! parallel with each other.

use std::env;
use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use fops_common::config::{resolve_config_path, DashboardConfig, CONFIG_ENV_VAR};
use fops_common::Error;

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = DashboardConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, DashboardConfig::default());
}

#[test]
fn test_file_values_override_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
bind = "0.0.0.0:8080"

[generation]
seed = 7
regions = ["WA", "OR"]
as_of = "2026-01-15"

[feed]
capacity = 20
decision_webhook = "http://localhost:9100/decisions"
"#,
    )
    .unwrap();

    let config = DashboardConfig::load(&path).unwrap();
    assert_eq!(config.bind, "0.0.0.0:8080");
    assert_eq!(config.generation.seed, 7);
    assert_eq!(config.generation.regions, vec!["WA", "OR"]);
    assert_eq!(
        config.generation.as_of.map(|d| d.to_string()),
        Some("2026-01-15".to_string())
    );
    assert_eq!(config.feed.capacity, 20);
    assert_eq!(config.feed.early_decision_limit, 64);
    config.validate().unwrap();
}

#[test]
fn test_unparseable_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[generation\nseed = ").unwrap();

    match DashboardConfig::load(&path) {
        Err(Error::Config(message)) => assert!(message.contains("config.toml")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_env_var_locates_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("env.toml");
    fs::write(&path, "page_size = 12\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let resolved = resolve_config_path(None);
    let config = DashboardConfig::resolve(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(path));
    assert_eq!(config.page_size, 12);
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    let temp_dir = TempDir::new().unwrap();
    let cli = temp_dir.path().join("cli.toml");
    let from_env = temp_dir.path().join("env.toml");
    fs::write(&cli, "page_size = 5\n").unwrap();
    fs::write(&from_env, "page_size = 99\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = DashboardConfig::resolve(Some(&cli)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.page_size, 5);
}

#[test]
#[serial]
fn test_blank_env_var_falls_through_to_platform_path() {
    env::set_var(CONFIG_ENV_VAR, "  ");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    let expected: Option<PathBuf> =
        dirs::config_dir().map(|d| d.join("fops").join("config.toml"));
    assert_eq!(resolved, expected);
}
