// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Integration tests for configuration files and logging setup:
//!
//! - YAML, TOML and JSON files
//! - `${VAR}` placeholders and environment overrides
//! - Validation and loader errors
//! - Filter construction for the log layer
//!
//! ## Test Categories
//!
//! - `test_config_*`: File loading
//! - `test_env_*`: Environment handling
//! - `test_logging_*`: Logging helpers

use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::Level;

use ualink_client::config::load_config;
use ualink_client::logging::{build_filter, parse_level};
use ualink_client::{Client, ClientConfig, ConfigFormat, ConfigLoader, LogFormat};
use ualink_core::{ConfigError, ErrorKind, UaError};

use ualink_tests::common::{
    assert_error_kind, init_test_logging, temp_test_dir, unique_test_id, SimulatedServer,
};

const YAML: &str = r#"
endpoint: opc.tcp://localhost:43344
notification_buffer: 16
min_sampling_interval_ms: 25
logging:
  level: debug
  format: json
"#;

const TOML: &str = r#"
endpoint = "opc.tcp://localhost:43344"
notification_buffer = 16
min_sampling_interval_ms = 25

[logging]
level = "debug"
format = "json"
"#;

const JSON: &str = r#"{
  "endpoint": "opc.tcp://localhost:43344",
  "notification_buffer": 16,
  "min_sampling_interval_ms": 25,
  "logging": { "level": "debug", "format": "json" }
}"#;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write config file");
    path
}

fn env_prefix() -> String {
    unique_test_id().to_uppercase()
}

// =============================================================================
// File Loading Tests
// =============================================================================

#[test]
fn test_config_every_format() {
    init_test_logging();
    let dir = temp_test_dir("ualink_config");

    for (name, content) in [
        ("client.yaml", YAML),
        ("client.yml", YAML),
        ("client.toml", TOML),
        ("client.json", JSON),
    ] {
        let path = write_file(&dir, name, content);
        let config = ConfigLoader::new()
            .with_env_prefix(env_prefix())
            .load(&path)
            .unwrap();

        assert_eq!(
            config.endpoint.as_deref(),
            Some("opc.tcp://localhost:43344"),
            "{name}"
        );
        assert_eq!(config.notification_buffer, 16);
        assert_eq!(config.min_sampling_interval_ms, 25);
        assert_eq!(config.state_event_capacity, 32);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}

#[test]
fn test_config_missing_fields_use_defaults() {
    let config = ConfigLoader::new()
        .with_env_vars(false)
        .load_from_str("notification_buffer: 8\n", ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.notification_buffer, 8);
    assert_eq!(config.endpoint, None);
    assert_eq!(config.min_sampling_interval_ms, 10);
    assert_eq!(config.logging, ClientConfig::default().logging);
}

#[test]
fn test_config_serialized_config_loads_back() {
    let dir = temp_test_dir("ualink_config");
    let original = ClientConfig::builder()
        .endpoint("opc.tcp://plc.local:4840")
        .notification_buffer(64)
        .state_event_capacity(8)
        .min_sampling_interval_ms(50)
        .log_level("ualink_client=trace")
        .log_format(LogFormat::Compact)
        .build()
        .unwrap();

    let path = write_file(
        &dir,
        "client.json",
        &serde_json::to_string_pretty(&original).unwrap(),
    );
    let loaded = ConfigLoader::new().with_env_vars(false).load(&path).unwrap();

    assert_eq!(loaded, original);
}

#[test]
fn test_config_loader_errors() {
    let dir = temp_test_dir("ualink_config");

    let unsupported = write_file(&dir, "client.ini", "endpoint = x");
    assert!(matches!(
        load_config(&unsupported),
        Err(ConfigError::UnsupportedFormat { .. })
    ));

    let missing = dir.path().join("absent.yaml");
    assert!(matches!(load_config(&missing), Err(ConfigError::Io { .. })));

    let broken = write_file(&dir, "client.toml", "notification_buffer = [");
    assert!(matches!(
        load_config(&broken),
        Err(ConfigError::Parse { format: "toml", .. })
    ));
}

#[test]
fn test_config_validation_errors() {
    let loader = ConfigLoader::new().with_env_vars(false);

    for (content, field) in [
        ("notification_buffer: 0\n", "notification_buffer"),
        ("state_event_capacity: 0\n", "state_event_capacity"),
        ("min_sampling_interval_ms: 0\n", "min_sampling_interval_ms"),
        ("endpoint: http://localhost:4840\n", "endpoint"),
        ("logging:\n  level: ' '\n", "logging.level"),
    ] {
        match loader.load_from_str(content, ConfigFormat::Yaml) {
            Err(ConfigError::InvalidValue { field: actual, .. }) => assert_eq!(actual, field),
            other => panic!("{content:?} gave {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_config_client_rejects_invalid_config() {
    init_test_logging();
    let server = SimulatedServer::new();
    let config = ClientConfig {
        notification_buffer: 0,
        ..ClientConfig::default()
    };

    let result = Client::new(server.connection(), config);
    assert_error_kind(&result, ErrorKind::Configuration);
}

#[tokio::test]
async fn test_config_client_uses_min_interval() {
    init_test_logging();
    let server = SimulatedServer::new();
    let config = ClientConfig::builder()
        .min_sampling_interval_ms(40)
        .build()
        .unwrap();
    let client = Client::new(server.connection(), config).unwrap();
    assert_eq!(client.config().min_sampling_interval_ms, 40);

    client
        .connect("opc.tcp://localhost:43344")
        .unwrap()
        .await
        .unwrap();
    let subscription = client.create_subscription(10).unwrap().await.unwrap();
    assert_eq!(subscription.interval_ms(), 40);
}

// =============================================================================
// Environment Tests
// =============================================================================

#[test]
fn test_env_placeholders() {
    let prefix = env_prefix();
    let level_var = format!("{prefix}_PLACEHOLDER_LEVEL");
    env::set_var(&level_var, "warn");

    let content = format!(
        "endpoint: ${{{prefix}_UNSET_ENDPOINT:opc.tcp://fallback:4840}}\n\
         logging:\n  level: ${{{level_var}}}\n"
    );
    let config = ConfigLoader::new()
        .with_env_prefix(&prefix)
        .load_from_str(&content, ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.endpoint.as_deref(), Some("opc.tcp://fallback:4840"));
    assert_eq!(config.logging.level, "warn");
    env::remove_var(&level_var);
}

#[test]
fn test_env_placeholders_disabled() {
    let content = "logging:\n  level: ${UALINK_NEVER_SET:info}\n";
    let config = ConfigLoader::new()
        .with_env_vars(false)
        .load_from_str(content, ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.logging.level, "${UALINK_NEVER_SET:info}");
}

#[test]
fn test_env_overrides() {
    let prefix = env_prefix();
    let vars = [
        ("ENDPOINT", "opc.tcp://override:4841"),
        ("NOTIFICATION_BUFFER", "256"),
        ("MIN_SAMPLING_INTERVAL_MS", "100"),
        ("LOG_LEVEL", "trace"),
        ("LOG_FORMAT", "compact"),
    ];
    for (name, value) in vars {
        env::set_var(format!("{prefix}_{name}"), value);
    }

    let config = ConfigLoader::new()
        .with_env_prefix(&prefix)
        .load_from_str(YAML, ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.endpoint.as_deref(), Some("opc.tcp://override:4841"));
    assert_eq!(config.notification_buffer, 256);
    assert_eq!(config.min_sampling_interval_ms, 100);
    assert_eq!(config.logging.level, "trace");
    assert_eq!(config.logging.format, LogFormat::Compact);

    let untouched = ConfigLoader::new()
        .with_env_prefix(&prefix)
        .with_env_vars(false)
        .load_from_str(YAML, ConfigFormat::Yaml)
        .unwrap();
    assert_eq!(untouched.notification_buffer, 16);

    for (name, _) in vars {
        env::remove_var(format!("{prefix}_{name}"));
    }
}

#[test]
fn test_env_override_must_parse() {
    let prefix = env_prefix();
    let var = format!("{prefix}_MIN_SAMPLING_INTERVAL_MS");
    env::set_var(&var, "soon");

    let err = ConfigLoader::new()
        .with_env_prefix(&prefix)
        .load_from_str(YAML, ConfigFormat::Yaml)
        .unwrap_err();

    match &err {
        ConfigError::InvalidValue { field, .. } => assert_eq!(field, &var),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(UaError::from(err).kind(), ErrorKind::Configuration);
    env::remove_var(&var);
}

// =============================================================================
// Logging Tests
// =============================================================================

#[test]
fn test_logging_level_names() {
    assert_eq!(parse_level("info"), Some(Level::INFO));
    assert_eq!(parse_level("Error"), Some(Level::ERROR));
    assert_eq!(parse_level("verbose"), None);
}

#[test]
fn test_logging_filter_directives() {
    for level in ["info", "warn,ualink_client=trace", "ualink_core=debug"] {
        assert!(build_filter(level).is_ok(), "{level}");
    }
}
