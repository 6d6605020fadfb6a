// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! Configuration can be built in code with [`ClientConfig::builder`] or
//! loaded from YAML, TOML or JSON with [`ConfigLoader`]. Loading resolves
//! `${VAR}` / `${VAR:default}` placeholders in the raw text, then applies
//! `UALINK_*` environment overrides, then validates.
//!
//! ```yaml
//! endpoint: opc.tcp://localhost:4840
//! notification_buffer: 1024
//! min_sampling_interval_ms: 10
//! logging:
//!   level: ${UALINK_LOG:info}
//!   format: json
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ualink_core::ConfigError;

use crate::endpoint::Endpoint;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "UALINK";

// =============================================================================
// ClientConfig
// =============================================================================

/// Client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint to connect to, if the application wants one from config.
    pub endpoint: Option<String>,

    /// Per-monitor notification buffer; notifications beyond it are dropped.
    pub notification_buffer: usize,

    /// Capacity of the state change broadcast.
    pub state_event_capacity: usize,

    /// Lower bound for subscription sampling intervals.
    pub min_sampling_interval_ms: u32,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            notification_buffer: 1024,
            state_event_capacity: 32,
            min_sampling_interval_ms: 10,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Checks every field.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(endpoint) = &self.endpoint {
            Endpoint::parse(endpoint)
                .map_err(|e| ConfigError::invalid_value("endpoint", e.to_string()))?;
        }
        if self.notification_buffer == 0 {
            return Err(ConfigError::invalid_value(
                "notification_buffer",
                "must be greater than 0",
            ));
        }
        if self.state_event_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "state_event_capacity",
                "must be greater than 0",
            ));
        }
        if self.min_sampling_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "min_sampling_interval_ms",
                "must be greater than 0",
            ));
        }
        self.logging.validate()
    }
}

// =============================================================================
// LoggingConfig
// =============================================================================

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Abbreviated lines.
    Compact,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "text" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Compact => f.write_str("compact"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `ualink_client=debug,warn`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-monitor notification buffer.
    pub fn notification_buffer(mut self, capacity: usize) -> Self {
        self.config.notification_buffer = capacity;
        self
    }

    /// Sets the state event capacity.
    pub fn state_event_capacity(mut self, capacity: usize) -> Self {
        self.config.state_event_capacity = capacity;
        self
    }

    /// Sets the minimum sampling interval.
    pub fn min_sampling_interval_ms(mut self, interval_ms: u32) -> Self {
        self.config.min_sampling_interval_ms = interval_ms;
        self
    }

    /// Sets the log filter.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Sets the log format.
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ConfigResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ConfigError::UnsupportedFormat {
                extension: other.to_string(),
            }),
            None => Err(ConfigError::UnsupportedFormat {
                extension: "(none)".to_string(),
            }),
        }
    }

    /// Format name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`ClientConfig`] from files or strings.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the `UALINK` prefix and environment handling on.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env = enabled;
        self
    }

    /// Loads a file; the format follows the extension.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<ClientConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = self.load_from_str(&content, format)?;

        debug!(
            endpoint = ?config.endpoint,
            notification_buffer = config.notification_buffer,
            min_sampling_interval_ms = config.min_sampling_interval_ms,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses configuration text.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<ClientConfig> {
        let mut config = if self.resolve_env {
            parse(&resolve_placeholders(content), format)?
        } else {
            parse(content, format)?
        };
        if self.resolve_env {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<(String, String)> {
        let key = format!("{}_{}", self.env_prefix, name);
        env::var(&key).ok().map(|value| (key, value))
    }

    fn apply_env_overrides(&self, config: &mut ClientConfig) -> ConfigResult<()> {
        if let Some((_, value)) = self.var("ENDPOINT") {
            config.endpoint = Some(value);
        }
        if let Some((key, value)) = self.var("NOTIFICATION_BUFFER") {
            config.notification_buffer = value
                .parse()
                .map_err(|_| ConfigError::invalid_value(key, "expected a positive integer"))?;
        }
        if let Some((key, value)) = self.var("MIN_SAMPLING_INTERVAL_MS") {
            config.min_sampling_interval_ms = value
                .parse()
                .map_err(|_| ConfigError::invalid_value(key, "expected a positive integer"))?;
        }
        if let Some((_, value)) = self.var("LOG_LEVEL") {
            config.logging.level = value;
        }
        if let Some((key, value)) = self.var("LOG_FORMAT") {
            config.logging.format = LogFormat::parse(&value)
                .ok_or_else(|| ConfigError::invalid_value(key, "expected text, json or compact"))?;
        }
        Ok(())
    }
}

fn parse(content: &str, format: ConfigFormat) -> ConfigResult<ClientConfig> {
    let parse_error = |message: String| ConfigError::Parse {
        format: format.name(),
        message,
    };
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Replaces `${VAR}` and `${VAR:default}`.
///
/// Unset variables without a default and unterminated placeholders are
/// left as written.
fn resolve_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not set");
                result.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}

/// Loads a file with the default loader.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ClientConfig> {
    ConfigLoader::new().load(path)
}
