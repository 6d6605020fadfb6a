// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging initialization.
//!
//! The engine only emits `tracing` events; applications that do not
//! install their own subscriber can call [`init_logging`]. `RUST_LOG`
//! takes precedence over the configured level.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ualink_core::ConfigError;

use crate::config::{ConfigResult, LogFormat, LoggingConfig};

/// Installs a global subscriber for `config`.
///
/// # Errors
///
/// [`ConfigError::Logging`] if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);
    let ansi = std::io::stdout().is_terminal();

    let installed = match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(ansi),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_ansi(ansi))
            .try_init(),
    };
    installed.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })
}

/// Builds the filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> ConfigResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| ConfigError::Logging {
        message: format!("invalid filter '{level}': {e}"),
    })
}

/// Parses a plain level name.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
