// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared server, fixtures and helpers for the integration suites.
//!
//! ## Module Structure
//!
//! - `server`: in-memory [`BackendConnection`](ualink_client::BackendConnection)
//!   with a demo address space and fault injection
//! - `fixtures`: node addresses, endpoints and sample values
//! - `harness`: client setup and timeout helpers
//! - `assertions`: assertion helpers for attribute results and errors

pub mod assertions;
pub mod fixtures;
pub mod harness;
pub mod server;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
pub use server::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of each test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,ualink_client=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Generate a unique test ID for resource isolation.
pub fn unique_test_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "test_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Create a temporary directory for test data.
pub fn temp_test_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}
