// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ualink Integration Tests
//!
//! Integration tests for the ualink client engine, run against an
//! in-memory server.
//!
//! ## Test Organization
//!
//! - `tests/integration_codec.rs`: addresses, value codec, status codes
//! - `tests/integration_client.rs`: connection state machine
//! - `tests/integration_attributes.rs`: read, write, browse, call, node handles
//! - `tests/integration_subscriptions.rs`: subscriptions and monitored items
//! - `tests/integration_config.rs`: configuration loading and logging
//!
//! ## Simulated Server
//!
//! [`common::server::SimulatedServer`] implements
//! [`ualink_client::BackendConnection`] over a shared address space
//! modelled on a demo server. Every client gets its own connection from
//! [`common::server::SimulatedServer::connection`]; writes from one client
//! produce notifications for monitors of every other client.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p ualink-tests
//!
//! # Run one suite with engine logs
//! RUST_LOG=ualink_client=debug cargo test -p ualink-tests --test integration_subscriptions
//! ```

pub mod common;

pub use common::*;
