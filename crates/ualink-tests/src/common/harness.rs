// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Client setup against a [`SimulatedServer`] and timeout helpers for
//! completions and monitor streams.
//!
//! ## Design Principles
//!
//! - Every await on the engine is bounded, so a regression fails the test
//!   instead of hanging it
//! - One server per test; clients share it only when the test asks

use std::future::Future;
use std::time::Duration;

use ualink_client::{
    Client, ClientConfig, ClientState, Completion, DataChange, EventMonitor, EventNotification,
    ValueMonitor,
};
use ualink_core::UaResult;

use super::fixtures::EndpointFixtures;
use super::init_test_logging;
use super::server::SimulatedServer;

/// Upper bound for a single engine operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding nothing more arrives.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Sampling interval used by most subscription tests.
pub const TEST_INTERVAL_MS: u32 = 20;

// =============================================================================
// ClientHarness
// =============================================================================

/// Builds clients bound to one simulated server.
pub struct ClientHarness {
    server: SimulatedServer,
    config: ClientConfig,
}

impl Default for ClientHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHarness {
    /// A harness with a fresh server and default client configuration.
    pub fn new() -> Self {
        init_test_logging();
        Self {
            server: SimulatedServer::new(),
            config: ClientConfig::default(),
        }
    }

    /// Uses `config` for every client.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// The server.
    pub fn server(&self) -> &SimulatedServer {
        &self.server
    }

    /// A disconnected client with its own connection.
    pub fn client(&self) -> Client {
        Client::new(self.server.connection(), self.config.clone())
            .expect("harness config must validate")
    }

    /// A client connected anonymously.
    pub async fn connected_client(&self) -> Client {
        let client = self.client();
        complete(client.connect(EndpointFixtures::anonymous()))
            .await
            .expect("anonymous connect must succeed");
        assert_eq!(client.state(), ClientState::Connected);
        client
    }
}

// =============================================================================
// Completions
// =============================================================================

/// Awaits an enqueued operation, failing the test if it never completes.
pub async fn complete<T>(operation: UaResult<Completion<T>>) -> UaResult<T> {
    let completion = operation?;
    match tokio::time::timeout(OPERATION_TIMEOUT, completion).await {
        Ok(result) => result,
        Err(_) => panic!("Operation did not complete within {:?}", OPERATION_TIMEOUT),
    }
}

/// Awaits `future` for at most `timeout`.
pub async fn recv_within<F: Future>(timeout: Duration, future: F) -> Option<F::Output> {
    tokio::time::timeout(timeout, future).await.ok()
}

// =============================================================================
// Monitor streams
// =============================================================================

/// Next data change, failing the test after [`OPERATION_TIMEOUT`].
pub async fn next_change(monitor: &mut ValueMonitor) -> DataChange {
    match recv_within(OPERATION_TIMEOUT, monitor.recv()).await {
        Some(Some(change)) => change,
        Some(None) => panic!("Monitor {} closed", monitor.item_id()),
        None => panic!("No data change on monitor {}", monitor.item_id()),
    }
}

/// Next event, failing the test after [`OPERATION_TIMEOUT`].
pub async fn next_event(monitor: &mut EventMonitor) -> EventNotification {
    match recv_within(OPERATION_TIMEOUT, monitor.recv()).await {
        Some(Some(event)) => event,
        Some(None) => panic!("Monitor {} closed", monitor.item_id()),
        None => panic!("No event on monitor {}", monitor.item_id()),
    }
}

/// Asserts that no data change arrives during [`QUIET_PERIOD`].
pub async fn expect_no_change(monitor: &mut ValueMonitor) {
    if let Some(Some(change)) = recv_within(QUIET_PERIOD, monitor.recv()).await {
        panic!("Unexpected data change {:?}", change);
    }
}

/// Waits until the client reaches `state`.
pub async fn wait_for_state(client: &Client, state: ClientState) -> bool {
    let mut status = client.watch_status();
    let reached = status.wait_for(|current| current.state == state);
    let ok = matches!(recv_within(OPERATION_TIMEOUT, reached).await, Some(Ok(_)));
    ok
}
