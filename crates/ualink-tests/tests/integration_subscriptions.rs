// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Subscription Integration Tests
//!
//! Integration tests for subscriptions and monitored items:
//!
//! - Data change delivery, one notification per write and in order
//! - Interval sharing between subscriptions
//! - Event monitors on notifier objects
//! - Monitor removal and subscription deletion
//! - Poll failures and full monitor buffers
//!
//! ## Test Categories
//!
//! - `test_subscription_*`: Subscription lifecycle
//! - `test_value_monitor_*`: Data change monitors
//! - `test_event_monitor_*`: Event monitors

use ualink_client::ClientConfig;
use ualink_core::{ErrorKind, StatusCode, Value};

use ualink_tests::common::{
    assert_double, assert_error_kind, complete, expect_no_change, next_change, next_event, nodes,
    recv_within, ClientHarness, OPERATION_TIMEOUT, TEST_INTERVAL_MS,
};

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_subscription_interval_is_revised_up() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;

    let subscription = complete(client.create_subscription(1)).await.unwrap();

    assert_eq!(subscription.interval_ms(), 10);
    assert_eq!(
        complete(client.active_intervals()).await.unwrap(),
        vec![(10, 1)]
    );
}

#[tokio::test]
async fn test_subscription_intervals_are_shared() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;

    let first = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let second = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let slow = complete(client.create_subscription(50)).await.unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(
        complete(client.active_intervals()).await.unwrap(),
        vec![(TEST_INTERVAL_MS, 2), (50, 1)]
    );

    complete(slow.delete()).await.unwrap();
    complete(first.delete()).await.unwrap();
    assert_eq!(
        complete(client.active_intervals()).await.unwrap(),
        vec![(TEST_INTERVAL_MS, 1)]
    );
}

#[tokio::test]
async fn test_subscription_delete_keeps_sibling_delivering() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let first = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let second = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut deleted = complete(first.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");
    let mut kept = complete(second.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");
    assert_eq!(harness.server().monitored_item_count(), 2);

    complete(first.delete()).await.unwrap();
    assert_eq!(harness.server().monitored_item_count(), 1);
    assert_eq!(recv_within(OPERATION_TIMEOUT, deleted.recv()).await, Some(None));

    complete(node.write_value(Value::Double(7.0), None))
        .await
        .unwrap();
    assert_double(&next_change(&mut kept).await.value, 7.0, 1e-9);
}

#[tokio::test]
async fn test_subscription_deleted_rejects_monitors() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();

    complete(subscription.delete()).await.unwrap();

    let result = complete(subscription.add_value_monitor(&node)).await;
    assert_error_kind(&result, ErrorKind::InvalidState);
    assert_error_kind(&complete(subscription.delete()).await, ErrorKind::InvalidState);
    assert!(complete(client.active_intervals()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subscription_requires_connection() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    complete(client.disconnect()).await.unwrap();

    let result = complete(client.create_subscription(TEST_INTERVAL_MS)).await;
    assert_error_kind(&result, ErrorKind::ConnectionError);
}

// =============================================================================
// Value Monitor Tests
// =============================================================================

#[tokio::test]
async fn test_value_monitor_one_change_per_write() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");
    assert_eq!(monitor.subscription_id(), subscription.id());
    assert_eq!(monitor.node(), node.id());

    let written = [1.5, 2.5, 3.5, 4.5];
    for value in written {
        let status = complete(node.write_value(Value::Double(value), None))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::GOOD);
    }

    for expected in written {
        let change = next_change(&mut monitor).await;
        assert_double(&change.value, expected, 1e-9);
        assert_eq!(change.status, StatusCode::GOOD);
    }
    expect_no_change(&mut monitor).await;
}

#[tokio::test]
async fn test_value_monitor_no_initial_value() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");

    expect_no_change(&mut monitor).await;
}

#[tokio::test]
async fn test_value_monitor_server_side_changes() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::NAMESPACE_ARRAY).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");

    let namespaces = Value::array(["http://opcfoundation.org/UA/", "urn:extra"]);
    assert_eq!(
        harness.server().set_value(nodes::NAMESPACE_ARRAY, namespaces.clone()),
        StatusCode::GOOD
    );

    assert_eq!(next_change(&mut monitor).await.value, namespaces);
}

#[tokio::test]
async fn test_value_monitor_rejected_by_server() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();

    for address in [nodes::ROOT, nodes::UNKNOWN] {
        let node = client.node(address).unwrap();
        let monitor = complete(subscription.add_value_monitor(&node))
            .await
            .unwrap();
        assert!(monitor.is_none(), "{address}");
    }
    assert_eq!(harness.server().monitored_item_count(), 0);

    let node = client.node(nodes::READ_WRITE).unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");
    complete(node.write_value(Value::Double(1.0), None))
        .await
        .unwrap();
    next_change(&mut monitor).await;
}

#[tokio::test]
async fn test_value_monitor_remove_keeps_queued_changes() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut removed = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");
    let mut witness = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");

    complete(node.write_value(Value::Double(9.0), None))
        .await
        .unwrap();
    // both items are drained by the same poll
    next_change(&mut witness).await;

    complete(removed.remove()).await.unwrap();
    assert_eq!(harness.server().monitored_item_count(), 1);

    let queued = removed.try_recv().expect("queued change survives removal");
    assert_double(&queued.value, 9.0, 1e-9);
    assert_eq!(recv_within(OPERATION_TIMEOUT, removed.recv()).await, Some(None));

    let result = complete(removed.remove()).await;
    assert_error_kind(&result, ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_value_monitor_survives_poll_failures() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");

    harness.server().fail_next_polls(3);
    complete(node.write_value(Value::Double(5.0), None))
        .await
        .unwrap();

    assert_double(&next_change(&mut monitor).await.value, 5.0, 1e-9);
    assert_eq!(harness.server().counters().failed_polls, 3);
    assert_eq!(client.state(), ualink_client::ClientState::Connected);
}

#[tokio::test]
async fn test_value_monitor_full_buffer_drops_changes() {
    let config = ClientConfig::builder()
        .notification_buffer(1)
        .build()
        .unwrap();
    let harness = ClientHarness::new().with_config(config);
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&node))
        .await
        .unwrap()
        .expect("monitor created");

    // queued back to back, so one poll carries all three
    for value in [1.0, 2.0, 3.0] {
        harness.server().set_value(nodes::READ_WRITE, Value::Double(value));
    }

    assert_double(&next_change(&mut monitor).await.value, 1.0, 1e-9);
    expect_no_change(&mut monitor).await;

    harness.server().set_value(nodes::READ_WRITE, Value::Double(4.0));
    assert_double(&next_change(&mut monitor).await.value, 4.0, 1e-9);
}

#[tokio::test]
async fn test_value_monitor_across_clients() {
    let harness = ClientHarness::new();
    let watcher = harness.connected_client().await;
    let writer = harness.connected_client().await;

    let watched = watcher.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(watcher.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_value_monitor(&watched))
        .await
        .unwrap()
        .expect("monitor created");

    let node = writer.node(nodes::READ_WRITE).unwrap();
    complete(node.write_value(Value::Double(11.0), None))
        .await
        .unwrap();

    assert_double(&next_change(&mut monitor).await.value, 11.0, 1e-9);
}

// =============================================================================
// Event Monitor Tests
// =============================================================================

#[tokio::test]
async fn test_event_monitor_receives_fields() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let notifier = client.node(nodes::TRIGGER_NODE).unwrap();
    let trigger = client.node(nodes::TRIGGER_VARIABLE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut monitor = complete(subscription.add_event_monitor(&notifier))
        .await
        .unwrap()
        .expect("event monitor created");

    complete(trigger.write_value(Value::Double(1.0), None))
        .await
        .unwrap();

    let event = next_event(&mut monitor).await;
    assert_eq!(
        event.fields,
        vec![
            Value::from(format!("{} written", nodes::TRIGGER_VARIABLE)),
            Value::from("TriggerNode"),
            Value::UInt16(500),
        ]
    );
}

#[tokio::test]
async fn test_event_monitor_requires_notifier() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();

    let monitor = complete(subscription.add_event_monitor(&node))
        .await
        .unwrap();
    assert!(monitor.is_none());
}

#[tokio::test]
async fn test_event_monitor_alongside_value_monitor() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let notifier = client.node(nodes::TRIGGER_NODE).unwrap();
    let trigger = client.node(nodes::TRIGGER_VARIABLE).unwrap();
    let subscription = complete(client.create_subscription(TEST_INTERVAL_MS))
        .await
        .unwrap();
    let mut events = complete(subscription.add_event_monitor(&notifier))
        .await
        .unwrap()
        .expect("event monitor created");
    let mut changes = complete(subscription.add_value_monitor(&trigger))
        .await
        .unwrap()
        .expect("value monitor created");

    complete(trigger.write_value(Value::Double(2.0), None))
        .await
        .unwrap();

    assert_double(&next_change(&mut changes).await.value, 2.0, 1e-9);
    assert_eq!(next_event(&mut events).await.fields.len(), 3);
}
