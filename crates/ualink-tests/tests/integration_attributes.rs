// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Attribute Integration Tests
//!
//! Integration tests for node handles against the simulated server:
//!
//! - Reads with per-attribute statuses and the attribute cache
//! - Typed writes for every wire type, single and batched
//! - Browsing, including large folders and every identifier kind
//! - Method calls
//! - Handle lifetime
//!
//! ## Test Categories
//!
//! - `test_read_*`: Attribute reads
//! - `test_write_*`: Attribute writes
//! - `test_browse_*`: Child enumeration
//! - `test_call_*`: Method calls
//! - `test_handle_*`: Node handle lifetime

use ualink_core::{
    AttributeId, AttributeMap, AttributeMask, ErrorCategory, ErrorKind, LocalizedText, NodeClass,
    NodeId, QualifiedName, StatusCode, TypeTag, Value,
};

use ualink_tests::common::{
    array_node, assert_double, assert_error_kind, complete, nodes, scalar_node,
    AttributeSetAssertions, ClientHarness, ValueFixtures,
};

// =============================================================================
// Read Tests
// =============================================================================

#[tokio::test]
async fn test_read_root_base_attributes() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let root = client.node(nodes::ROOT).unwrap();

    let attributes = complete(root.read(AttributeMask::mandatory_base()))
        .await
        .unwrap();

    assert_eq!(attributes.len(), 4);
    attributes.assert_value(AttributeId::NodeId, &Value::NodeId(NodeId::ROOT_FOLDER));
    attributes.assert_value(AttributeId::NodeClass, &Value::Int32(1));
    attributes.assert_value(
        AttributeId::BrowseName,
        &Value::QualifiedName(QualifiedName::new(0, "Root")),
    );
    attributes.assert_value(
        AttributeId::DisplayName,
        &Value::LocalizedText(LocalizedText::new("en-US", "Root")),
    );
    assert_eq!(root.node_class().unwrap(), Some(NodeClass::Object));
}

#[tokio::test]
async fn test_read_variable_attributes() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let attributes = complete(node.read(AttributeMask::mandatory_variable()))
        .await
        .unwrap();

    assert_eq!(attributes.len(), AttributeMask::mandatory_variable().len());
    for (attribute, _) in attributes.iter() {
        attributes.assert_good(attribute);
    }
    attributes.assert_value(AttributeId::Value, &Value::Double(0.0));
    attributes.assert_value(
        AttributeId::DataType,
        &Value::NodeId(NodeId::parse(nodes::DOUBLE_TYPE).unwrap()),
    );
    attributes.assert_value(AttributeId::ValueRank, &Value::Int32(-1));
    attributes.assert_value(AttributeId::AccessLevel, &Value::Byte(3));
    assert_eq!(node.node_class().unwrap(), Some(NodeClass::Variable));
}

#[tokio::test]
async fn test_read_object_lacks_value() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let folder = client.node(nodes::TEST_FOLDER).unwrap();

    let attributes = complete(folder.read(AttributeMask::mandatory_variable()))
        .await
        .unwrap();

    attributes.assert_good(AttributeId::DisplayName);
    attributes.assert_status(AttributeId::Value, StatusCode::BAD_ATTRIBUTE_ID_INVALID);
    assert_eq!(attributes.value(AttributeId::Value), None);
}

#[tokio::test]
async fn test_read_unknown_node_fails_every_attribute() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::UNKNOWN).unwrap();

    let attributes = complete(node.read(AttributeMask::mandatory_variable()))
        .await
        .unwrap();

    attributes.assert_all_failed_with(StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(
        StatusCode::BAD_NODE_ID_UNKNOWN.category(),
        ErrorCategory::NodeError
    );
}

#[tokio::test]
async fn test_read_empty_mask_sends_nothing() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let attributes = complete(node.read(AttributeMask::EMPTY)).await.unwrap();
    assert!(attributes.is_empty());
    assert_eq!(harness.server().counters().reads, 0);
}

#[tokio::test]
async fn test_read_populates_cache() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    assert_eq!(node.attribute(AttributeId::DisplayName).unwrap(), None);

    complete(node.read(AttributeMask::from(AttributeId::DisplayName)))
        .await
        .unwrap();
    complete(node.read(AttributeMask::from(AttributeId::Value)))
        .await
        .unwrap();

    let cached = node.cached_attributes().unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(
        node.attribute(AttributeId::DisplayName).unwrap(),
        Some(Value::LocalizedText(LocalizedText::new(
            "en-US",
            "TestNode.ReadWrite"
        )))
    );
    assert_eq!(
        node.attribute_status(AttributeId::Value).unwrap(),
        Some(StatusCode::GOOD)
    );
}

#[tokio::test]
async fn test_read_array_variable() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::NAMESPACE_ARRAY).unwrap();

    let attributes = complete(node.read(AttributeMask::mandatory_variable()))
        .await
        .unwrap();

    attributes.assert_value(AttributeId::ValueRank, &Value::Int32(1));
    attributes.assert_value(AttributeId::AccessLevel, &Value::Byte(1));
    let namespaces = attributes
        .value(AttributeId::Value)
        .and_then(Value::as_array)
        .expect("namespace array");
    assert_eq!(namespaces.len(), 2);
    assert_eq!(namespaces[0].as_str(), Some("http://opcfoundation.org/UA/"));
}

// =============================================================================
// Write Tests
// =============================================================================

#[tokio::test]
async fn test_write_value_and_read_back() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let status = complete(node.write_value(Value::Double(23.5), None))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::GOOD);
    assert_eq!(
        node.attribute(AttributeId::Value).unwrap(),
        Some(Value::Double(23.5))
    );

    let attributes = complete(node.read(AttributeMask::from(AttributeId::Value)))
        .await
        .unwrap();
    assert_double(attributes.value(AttributeId::Value).unwrap(), 23.5, 1e-9);
    assert_eq!(
        harness.server().value(nodes::READ_WRITE),
        Some(Value::Double(23.5))
    );
}

#[tokio::test]
async fn test_write_every_scalar_type() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;

    for tag in TypeTag::ALL {
        let address = scalar_node(tag);
        let node = client.node(&address).unwrap();
        let value = ValueFixtures::scalar(tag);

        let status = complete(node.write_value(value.clone(), Some(tag)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::GOOD, "{tag}");

        let attributes = complete(node.read(AttributeMask::from(AttributeId::Value)))
            .await
            .unwrap();
        attributes.assert_value(AttributeId::Value, &value);
    }
}

#[tokio::test]
async fn test_write_every_array_type() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;

    for tag in TypeTag::ALL {
        let address = array_node(tag);
        let node = client.node(&address).unwrap();
        let value = ValueFixtures::array(tag);

        let status = complete(node.write_value(value.clone(), Some(tag)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::GOOD, "{tag}");
        assert_eq!(harness.server().value(&address), Some(value), "{tag}");
    }
}

#[tokio::test]
async fn test_write_type_mismatch_is_reported_as_status() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let status = complete(node.write_value(Value::from("not a double"), None))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::BAD_TYPE_MISMATCH);
    assert_eq!(status.category(), ErrorCategory::TypeError);
    assert_eq!(node.attribute(AttributeId::Value).unwrap(), None);
}

#[tokio::test]
async fn test_write_read_only_value() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::NAMESPACE_ARRAY).unwrap();

    let status = complete(node.write_value(Value::array(["urn:other"]), Some(TypeTag::String)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_NOT_WRITABLE);
}

#[tokio::test]
async fn test_write_display_name_access_denied() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let status = complete(node.write(
        AttributeId::DisplayName,
        Value::from("NewDisplayName"),
        None,
    ))
    .await
    .unwrap();

    assert_eq!(status, StatusCode::BAD_USER_ACCESS_DENIED);
    assert_eq!(status.category(), ErrorCategory::PermissionError);
}

#[tokio::test]
async fn test_write_many_results_in_attribute_order() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let mut values = AttributeMap::new();
    values.insert(AttributeId::Value, Value::Double(42.0));
    values.insert(AttributeId::DisplayName, Value::from("NewDisplayName"));

    let results = complete(node.write_many(values, None)).await.unwrap();

    assert_eq!(
        results,
        vec![
            (AttributeId::DisplayName, StatusCode::BAD_USER_ACCESS_DENIED),
            (AttributeId::Value, StatusCode::GOOD),
        ]
    );
    assert_eq!(
        node.attribute(AttributeId::Value).unwrap(),
        Some(Value::Double(42.0))
    );
    assert_eq!(node.attribute(AttributeId::DisplayName).unwrap(), None);
}

#[tokio::test]
async fn test_write_encoding_error_is_synchronous() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();

    let result = node.write_value(Value::Int32(70_000), Some(TypeTag::Int16));
    assert_error_kind(&result, ErrorKind::UnsupportedType);

    let mut values = AttributeMap::new();
    values.insert(AttributeId::Value, Value::Guid(ValueFixtures::guid()));
    values.insert(AttributeId::DisplayName, Value::from("Name"));
    assert_error_kind(&node.write_many(values, None), ErrorKind::UnsupportedType);

    assert_eq!(harness.server().counters().writes, 0);
}

// =============================================================================
// Browse Tests
// =============================================================================

#[tokio::test]
async fn test_browse_root() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let root = client.node(nodes::ROOT).unwrap();

    let children = complete(root.children()).await.unwrap();

    let expected: Vec<NodeId> = [nodes::OBJECTS, nodes::TYPES, nodes::VIEWS]
        .into_iter()
        .map(|address| NodeId::parse(address).unwrap())
        .collect();
    assert_eq!(children, expected);
}

#[tokio::test]
async fn test_browse_large_folder() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let folder = client.node(nodes::LARGE_FOLDER).unwrap();

    let children = complete(folder.children()).await.unwrap();

    assert_eq!(children.len(), nodes::LARGE_FOLDER_CHILDREN);
    assert_eq!(children[0].to_text(), "ns=1;s=Large.Folder.Node0");
}

#[tokio::test]
async fn test_browse_every_identifier_kind() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;

    for (folder, child) in [
        (nodes::STRING_IDS_FOLDER, nodes::STRING_ID_CHILD),
        (nodes::GUID_IDS_FOLDER, nodes::GUID_ID_CHILD),
        (nodes::OPAQUE_IDS_FOLDER, nodes::OPAQUE_ID_CHILD),
    ] {
        let node = client.node(folder).unwrap();
        let children = complete(node.children()).await.unwrap();
        assert_eq!(children.len(), 1, "{folder}");
        assert_eq!(children[0].to_text(), child);

        let child = client.node_from_id(children[0].clone());
        let attributes = complete(child.read(AttributeMask::from(AttributeId::Value)))
            .await
            .unwrap();
        attributes.assert_value(AttributeId::Value, &Value::from("Value"));
    }
}

#[tokio::test]
async fn test_browse_unknown_node_is_node_error() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::UNKNOWN).unwrap();

    assert_error_kind(&complete(node.children()).await, ErrorKind::NodeError);
}

// =============================================================================
// Call Tests
// =============================================================================

#[tokio::test]
async fn test_call_multiply() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let folder = client.node(nodes::TEST_FOLDER).unwrap();

    let outputs = complete(folder.call(
        nodes::MULTIPLY,
        &[(Value::Double(4.0), None), (Value::Double(4.0), None)],
    ))
    .await
    .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_double(&outputs[0], 16.0, 1e-9);
}

#[tokio::test]
async fn test_call_failures() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let folder = client.node(nodes::TEST_FOLDER).unwrap();

    let missing = complete(folder.call("ns=0;s=IDoNotExist", &[])).await;
    assert_error_kind(&missing, ErrorKind::NodeError);

    let mismatched = complete(folder.call(
        nodes::MULTIPLY,
        &[(Value::from("four"), None), (Value::Double(4.0), None)],
    ))
    .await;
    assert_error_kind(&mismatched, ErrorKind::UnsupportedType);

    let too_few = complete(folder.call(nodes::MULTIPLY, &[(Value::Double(4.0), None)])).await;
    assert_error_kind(&too_few, ErrorKind::ProtocolError);

    let root = client.node(nodes::ROOT).unwrap();
    let wrong_owner = complete(root.call(
        nodes::MULTIPLY,
        &[(Value::Double(1.0), None), (Value::Double(2.0), None)],
    ))
    .await;
    assert_error_kind(&wrong_owner, ErrorKind::NodeError);
}

#[tokio::test]
async fn test_call_argument_errors_are_synchronous() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let folder = client.node(nodes::TEST_FOLDER).unwrap();

    assert_error_kind(
        &folder.call("not an address", &[]),
        ErrorKind::MalformedAddress,
    );
    assert_error_kind(
        &folder.call(nodes::MULTIPLY, &[(Value::Guid(ValueFixtures::guid()), None)]),
        ErrorKind::UnsupportedType,
    );
    assert_eq!(harness.server().counters().requests, 0);
}

// =============================================================================
// Handle Tests
// =============================================================================

#[tokio::test]
async fn test_handle_malformed_address() {
    let harness = ClientHarness::new();
    let client = harness.client();

    assert_error_kind(&client.node("ns=a;i=b"), ErrorKind::MalformedAddress);
    assert_eq!(client.node_count(), 0);
}

#[tokio::test]
async fn test_handle_stale_after_dispose() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let alias = node.clone();
    assert_eq!(client.node_count(), 1);

    node.dispose().unwrap();

    assert!(!alias.is_live());
    assert_eq!(client.node_count(), 0);
    assert_error_kind(
        &alias.read(AttributeMask::mandatory_base()),
        ErrorKind::InvalidState,
    );
    assert_error_kind(&alias.attribute(AttributeId::Value), ErrorKind::InvalidState);
    assert_error_kind(&alias.clone().dispose(), ErrorKind::InvalidState);

    let fresh = client.node(nodes::READ_WRITE).unwrap();
    assert_ne!(fresh.key(), alias.key());
    assert!(fresh.is_live());

    drop(alias);
    assert!(fresh.is_live());
    assert_eq!(client.node_count(), 1);
}

#[tokio::test]
async fn test_handle_released_when_last_clone_drops() {
    let harness = ClientHarness::new();
    let client = harness.client();

    for _ in 0..1000 {
        let node = client.node(nodes::ROOT).unwrap();
        assert!(node.is_live());
    }
    assert_eq!(client.node_count(), 0);

    let node = client.node(nodes::ROOT).unwrap();
    let alias = node.clone();
    drop(node);
    assert!(alias.is_live());
    assert_eq!(client.node_count(), 1);

    drop(alias);
    assert_eq!(client.node_count(), 0);
}

#[tokio::test]
async fn test_handle_disposed_during_read() {
    let harness = ClientHarness::new();
    let client = harness.connected_client().await;
    let node = client.node(nodes::READ_WRITE).unwrap();
    let alias = node.clone();

    let read = node.read(AttributeMask::mandatory_base());
    node.dispose().unwrap();

    let attributes = complete(read).await.unwrap();
    assert_eq!(attributes.len(), 4);
    assert!(!alias.is_live());
}
