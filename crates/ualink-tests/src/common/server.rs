// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Simulated Server
//!
//! An in-memory address space served through [`BackendConnection`].
//!
//! ## Address space
//!
//! - `ns=0`: Root, Objects, Types, Views, a few type nodes and the
//!   Server namespace array
//! - `ns=1;s=Large.Folder`: 1001 Int32 children
//! - `ns=2;s=Demo.Static.Scalar.<Type>` / `Demo.Static.Arrays.<Type>`:
//!   one typed variable per wire type; writes of another type are
//!   rejected with `BadTypeMismatch`
//! - `ns=3`: `TestNode.ReadWrite` (protected DisplayName), the Multiply
//!   method, `TriggerNode` / `TriggerVariable` and the id-kind folders
//!
//! ## Fault injection
//!
//! - [`SimulatedServer::set_reachable`]: refuse new sessions
//! - [`SimulatedServer::fail_next_polls`]: fail notification polls
//! - [`SimulatedServer::drop_sessions`]: lose every open session
//! - [`SimulatedServer::stall_requests`]: leave requests pending forever

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use ualink_client::{
    BackendConnection, BackendError, DataValue, Endpoint, MonitorKind, Notification,
    NotificationPayload, Request, Response,
};
use ualink_core::{
    AttributeId, NodeClass, NodeId, StatusCode, TypeTag, Value, ValueCodec, WireScalar,
    WireVariant, EVENT_NOTIFIER_SUBSCRIBE,
};

use super::fixtures::{nodes, EndpointFixtures};

type MethodFn = fn(&[WireVariant]) -> Result<Vec<WireVariant>, StatusCode>;

// =============================================================================
// Nodes
// =============================================================================

struct Variable {
    data_type: TypeTag,
    is_array: bool,
    value: WireVariant,
    writable: bool,
    source_timestamp: DateTime<Utc>,
}

impl Variable {
    fn accepts(&self, wire: &WireVariant) -> bool {
        match wire {
            WireVariant::Scalar(scalar) => !self.is_array && scalar.type_tag() == self.data_type,
            WireVariant::Array { element_type, .. } => {
                self.is_array && *element_type == self.data_type
            }
            WireVariant::Empty | WireVariant::Unknown { .. } => false,
        }
    }

    fn read(&self, attribute: AttributeId) -> DataValue {
        let scalar = |s: WireScalar| DataValue::good(WireVariant::Scalar(s));
        match attribute {
            AttributeId::Value => {
                DataValue::good(self.value.clone()).with_source_timestamp(self.source_timestamp)
            }
            AttributeId::DataType => scalar(WireScalar::NodeId(NodeId::numeric(
                0,
                u32::from(self.data_type.id()),
            ))),
            AttributeId::ValueRank => scalar(WireScalar::Int32(if self.is_array { 1 } else { -1 })),
            AttributeId::ArrayDimensions if self.is_array => DataValue::good(WireVariant::Array {
                element_type: TypeTag::UInt32,
                elements: vec![WireScalar::UInt32(0)],
            }),
            AttributeId::AccessLevel | AttributeId::UserAccessLevel => {
                scalar(WireScalar::Byte(if self.writable { 0x03 } else { 0x01 }))
            }
            AttributeId::MinimumSamplingInterval => scalar(WireScalar::Double(0.0)),
            AttributeId::Historizing => scalar(WireScalar::Boolean(false)),
            _ => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }
}

struct SimNode {
    class: NodeClass,
    browse_name: String,
    display_name: String,
    display_name_protected: bool,
    event_notifier: u8,
    children: Vec<NodeId>,
    variable: Option<Variable>,
    method: Option<MethodFn>,
    raises_event_on: Option<NodeId>,
}

impl SimNode {
    fn object(name: &str) -> Self {
        Self {
            class: NodeClass::Object,
            browse_name: name.to_string(),
            display_name: name.to_string(),
            display_name_protected: false,
            event_notifier: 0,
            children: Vec::new(),
            variable: None,
            method: None,
            raises_event_on: None,
        }
    }

    fn variable(name: &str, data_type: TypeTag, value: WireVariant) -> Self {
        let is_array = value.is_array();
        Self {
            class: NodeClass::Variable,
            variable: Some(Variable {
                data_type,
                is_array,
                value,
                writable: true,
                source_timestamp: Utc::now(),
            }),
            ..Self::object(name)
        }
    }

    fn method(name: &str, method: MethodFn) -> Self {
        Self {
            class: NodeClass::Method,
            method: Some(method),
            ..Self::object(name)
        }
    }

    fn with_class(mut self, class: NodeClass) -> Self {
        self.class = class;
        self
    }

    fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    fn with_event_notifier(mut self, notifier: u8) -> Self {
        self.event_notifier = notifier;
        self
    }

    fn protect_display_name(mut self) -> Self {
        self.display_name_protected = true;
        self
    }

    fn read_only(mut self) -> Self {
        if let Some(variable) = self.variable.as_mut() {
            variable.writable = false;
        }
        self
    }

    fn raising_event_on(mut self, notifier: NodeId) -> Self {
        self.raises_event_on = Some(notifier);
        self
    }

    fn read(&self, id: &NodeId, attribute: AttributeId) -> DataValue {
        let scalar = |s: WireScalar| DataValue::good(WireVariant::Scalar(s));
        match attribute {
            AttributeId::NodeId => scalar(WireScalar::NodeId(id.clone())),
            AttributeId::NodeClass => scalar(WireScalar::Int32(self.class as i32)),
            AttributeId::BrowseName => scalar(WireScalar::QualifiedName {
                namespace_index: id.namespace_index,
                name: self.browse_name.clone(),
            }),
            AttributeId::DisplayName => scalar(WireScalar::LocalizedText {
                locale: "en-US".to_string(),
                text: self.display_name.clone(),
            }),
            AttributeId::Description => scalar(WireScalar::LocalizedText {
                locale: String::new(),
                text: String::new(),
            }),
            AttributeId::WriteMask | AttributeId::UserWriteMask => scalar(WireScalar::UInt32(0)),
            AttributeId::EventNotifier if self.class == NodeClass::Object => {
                scalar(WireScalar::Byte(self.event_notifier))
            }
            AttributeId::Executable | AttributeId::UserExecutable
                if self.class == NodeClass::Method =>
            {
                scalar(WireScalar::Boolean(true))
            }
            AttributeId::IsAbstract
                if matches!(
                    self.class,
                    NodeClass::ObjectType | NodeClass::VariableType | NodeClass::DataType
                ) =>
            {
                scalar(WireScalar::Boolean(false))
            }
            _ => match &self.variable {
                Some(variable) => variable.read(attribute),
                None => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
        }
    }
}

fn multiply(arguments: &[WireVariant]) -> Result<Vec<WireVariant>, StatusCode> {
    match arguments {
        [WireVariant::Scalar(WireScalar::Double(a)), WireVariant::Scalar(WireScalar::Double(b))] => {
            Ok(vec![WireVariant::Scalar(WireScalar::Double(a * b))])
        }
        [_, _] => Err(StatusCode::BAD_TYPE_MISMATCH),
        _ => Err(StatusCode::BAD_ARGUMENTS_MISSING),
    }
}

fn default_scalar(tag: TypeTag) -> WireScalar {
    match tag {
        TypeTag::Boolean => WireScalar::Boolean(false),
        TypeTag::SByte => WireScalar::SByte(0),
        TypeTag::Byte => WireScalar::Byte(0),
        TypeTag::Int16 => WireScalar::Int16(0),
        TypeTag::UInt16 => WireScalar::UInt16(0),
        TypeTag::Int32 => WireScalar::Int32(0),
        TypeTag::UInt32 => WireScalar::UInt32(0),
        TypeTag::Int64 => WireScalar::Int64(0),
        TypeTag::UInt64 => WireScalar::UInt64(0),
        TypeTag::Float => WireScalar::Float(0.0),
        TypeTag::Double => WireScalar::Double(0.0),
        TypeTag::String => WireScalar::String(String::new()),
        TypeTag::DateTime => WireScalar::DateTime(0),
        TypeTag::Guid => WireScalar::Guid(Uuid::nil()),
        TypeTag::ByteString => WireScalar::ByteString(Vec::new()),
        TypeTag::XmlElement => WireScalar::XmlElement(String::new()),
        TypeTag::NodeId => WireScalar::NodeId(NodeId::NULL),
        TypeTag::StatusCode => WireScalar::StatusCode(0),
        TypeTag::QualifiedName => WireScalar::QualifiedName {
            namespace_index: 0,
            name: String::new(),
        },
        TypeTag::LocalizedText => WireScalar::LocalizedText {
            locale: String::new(),
            text: String::new(),
        },
    }
}

fn address(text: &str) -> NodeId {
    NodeId::parse(text).expect("fixture address must parse")
}

// =============================================================================
// Address space
// =============================================================================

#[derive(Default)]
struct AddressSpace {
    nodes: HashMap<NodeId, SimNode>,
}

impl AddressSpace {
    fn insert(&mut self, id: NodeId, node: SimNode) {
        self.nodes.insert(id, node);
    }

    fn add_child(&mut self, parent: &NodeId, id: NodeId, node: SimNode) {
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id.clone());
        }
        self.insert(id, node);
    }

    fn demo() -> Self {
        let mut space = Self::default();

        let root = NodeId::ROOT_FOLDER;
        let objects = NodeId::OBJECTS_FOLDER;
        let types = address(nodes::TYPES);
        space.insert(root.clone(), SimNode::object("Root"));
        space.add_child(&root, objects.clone(), SimNode::object("Objects"));
        space.add_child(&root, types.clone(), SimNode::object("Types"));
        space.add_child(&root, address(nodes::VIEWS), SimNode::object("Views"));
        space.add_child(
            &types,
            address(nodes::FOLDER_TYPE),
            SimNode::object("FolderType").with_class(NodeClass::ObjectType),
        );
        space.add_child(
            &types,
            address(nodes::PROPERTY_TYPE),
            SimNode::object("PropertyType").with_class(NodeClass::VariableType),
        );
        space.add_child(
            &types,
            address(nodes::DOUBLE_TYPE),
            SimNode::object("Double").with_class(NodeClass::DataType),
        );

        let server = NodeId::numeric(0, 2253);
        space.add_child(&objects, server.clone(), SimNode::object("Server"));
        space.add_child(
            &server,
            address(nodes::NAMESPACE_ARRAY),
            SimNode::variable(
                "NamespaceArray",
                TypeTag::String,
                WireVariant::Array {
                    element_type: TypeTag::String,
                    elements: vec![
                        WireScalar::String("http://opcfoundation.org/UA/".into()),
                        WireScalar::String("urn:ualink:simulated".into()),
                    ],
                },
            )
            .read_only(),
        );

        // ns=3 test nodes
        let test_folder = address(nodes::TEST_FOLDER);
        space.add_child(&objects, test_folder.clone(), SimNode::object("TestFolder"));
        space.add_child(
            &test_folder,
            address(nodes::MULTIPLY),
            SimNode::method("Multiply", multiply),
        );
        space.add_child(
            &objects,
            address(nodes::READ_WRITE),
            SimNode::variable(
                "TestNode.ReadWrite",
                TypeTag::Double,
                WireVariant::Scalar(WireScalar::Double(0.0)),
            )
            .protect_display_name(),
        );
        let trigger = address(nodes::TRIGGER_NODE);
        space.add_child(
            &objects,
            trigger.clone(),
            SimNode::object("TriggerNode").with_event_notifier(EVENT_NOTIFIER_SUBSCRIBE),
        );
        space.add_child(
            &objects,
            address(nodes::TRIGGER_VARIABLE),
            SimNode::variable(
                "TriggerVariable",
                TypeTag::Double,
                WireVariant::Scalar(WireScalar::Double(0.0)),
            )
            .raising_event_on(trigger),
        );

        // typed demo variables
        let scalars = NodeId::string(2, "Demo.Static.Scalar");
        let arrays = NodeId::string(2, "Demo.Static.Arrays");
        space.add_child(&objects, scalars.clone(), SimNode::object("Scalar"));
        space.add_child(&objects, arrays.clone(), SimNode::object("Arrays"));
        for tag in TypeTag::ALL {
            space.add_child(
                &scalars,
                NodeId::string(2, format!("Demo.Static.Scalar.{}", tag.name())),
                SimNode::variable(tag.name(), tag, WireVariant::Scalar(default_scalar(tag))),
            );
            space.add_child(
                &arrays,
                NodeId::string(2, format!("Demo.Static.Arrays.{}", tag.name())),
                SimNode::variable(
                    tag.name(),
                    tag,
                    WireVariant::Array {
                        element_type: tag,
                        elements: Vec::new(),
                    },
                ),
            );
        }

        let large = address(nodes::LARGE_FOLDER);
        space.add_child(
            &objects,
            large.clone(),
            SimNode::object("Large.Folder").with_display_name("Large_Folder"),
        );
        for index in 0..nodes::LARGE_FOLDER_CHILDREN {
            let value = i32::try_from(index).unwrap_or(i32::MAX);
            space.add_child(
                &large,
                NodeId::string(1, format!("Large.Folder.Node{index}")),
                SimNode::variable(
                    &format!("Node{index}"),
                    TypeTag::Int32,
                    WireVariant::Scalar(WireScalar::Int32(value)),
                ),
            );
        }

        for (folder, child, name) in [
            (nodes::STRING_IDS_FOLDER, nodes::STRING_ID_CHILD, "theStringId"),
            (nodes::GUID_IDS_FOLDER, nodes::GUID_ID_CHILD, "theGuidId"),
            (nodes::OPAQUE_IDS_FOLDER, nodes::OPAQUE_ID_CHILD, "theOpaqueId"),
        ] {
            let folder = address(folder);
            space.add_child(&objects, folder.clone(), SimNode::object(name));
            space.add_child(
                &folder,
                address(child),
                SimNode::variable(
                    name,
                    TypeTag::String,
                    WireVariant::Scalar(WireScalar::String("Value".into())),
                ),
            );
        }

        space
    }
}

// =============================================================================
// Server state
// =============================================================================

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerCounters {
    /// Session open attempts.
    pub opens: u64,
    /// Session closes.
    pub closes: u64,
    /// Requests received, including stalled ones.
    pub requests: u64,
    /// Read requests answered.
    pub reads: u64,
    /// Write requests answered.
    pub writes: u64,
    /// Notification polls.
    pub polls: u64,
    /// Polls failed by injection.
    pub failed_polls: u64,
}

struct MonitorEntry {
    node: NodeId,
    kind: MonitorKind,
    queue: VecDeque<NotificationPayload>,
}

struct ServerState {
    space: AddressSpace,
    users: HashMap<String, String>,
    allow_anonymous: bool,
    reachable: bool,
    stall_requests: bool,
    poll_failures: u32,
    next_session: u64,
    sessions: HashSet<u64>,
    monitors: BTreeMap<(u64, u32), MonitorEntry>,
    counters: ServerCounters,
}

impl ServerState {
    fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(
            EndpointFixtures::USERNAME.to_string(),
            EndpointFixtures::PASSWORD.to_string(),
        );
        Self {
            space: AddressSpace::demo(),
            users,
            allow_anonymous: true,
            reachable: true,
            stall_requests: false,
            poll_failures: 0,
            next_session: 1,
            sessions: HashSet::new(),
            monitors: BTreeMap::new(),
            counters: ServerCounters::default(),
        }
    }

    fn close_session(&mut self, session: u64) {
        self.sessions.remove(&session);
        self.monitors.retain(|(owner, _), _| *owner != session);
    }

    fn handle(&mut self, session: u64, request: Request) -> Response {
        match request {
            Request::Read { node, attributes } => {
                self.counters.reads += 1;
                let results = match self.space.nodes.get(&node) {
                    Some(sim) => attributes
                        .into_iter()
                        .map(|attribute| sim.read(&node, attribute))
                        .collect(),
                    None => attributes
                        .iter()
                        .map(|_| DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN))
                        .collect(),
                };
                Response::Read(results)
            }
            Request::Write { node, values } => {
                self.counters.writes += 1;
                Response::Write(
                    values
                        .into_iter()
                        .map(|(attribute, wire)| self.write(&node, attribute, wire, false))
                        .collect(),
                )
            }
            Request::Browse { node } => match self.space.nodes.get(&node) {
                Some(sim) => Response::Browse {
                    status: StatusCode::GOOD,
                    children: sim.children.clone(),
                },
                None => Response::Browse {
                    status: StatusCode::BAD_NODE_ID_UNKNOWN,
                    children: Vec::new(),
                },
            },
            Request::Call {
                object,
                method,
                arguments,
            } => self.call(&object, &method, &arguments),
            Request::CreateMonitoredItem {
                item_id, node, kind, ..
            } => {
                let status = match self.space.nodes.get(&node) {
                    None => StatusCode::BAD_NODE_ID_UNKNOWN,
                    Some(sim) => match kind {
                        MonitorKind::DataChange if sim.variable.is_none() => {
                            StatusCode::BAD_ATTRIBUTE_ID_INVALID
                        }
                        MonitorKind::Event
                            if sim.event_notifier & EVENT_NOTIFIER_SUBSCRIBE == 0 =>
                        {
                            StatusCode::BAD_FILTER_NOT_ALLOWED
                        }
                        _ => StatusCode::GOOD,
                    },
                };
                if status.is_good() {
                    self.monitors.insert(
                        (session, item_id),
                        MonitorEntry {
                            node,
                            kind,
                            queue: VecDeque::new(),
                        },
                    );
                }
                Response::MonitoredItemCreated(status)
            }
            Request::DeleteMonitoredItems { item_ids } => Response::MonitoredItemsDeleted(
                item_ids
                    .into_iter()
                    .map(|item_id| match self.monitors.remove(&(session, item_id)) {
                        Some(_) => StatusCode::GOOD,
                        None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
                    })
                    .collect(),
            ),
        }
    }

    fn call(&self, object: &NodeId, method: &NodeId, arguments: &[WireVariant]) -> Response {
        let failed = |status| Response::Call {
            status,
            outputs: Vec::new(),
        };
        let Some(owner) = self.space.nodes.get(object) else {
            return failed(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        let implementation = self
            .space
            .nodes
            .get(method)
            .and_then(|node| node.method)
            .filter(|_| owner.children.contains(method));
        match implementation.map(|run| run(arguments)) {
            Some(Ok(outputs)) => Response::Call {
                status: StatusCode::GOOD,
                outputs,
            },
            Some(Err(status)) => failed(status),
            None => failed(StatusCode::BAD_METHOD_INVALID),
        }
    }

    /// Applies one attribute write; `privileged` bypasses access checks.
    fn write(
        &mut self,
        id: &NodeId,
        attribute: AttributeId,
        wire: WireVariant,
        privileged: bool,
    ) -> StatusCode {
        let Some(node) = self.space.nodes.get_mut(id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        match attribute {
            AttributeId::Value => {
                let Some(variable) = node.variable.as_mut() else {
                    return StatusCode::BAD_ATTRIBUTE_ID_INVALID;
                };
                if !variable.writable && !privileged {
                    return StatusCode::BAD_NOT_WRITABLE;
                }
                if !variable.accepts(&wire) {
                    return StatusCode::BAD_TYPE_MISMATCH;
                }
                let now = Utc::now();
                variable.value = wire.clone();
                variable.source_timestamp = now;
                let notifier = node.raises_event_on.clone();

                self.queue_data_change(id, DataValue::good(wire).with_source_timestamp(now));
                if let Some(notifier) = notifier {
                    self.raise_event(
                        &notifier,
                        vec![
                            WireVariant::Scalar(WireScalar::String(format!("{id} written"))),
                            WireVariant::Scalar(WireScalar::String("TriggerNode".into())),
                            WireVariant::Scalar(WireScalar::UInt16(500)),
                        ],
                    );
                }
                StatusCode::GOOD
            }
            AttributeId::DisplayName => {
                if node.display_name_protected && !privileged {
                    return StatusCode::BAD_USER_ACCESS_DENIED;
                }
                match wire {
                    WireVariant::Scalar(WireScalar::LocalizedText { text, .. }) => {
                        node.display_name = text;
                        StatusCode::GOOD
                    }
                    _ => StatusCode::BAD_TYPE_MISMATCH,
                }
            }
            _ => StatusCode::BAD_NOT_WRITABLE,
        }
    }

    fn queue_data_change(&mut self, node: &NodeId, data: DataValue) {
        for entry in self
            .monitors
            .values_mut()
            .filter(|entry| entry.kind == MonitorKind::DataChange && entry.node == *node)
        {
            entry
                .queue
                .push_back(NotificationPayload::DataChange(data.clone()));
        }
    }

    fn raise_event(&mut self, notifier: &NodeId, fields: Vec<WireVariant>) {
        for entry in self
            .monitors
            .values_mut()
            .filter(|entry| entry.kind == MonitorKind::Event && entry.node == *notifier)
        {
            entry
                .queue
                .push_back(NotificationPayload::Event(fields.clone()));
        }
    }
}

fn check_session(session: Option<u64>, state: &ServerState) -> Result<u64, BackendError> {
    let session = session.ok_or(BackendError::NotOpen)?;
    if state.sessions.contains(&session) {
        Ok(session)
    } else {
        Err(BackendError::connection_lost("session dropped by server"))
    }
}

// =============================================================================
// SimulatedServer
// =============================================================================

/// Shared in-memory server; cheap to clone.
#[derive(Clone)]
pub struct SimulatedServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for SimulatedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedServer {
    /// Creates a server with the demo address space. Anonymous sessions
    /// and `user1` / `password` are accepted.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState::new())),
        }
    }

    /// A new, unopened connection to this server.
    pub fn connection(&self) -> SimulatedConnection {
        SimulatedConnection {
            state: Arc::clone(&self.state),
            session: None,
        }
    }

    /// Adds or replaces a user.
    pub fn add_user(&self, username: &str, password: &str) {
        self.state
            .lock()
            .users
            .insert(username.to_string(), password.to_string());
    }

    /// Enables or disables anonymous sessions.
    pub fn set_anonymous_allowed(&self, allowed: bool) {
        self.state.lock().allow_anonymous = allowed;
    }

    /// Makes new session attempts fail as unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// Fails the next `count` notification polls.
    pub fn fail_next_polls(&self, count: u32) {
        self.state.lock().poll_failures = count;
    }

    /// Leaves every request pending until disabled.
    pub fn stall_requests(&self, stall: bool) {
        self.state.lock().stall_requests = stall;
    }

    /// Drops every open session; their connections report a lost
    /// connection on the next request.
    pub fn drop_sessions(&self) {
        let mut state = self.state.lock();
        state.sessions.clear();
        state.monitors.clear();
    }

    /// Current value of a variable, decoded.
    pub fn value(&self, address: &str) -> Option<Value> {
        let state = self.state.lock();
        let variable = state.space.nodes.get(&NodeId::parse(address).ok()?)?.variable.as_ref()?;
        ValueCodec::decode(&variable.value).ok()
    }

    /// Changes a variable from the server side, notifying monitors.
    pub fn set_value(&self, address: &str, value: Value) -> StatusCode {
        let Ok(id) = NodeId::parse(address) else {
            return StatusCode::BAD_NODE_ID_INVALID;
        };
        let mut state = self.state.lock();
        let data_type = match state.space.nodes.get(&id).and_then(|n| n.variable.as_ref()) {
            Some(variable) => variable.data_type,
            None => return StatusCode::BAD_NODE_ID_UNKNOWN,
        };
        match ValueCodec::encode(&value, Some(data_type)) {
            Ok(wire) => state.write(&id, AttributeId::Value, wire, true),
            Err(_) => StatusCode::BAD_TYPE_MISMATCH,
        }
    }

    /// Open sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Monitored items across all sessions.
    pub fn monitored_item_count(&self) -> usize {
        self.state.lock().monitors.len()
    }

    /// Snapshot of the counters.
    pub fn counters(&self) -> ServerCounters {
        self.state.lock().counters
    }
}

// =============================================================================
// SimulatedConnection
// =============================================================================

/// One client's connection to a [`SimulatedServer`].
pub struct SimulatedConnection {
    state: Arc<Mutex<ServerState>>,
    session: Option<u64>,
}

#[async_trait]
impl BackendConnection for SimulatedConnection {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.counters.opens += 1;
        if !state.reachable {
            return Err(BackendError::unreachable(format!(
                "{endpoint} refused the connection"
            )));
        }
        match endpoint.credentials() {
            None if state.allow_anonymous => {}
            None => {
                return Err(BackendError::AccessDenied {
                    reason: "anonymous sessions are disabled".into(),
                })
            }
            Some(credentials)
                if state.users.get(&credentials.username) == Some(&credentials.password) => {}
            Some(credentials) => {
                return Err(BackendError::AccessDenied {
                    reason: format!("user {} rejected", credentials.username),
                })
            }
        }

        let session = state.next_session;
        state.next_session += 1;
        state.sessions.insert(session);
        self.session = Some(session);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.counters.closes += 1;
        if let Some(session) = self.session.take() {
            state.close_session(session);
        }
        Ok(())
    }

    async fn send_request(&mut self, request: Request) -> Result<Response, BackendError> {
        let stalled = {
            let mut state = self.state.lock();
            state.counters.requests += 1;
            state.stall_requests
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut state = self.state.lock();
        let session = check_session(self.session, &state)?;
        Ok(state.handle(session, request))
    }

    async fn poll_notifications(
        &mut self,
        item_ids: &[u32],
    ) -> Result<Vec<Notification>, BackendError> {
        let mut state = self.state.lock();
        state.counters.polls += 1;
        if state.poll_failures > 0 {
            state.poll_failures -= 1;
            state.counters.failed_polls += 1;
            return Err(BackendError::unreachable("injected poll failure"));
        }

        let session = check_session(self.session, &state)?;
        let mut notifications = Vec::new();
        for item_id in item_ids {
            if let Some(entry) = state.monitors.get_mut(&(session, *item_id)) {
                notifications.extend(entry.queue.drain(..).map(|payload| Notification {
                    item_id: *item_id,
                    payload,
                }));
            }
        }
        Ok(notifications)
    }
}
