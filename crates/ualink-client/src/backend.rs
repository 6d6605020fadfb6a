// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backend connection abstraction.
//!
//! A [`BackendConnection`] is the pluggable transport below the engine. It
//! speaks in [`WireVariant`]s and [`StatusCode`]s and knows nothing about
//! node handles, subscriptions or the client state machine. The engine owns
//! exactly one connection per client and drives it from a single worker
//! task, so implementations take `&mut self` and need no internal locking.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use ualink_core::{
    AttributeId, ConnectionError, NodeId, StatusCode, UaError, WireVariant,
};

use crate::endpoint::Endpoint;

// =============================================================================
// BackendConnection
// =============================================================================

/// Transport to one server.
///
/// # Contract
///
/// - `open` is called once per connection attempt; `close` after a
///   successful `open` when the client disconnects.
/// - Requests are answered in order. Per-item failures are reported as
///   [`StatusCode`]s inside the [`Response`], not as [`BackendError`]s.
/// - [`BackendError::ConnectionLost`] from `send_request` tears the
///   session down. Errors from `poll_notifications` are retried on the
///   next tick.
#[async_trait]
pub trait BackendConnection: Send {
    /// Short backend name, for logging.
    fn name(&self) -> &str;

    /// Establishes a session with the endpoint.
    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), BackendError>;

    /// Closes the session.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Sends one request and waits for its response.
    async fn send_request(&mut self, request: Request) -> Result<Response, BackendError>;

    /// Collects notifications queued for the given monitored items.
    ///
    /// Notifications for one item are returned in production order.
    async fn poll_notifications(
        &mut self,
        item_ids: &[u32],
    ) -> Result<Vec<Notification>, BackendError>;
}

// =============================================================================
// Requests and responses
// =============================================================================

/// What a monitored item watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    /// Changes of the Value attribute.
    DataChange,
    /// Events raised by an event notifier.
    Event,
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataChange => f.write_str("data_change"),
            Self::Event => f.write_str("event"),
        }
    }
}

/// A request to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Read attributes of one node.
    Read {
        /// Target node.
        node: NodeId,
        /// Attributes, answered in the same order.
        attributes: Vec<AttributeId>,
    },
    /// Write attributes of one node.
    Write {
        /// Target node.
        node: NodeId,
        /// Encoded values, answered in the same order.
        values: Vec<(AttributeId, WireVariant)>,
    },
    /// List the forward hierarchical references of a node.
    Browse {
        /// Target node.
        node: NodeId,
    },
    /// Invoke a method on an object.
    Call {
        /// Object the method is called on.
        object: NodeId,
        /// Method node.
        method: NodeId,
        /// Encoded input arguments.
        arguments: Vec<WireVariant>,
    },
    /// Start monitoring a node.
    CreateMonitoredItem {
        /// Client-assigned item id used in notifications.
        item_id: u32,
        /// Target node.
        node: NodeId,
        /// What to watch.
        kind: MonitorKind,
        /// Sampling interval.
        sampling_interval_ms: u32,
    },
    /// Stop monitoring.
    DeleteMonitoredItems {
        /// Items to delete.
        item_ids: Vec<u32>,
    },
}

impl Request {
    /// Short operation name, for logging.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Browse { .. } => "browse",
            Self::Call { .. } => "call",
            Self::CreateMonitoredItem { .. } => "create_monitored_item",
            Self::DeleteMonitoredItems { .. } => "delete_monitored_items",
        }
    }
}

/// A value with its status and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    /// The value, absent on bad status.
    pub value: Option<WireVariant>,
    /// Item status.
    pub status: StatusCode,
    /// When the source produced the value.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// A good value without timestamp.
    pub fn good(value: WireVariant) -> Self {
        Self {
            value: Some(value),
            status: StatusCode::GOOD,
            source_timestamp: None,
        }
    }

    /// A bad status without value.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: None,
            status,
            source_timestamp: None,
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }
}

/// A response from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// One entry per requested attribute.
    Read(Vec<DataValue>),
    /// One status per written attribute.
    Write(Vec<StatusCode>),
    /// Browse outcome.
    Browse {
        /// Operation status.
        status: StatusCode,
        /// Target nodes of the references.
        children: Vec<NodeId>,
    },
    /// Method call outcome.
    Call {
        /// Operation status.
        status: StatusCode,
        /// Encoded output arguments.
        outputs: Vec<WireVariant>,
    },
    /// Monitored item creation outcome.
    MonitoredItemCreated(StatusCode),
    /// One status per deleted item.
    MonitoredItemsDeleted(Vec<StatusCode>),
}

impl Response {
    /// Short variant name, for diagnostics.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write(_) => "write",
            Self::Browse { .. } => "browse",
            Self::Call { .. } => "call",
            Self::MonitoredItemCreated(_) => "create_monitored_item",
            Self::MonitoredItemsDeleted(_) => "delete_monitored_items",
        }
    }
}

/// A queued notification for one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Item the notification belongs to.
    pub item_id: u32,
    /// Payload.
    pub payload: NotificationPayload,
}

/// Notification payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    /// New value of a data-change item.
    DataChange(DataValue),
    /// Selected fields of an event.
    Event(Vec<WireVariant>),
}

// =============================================================================
// BackendError
// =============================================================================

/// Transport-level failures reported by a backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Credentials were rejected.
    #[error("Access denied: {reason}")]
    AccessDenied {
        /// Details.
        reason: String,
    },

    /// The endpoint could not be reached.
    #[error("Endpoint unreachable: {reason}")]
    Unreachable {
        /// Details.
        reason: String,
    },

    /// An open session dropped.
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Details.
        reason: String,
    },

    /// A request was issued without an open session.
    #[error("Backend is not open")]
    NotOpen,

    /// The exchange itself was malformed.
    #[error("Protocol failure: {message}")]
    Protocol {
        /// Details.
        message: String,
    },
}

impl BackendError {
    /// Creates an unreachable error.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }

    /// Creates a connection lost error.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns `true` if the session is gone after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. } | Self::NotOpen)
    }

    /// Converts into the engine error for an operation on `context`.
    pub fn into_ua_error(self, context: &str) -> UaError {
        match self {
            Self::AccessDenied { reason } => UaError::Permission {
                context: format!("{context}: {reason}"),
                status: StatusCode::BAD_USER_ACCESS_DENIED,
            },
            Self::Unreachable { reason } => UaError::Connection(ConnectionError::Unreachable {
                endpoint: context.to_string(),
                reason,
            }),
            Self::ConnectionLost { reason } => UaError::Connection(ConnectionError::Lost { reason }),
            Self::NotOpen => UaError::not_connected(),
            Self::Protocol { message } => UaError::protocol(format!("{context}: {message}")),
        }
    }
}
