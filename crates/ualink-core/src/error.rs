// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the client engine.
//!
//! # Error Hierarchy
//!
//! ```text
//! UaError
//! ├── Address(AddressError)        - address text failed the grammar
//! ├── Codec(CodecError)            - value or wire kind not representable
//! ├── Node { status, .. }          - node or attribute invalid at the server
//! ├── Permission { status, .. }    - server denied the operation
//! ├── Protocol { status, .. }      - malformed request or response
//! ├── Connection(ConnectionError)  - transport or session not usable
//! ├── InvalidState(StateError)     - deleted subscription, stale handle, closed client
//! └── Configuration(ConfigError)   - invalid client configuration
//! ```
//!
//! Address and codec failures are raised locally before anything is sent.
//! Per-attribute node and permission failures normally travel as
//! [`StatusCode`] data inside a successful completion and only become a
//! [`UaError`] for single-result operations such as method calls.

use std::fmt;

use thiserror::Error;
use tracing::Level;

pub use crate::address::AddressError;
use crate::status::{ErrorCategory, StatusCode};
use crate::value::ValueKind;
use crate::wire::TypeTag;

// =============================================================================
// UaError
// =============================================================================

/// The main error type.
#[derive(Debug, Error)]
pub enum UaError {
    /// Malformed node address.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Conversion between value and wire representation failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The server rejected the target node or attribute.
    #[error("Node error on {context}: {status}")]
    Node {
        /// What was being accessed.
        context: String,
        /// Server status.
        status: StatusCode,
    },

    /// The server denied the operation.
    #[error("Permission denied on {context}: {status}")]
    Permission {
        /// What was being accessed.
        context: String,
        /// Server status.
        status: StatusCode,
    },

    /// Malformed request or response.
    #[error("Protocol error on {context}: {status}")]
    Protocol {
        /// What was being accessed.
        context: String,
        /// Server status.
        status: StatusCode,
    },

    /// Transport or session not usable.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Operation against a deleted, stale or closed object.
    #[error(transparent)]
    InvalidState(#[from] StateError),

    /// Invalid configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl UaError {
    /// Creates a protocol error without a server status.
    pub fn protocol(context: impl Into<String>) -> Self {
        Self::Protocol {
            context: context.into(),
            status: StatusCode::BAD_UNKNOWN_RESPONSE,
        }
    }

    /// Converts a bad status into the error matching its category.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match status.category() {
            ErrorCategory::NodeError => Self::Node { context, status },
            ErrorCategory::PermissionError => Self::Permission { context, status },
            ErrorCategory::TypeError => Self::Codec(CodecError::Rejected { status }),
            ErrorCategory::ConnectionError => {
                Self::Connection(ConnectionError::Status { context, status })
            }
            ErrorCategory::ProtocolError
            | ErrorCategory::UnspecifiedError
            | ErrorCategory::NoError => Self::Protocol { context, status },
        }
    }

    /// Returns the taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Address(_) => ErrorKind::MalformedAddress,
            Self::Codec(_) => ErrorKind::UnsupportedType,
            Self::Node { .. } => ErrorKind::NodeError,
            Self::Permission { .. } => ErrorKind::PermissionError,
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::Connection(_) => ErrorKind::ConnectionError,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns the server status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Node { status, .. }
            | Self::Permission { status, .. }
            | Self::Protocol { status, .. } => Some(*status),
            Self::Codec(CodecError::Rejected { status }) => Some(*status),
            Self::Connection(ConnectionError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Address(_) | Self::Codec(_) => ErrorSeverity::Warning,
            Self::Node { .. } | Self::Permission { .. } => ErrorSeverity::Warning,
            Self::Protocol { .. } => ErrorSeverity::Error,
            Self::Connection(e) => e.severity(),
            Self::InvalidState(_) => ErrorSeverity::Info,
            Self::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Logs this error at its severity level.
    pub fn log(&self, context: &str) {
        let kind = self.kind();
        match self.severity().to_tracing_level() {
            Level::ERROR => tracing::error!(kind = %kind, context, error = %self, "Operation failed"),
            Level::WARN => tracing::warn!(kind = %kind, context, error = %self, "Operation failed"),
            Level::INFO => tracing::info!(kind = %kind, context, error = %self, "Operation failed"),
            _ => tracing::debug!(kind = %kind, context, error = %self, "Operation failed"),
        }
    }

    /// Shorthand for [`ConnectionError::Closed`].
    pub fn connection_closed() -> Self {
        Self::Connection(ConnectionError::Closed)
    }

    /// Shorthand for [`ConnectionError::NotConnected`].
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }
}

// =============================================================================
// ErrorKind
// =============================================================================

/// Flat classification of [`UaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Address text failed the grammar.
    MalformedAddress,
    /// Codec cannot represent or parse a value or wire kind.
    UnsupportedType,
    /// Target node or attribute invalid at the server.
    NodeError,
    /// Server denied the operation.
    PermissionError,
    /// Malformed request or response.
    ProtocolError,
    /// Transport or session not usable.
    ConnectionError,
    /// Operation issued against a deleted or closed object.
    InvalidState,
    /// Invalid configuration.
    Configuration,
}

impl ErrorKind {
    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedAddress => "malformed_address",
            Self::UnsupportedType => "unsupported_type",
            Self::NodeError => "node_error",
            Self::PermissionError => "permission_error",
            Self::ProtocolError => "protocol_error",
            Self::ConnectionError => "connection_error",
            Self::InvalidState => "invalid_state",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CodecError
// =============================================================================

/// Conversion failures between [`crate::value::Value`] and wire variants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// No default wire type exists for this kind; pass an explicit tag.
    #[error("No default wire type for {kind} values; an explicit type tag is required")]
    NoDefaultType {
        /// Kind of the value.
        kind: ValueKind,
    },

    /// The value kind cannot be converted to the requested wire type.
    #[error("Cannot encode a {kind} value as {target}")]
    TypeMismatch {
        /// Kind of the value.
        kind: ValueKind,
        /// Requested wire type.
        target: TypeTag,
    },

    /// Numeric value does not fit the requested wire type.
    #[error("Value {value} is out of range for {target}")]
    OutOfRange {
        /// The rejected value.
        value: String,
        /// Requested wire type.
        target: TypeTag,
    },

    /// One element of an array failed, aborting the whole array.
    #[error("Array element {index} cannot be converted to {target}: {source}")]
    ArrayElement {
        /// Position of the failing element.
        index: usize,
        /// Element wire type.
        target: TypeTag,
        /// Underlying failure.
        #[source]
        source: Box<CodecError>,
    },

    /// Arrays of arrays are not representable.
    #[error("Nested arrays are not supported")]
    NestedArray,

    /// Payload does not form a valid value of its type.
    #[error("Invalid {target} payload: {message}")]
    InvalidPayload {
        /// Wire type being read or written.
        target: TypeTag,
        /// Details.
        message: String,
    },

    /// Binary input names a built-in type this crate does not model.
    #[error("Unknown built-in type id {type_id}")]
    UnknownTypeId {
        /// Protocol type id.
        type_id: u8,
    },

    /// Binary input ended early.
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes left.
        remaining: usize,
    },

    /// The server rejected the value's type.
    #[error("Server rejected value type: {status}")]
    Rejected {
        /// Server status.
        status: StatusCode,
    },
}

impl CodecError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(kind: ValueKind, target: TypeTag) -> Self {
        Self::TypeMismatch { kind, target }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(value: impl fmt::Display, target: TypeTag) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }

    /// Creates an invalid payload error.
    pub fn invalid_payload(target: TypeTag, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            target,
            message: message.into(),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

// =============================================================================
// ConnectionError
// =============================================================================

/// Transport or session failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    /// The client is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The connection was closed while the operation was pending.
    #[error("Connection closed")]
    Closed,

    /// Endpoint URL is unusable.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The endpoint could not be reached.
    #[error("Connection to {endpoint} failed: {reason}")]
    Unreachable {
        /// The endpoint.
        endpoint: String,
        /// Details from the backend.
        reason: String,
    },

    /// An established connection dropped.
    #[error("Connection lost: {reason}")]
    Lost {
        /// Details from the backend.
        reason: String,
    },

    /// The server reported a session or transport status.
    #[error("Connection failure on {context}: {status}")]
    Status {
        /// What was being accessed.
        context: String,
        /// Server status.
        status: StatusCode,
    },
}

impl ConnectionError {
    /// Returns `true` if reconnecting and retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Closed | Self::Unreachable { .. } | Self::Lost { .. }
        )
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed => ErrorSeverity::Warning,
            Self::InvalidEndpoint { .. } => ErrorSeverity::Error,
            Self::Unreachable { .. } | Self::Status { .. } => ErrorSeverity::Error,
            Self::Lost { .. } => ErrorSeverity::Critical,
        }
    }
}

// =============================================================================
// StateError
// =============================================================================

/// Operations against objects that are no longer usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The subscription was deleted or torn down by a disconnect.
    #[error("Subscription {id} has been deleted")]
    SubscriptionDeleted {
        /// Subscription id.
        id: u32,
    },

    /// The monitored item was removed.
    #[error("Monitored item {id} has been removed")]
    MonitorRemoved {
        /// Item id.
        id: u32,
    },

    /// The node handle refers to a disposed arena slot.
    #[error("Stale node handle {index}:{generation}")]
    StaleNode {
        /// Arena slot.
        index: u32,
        /// Generation recorded in the handle.
        generation: u32,
    },

    /// The client worker has stopped.
    #[error("Client worker has stopped")]
    WorkerStopped,
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration loading and validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field path.
        field: String,
        /// Details.
        message: String,
    },

    /// File could not be read.
    #[error("Failed to read '{path}': {message}")]
    Io {
        /// File path.
        path: String,
        /// Details.
        message: String,
    },

    /// File could not be parsed.
    #[error("Failed to parse {format} configuration: {message}")]
    Parse {
        /// Format name.
        format: &'static str,
        /// Details.
        message: String,
    },

    /// The file extension does not name a supported format.
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The extension.
        extension: String,
    },

    /// Logging could not be installed.
    #[error("Failed to initialize logging: {message}")]
    Logging {
        /// Details.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// No action required.
    Info,
    /// Action may be required.
    Warning,
    /// Action required, recoverable.
    Error,
    /// Immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

/// A Result type with [`UaError`].
pub type UaResult<T> = Result<T, UaError>;
