// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol status codes and their consumer-facing categories.
//!
//! Every status code maps to exactly one [`ErrorCategory`] and to a
//! success flag. The severity lives in the two top bits of the code:
//! `00` good, `01` uncertain, `10` bad.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// ErrorCategory
// =============================================================================

/// Coarse classification of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The code is a success code.
    NoError,
    /// Unknown or invalid node or attribute.
    NodeError,
    /// The server denied the operation.
    PermissionError,
    /// Malformed request or response.
    ProtocolError,
    /// Unsupported conversion.
    TypeError,
    /// Transport or session failure.
    ConnectionError,
    /// Not classified by the table.
    UnspecifiedError,
}

impl ErrorCategory {
    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "no_error",
            Self::NodeError => "node_error",
            Self::PermissionError => "permission_error",
            Self::ProtocolError => "protocol_error",
            Self::TypeError => "type_error",
            Self::ConnectionError => "connection_error",
            Self::UnspecifiedError => "unspecified_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// A protocol-defined 32-bit outcome code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

macro_rules! status_codes {
    ($( $name:ident = $code:expr, $category:ident; )*) => {
        impl StatusCode {
            $(
                #[doc = concat!("`", stringify!($name), "`")]
                pub const $name: StatusCode = StatusCode($code);
            )*
        }

        /// Known codes with their symbolic name and category.
        static STATUS_TABLE: &[(u32, &str, ErrorCategory)] = &[
            $( ($code, stringify!($name), ErrorCategory::$category), )*
        ];
    };
}

status_codes! {
    GOOD = 0x0000_0000, NoError;
    UNCERTAIN = 0x4000_0000, UnspecifiedError;
    BAD = 0x8000_0000, UnspecifiedError;
    BAD_UNEXPECTED_ERROR = 0x8001_0000, UnspecifiedError;
    BAD_INTERNAL_ERROR = 0x8002_0000, UnspecifiedError;
    BAD_OUT_OF_MEMORY = 0x8003_0000, UnspecifiedError;
    BAD_RESOURCE_UNAVAILABLE = 0x8004_0000, UnspecifiedError;
    BAD_COMMUNICATION_ERROR = 0x8005_0000, ConnectionError;
    BAD_ENCODING_ERROR = 0x8006_0000, ProtocolError;
    BAD_DECODING_ERROR = 0x8007_0000, ProtocolError;
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000, ProtocolError;
    BAD_UNKNOWN_RESPONSE = 0x8009_0000, ProtocolError;
    BAD_TIMEOUT = 0x800A_0000, ConnectionError;
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000, ProtocolError;
    BAD_SHUTDOWN = 0x800C_0000, ConnectionError;
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000, ConnectionError;
    BAD_SERVER_HALTED = 0x800E_0000, ConnectionError;
    BAD_NOTHING_TO_DO = 0x800F_0000, ProtocolError;
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000, ProtocolError;
    BAD_DATA_TYPE_ID_UNKNOWN = 0x8011_0000, TypeError;
    BAD_CERTIFICATE_INVALID = 0x8012_0000, PermissionError;
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000, PermissionError;
    BAD_USER_ACCESS_DENIED = 0x801F_0000, PermissionError;
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000, PermissionError;
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000, PermissionError;
    BAD_SECURE_CHANNEL_ID_INVALID = 0x8022_0000, ConnectionError;
    BAD_SESSION_ID_INVALID = 0x8025_0000, ConnectionError;
    BAD_SESSION_CLOSED = 0x8026_0000, ConnectionError;
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000, ConnectionError;
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000, NodeError;
    BAD_REQUEST_HEADER_INVALID = 0x802A_0000, ProtocolError;
    BAD_NO_COMMUNICATION = 0x8031_0000, ConnectionError;
    BAD_WAITING_FOR_INITIAL_DATA = 0x8032_0000, UnspecifiedError;
    BAD_NODE_ID_INVALID = 0x8033_0000, NodeError;
    BAD_NODE_ID_UNKNOWN = 0x8034_0000, NodeError;
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000, NodeError;
    BAD_INDEX_RANGE_INVALID = 0x8036_0000, NodeError;
    BAD_INDEX_RANGE_NO_DATA = 0x8037_0000, NodeError;
    BAD_DATA_ENCODING_INVALID = 0x8038_0000, TypeError;
    BAD_DATA_ENCODING_UNSUPPORTED = 0x8039_0000, TypeError;
    BAD_NOT_READABLE = 0x803A_0000, PermissionError;
    BAD_NOT_WRITABLE = 0x803B_0000, PermissionError;
    BAD_OUT_OF_RANGE = 0x803C_0000, TypeError;
    BAD_NOT_SUPPORTED = 0x803D_0000, ProtocolError;
    BAD_NOT_FOUND = 0x803E_0000, NodeError;
    BAD_OBJECT_DELETED = 0x803F_0000, NodeError;
    BAD_NOT_IMPLEMENTED = 0x8040_0000, ProtocolError;
    BAD_MONITORING_MODE_INVALID = 0x8041_0000, ProtocolError;
    BAD_MONITORED_ITEM_ID_INVALID = 0x8042_0000, NodeError;
    BAD_MONITORED_ITEM_FILTER_INVALID = 0x8043_0000, ProtocolError;
    BAD_MONITORED_ITEM_FILTER_UNSUPPORTED = 0x8044_0000, ProtocolError;
    BAD_FILTER_NOT_ALLOWED = 0x8045_0000, ProtocolError;
    BAD_METHOD_INVALID = 0x8075_0000, NodeError;
    BAD_ARGUMENTS_MISSING = 0x8076_0000, ProtocolError;
    BAD_TYPE_MISMATCH = 0x8074_0000, TypeError;
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000, ConnectionError;
    BAD_INVALID_ARGUMENT = 0x80AB_0000, ProtocolError;
    BAD_CONNECTION_REJECTED = 0x80AC_0000, ConnectionError;
    BAD_DISCONNECT = 0x80AD_0000, ConnectionError;
    BAD_CONNECTION_CLOSED = 0x80AE_0000, ConnectionError;
    BAD_INVALID_STATE = 0x80AF_0000, ProtocolError;
}

impl StatusCode {
    const SEVERITY_MASK: u32 = 0xC000_0000;
    const CODE_MASK: u32 = 0xFFFF_0000;

    /// Returns the raw code.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Severity bits are `00`.
    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0
    }

    /// Severity bits are `01`.
    #[inline]
    pub const fn is_uncertain(self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0x4000_0000
    }

    /// Severity bit for bad is set.
    #[inline]
    pub const fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Whether the operation succeeded, independent of category.
    #[inline]
    pub const fn is_success(self) -> bool {
        self.is_good()
    }

    fn lookup(self) -> Option<&'static (u32, &'static str, ErrorCategory)> {
        // Info bits (the low 16) do not change the identity of a code.
        let code = self.0 & Self::CODE_MASK;
        STATUS_TABLE.iter().find(|(c, _, _)| *c == code)
    }

    /// Returns the category this code belongs to.
    ///
    /// Success codes are [`ErrorCategory::NoError`]; bad or uncertain codes
    /// missing from the table are [`ErrorCategory::UnspecifiedError`].
    pub fn category(self) -> ErrorCategory {
        if self.is_good() {
            return ErrorCategory::NoError;
        }
        self.lookup()
            .map(|(_, _, category)| *category)
            .unwrap_or(ErrorCategory::UnspecifiedError)
    }

    /// Returns the symbolic name, or `None` for codes missing from the table.
    pub fn name(self) -> Option<&'static str> {
        self.lookup().map(|(_, name, _)| *name)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_flags() {
        assert!(StatusCode::GOOD.is_success());
        assert!(!StatusCode::UNCERTAIN.is_success());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(!StatusCode::BAD_NODE_ID_UNKNOWN.is_success());
        assert!(StatusCode::BAD_NODE_ID_UNKNOWN.is_bad());
    }

    #[test]
    fn test_categories() {
        assert_eq!(StatusCode::GOOD.category(), ErrorCategory::NoError);
        assert_eq!(StatusCode::BAD_NODE_ID_UNKNOWN.category(), ErrorCategory::NodeError);
        assert_eq!(StatusCode::BAD_ATTRIBUTE_ID_INVALID.category(), ErrorCategory::NodeError);
        assert_eq!(StatusCode::BAD_USER_ACCESS_DENIED.category(), ErrorCategory::PermissionError);
        assert_eq!(StatusCode::BAD_NOT_WRITABLE.category(), ErrorCategory::PermissionError);
        assert_eq!(StatusCode::BAD_DECODING_ERROR.category(), ErrorCategory::ProtocolError);
        assert_eq!(StatusCode::BAD_TYPE_MISMATCH.category(), ErrorCategory::TypeError);
        assert_eq!(StatusCode::BAD_CONNECTION_CLOSED.category(), ErrorCategory::ConnectionError);
        assert_eq!(StatusCode(0x80FF_0000).category(), ErrorCategory::UnspecifiedError);
    }

    #[test]
    fn test_every_table_entry_has_one_category() {
        for (code, name, category) in STATUS_TABLE {
            let status = StatusCode(*code);
            assert_eq!(status.category() == ErrorCategory::NoError, status.is_success(), "{}", name);
            if !status.is_success() {
                assert_eq!(status.category(), *category, "{}", name);
            }
        }
    }

    #[test]
    fn test_info_bits_ignored_for_lookup() {
        let status = StatusCode(0x8034_0400);
        assert_eq!(status.name(), Some("BAD_NODE_ID_UNKNOWN"));
        assert_eq!(status.category(), ErrorCategory::NodeError);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::GOOD.to_string(), "GOOD (0x00000000)");
        assert_eq!(StatusCode(0x8123_0000).to_string(), "0x81230000");
    }
}
