// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node addressing.
//!
//! A [`NodeId`] names a node in the remote address space: a namespace index
//! plus one of four identifier kinds. Its textual form is
//!
//! ```text
//! ns=<u16>;i=<u32>
//! ns=<u16>;s=<text>
//! ns=<u16>;g=<canonical guid>
//! ns=<u16>;b=<base64>
//! ```
//!
//! Parsing is strict. The namespace is mandatory, exactly one identifier tag
//! must follow, and any deviation fails with [`AddressError`]. No trimming or
//! case folding is applied to the input.
//!
//! # Examples
//!
//! ```
//! use ualink_core::address::NodeId;
//!
//! let node: NodeId = "ns=3;s=TestNode.ReadWrite".parse().unwrap();
//! assert_eq!(node.namespace_index, 3);
//! assert_eq!(node.to_string(), "ns=3;s=TestNode.ReadWrite");
//!
//! assert!("ns=0,i=31;".parse::<NodeId>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// AddressError
// =============================================================================

/// A node address failed the `ns=<u16>;<tag>=<id>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed node address '{input}': {reason}")]
pub struct AddressError {
    /// The rejected text.
    pub input: String,
    /// Which rule was violated.
    pub reason: &'static str,
}

impl AddressError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

// =============================================================================
// NodeId
// =============================================================================

/// Identifier of a node in the remote address space.
///
/// Immutable once constructed. `Display` and `FromStr` are exact inverses for
/// every identifier kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Namespace index.
    pub namespace_index: u16,
    /// Identifier within the namespace.
    pub identifier: Identifier,
}

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// `i=` numeric identifier.
    Numeric(u32),
    /// `s=` text identifier.
    String(String),
    /// `g=` GUID identifier.
    Guid(Uuid),
    /// `b=` opaque byte-string identifier.
    Opaque(Vec<u8>),
}

impl NodeId {
    /// Creates a numeric node id.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Numeric(value),
        }
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::String(value.into()),
        }
    }

    /// Creates a GUID node id.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Guid(value),
        }
    }

    /// Creates an opaque node id.
    #[inline]
    pub fn opaque(namespace_index: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Opaque(value.into()),
        }
    }

    /// The null node id (`ns=0;i=0`).
    pub const NULL: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(0),
    };

    /// Root folder (`ns=0;i=84`).
    pub const ROOT_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(84),
    };

    /// Objects folder (`ns=0;i=85`).
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(85),
    };

    /// Parses the textual form. Same as `str::parse`.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        text.parse()
    }

    /// Returns the textual form. Always includes the `ns=` prefix.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Returns `true` for `ns=0;i=0`.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Identifier {
    /// The single-letter tag used in the textual form.
    pub const fn tag(&self) -> char {
        match self {
            Self::Numeric(_) => 'i',
            Self::String(_) => 's',
            Self::Guid(_) => 'g',
            Self::Opaque(_) => 'b',
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v.hyphenated()),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};{}", self.namespace_index, self.identifier)
    }
}

// =============================================================================
// Parsing
// =============================================================================

impl FromStr for NodeId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("ns=")
            .ok_or_else(|| AddressError::new(s, "missing 'ns=' namespace prefix"))?;

        let (ns_text, id_text) = rest
            .split_once(';')
            .ok_or_else(|| AddressError::new(s, "missing ';' after namespace"))?;

        let namespace_index = parse_decimal::<u16>(ns_text)
            .ok_or_else(|| AddressError::new(s, "namespace index is not a 16-bit decimal"))?;

        let (tag, value) = id_text
            .split_once('=')
            .ok_or_else(|| AddressError::new(s, "missing identifier tag"))?;

        let identifier = match tag {
            "i" => parse_decimal::<u32>(value)
                .map(Identifier::Numeric)
                .ok_or_else(|| AddressError::new(s, "numeric identifier is not a 32-bit decimal"))?,
            "s" => Identifier::String(value.to_string()),
            "g" => parse_canonical_guid(value)
                .map(Identifier::Guid)
                .ok_or_else(|| AddressError::new(s, "GUID is not in canonical 8-4-4-4-12 form"))?,
            "b" => {
                let bytes = BASE64
                    .decode(value)
                    .map_err(|_| AddressError::new(s, "opaque identifier is not valid base64"))?;
                Identifier::Opaque(bytes)
            }
            _ => return Err(AddressError::new(s, "unknown identifier tag")),
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// Parses a plain ASCII decimal. Rejects signs, whitespace and empty input,
/// which `str::parse` would partly accept.
fn parse_decimal<T: FromStr>(text: &str) -> Option<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Accepts only the hyphenated 36-character form. Braced, URN and simple
/// forms accepted by `Uuid::parse_str` are rejected.
pub(crate) fn parse_canonical_guid(text: &str) -> Option<Uuid> {
    const HYPHENS: [usize; 4] = [8, 13, 18, 23];

    if text.len() != 36 {
        return None;
    }
    let shape_ok = text.bytes().enumerate().all(|(i, b)| {
        if HYPHENS.contains(&i) {
            b == b'-'
        } else {
            b.is_ascii_hexdigit()
        }
    });
    if !shape_ok {
        return None;
    }
    Uuid::parse_str(text).ok()
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
