// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Dynamic, type-tagged value model.
//!
//! [`Value`] is what callers read, write and receive in notifications. It is
//! independent of the wire representation; [`crate::codec::ValueCodec`]
//! converts between the two.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::NodeId;
use crate::status::StatusCode;

// =============================================================================
// Structured scalars
// =============================================================================

/// A name qualified by a namespace index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_index, self.name)
    }
}

/// Human-readable text with an optional locale. Empty strings mean absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Locale identifier such as `en-US`.
    pub locale: String,
    /// Text.
    pub text: String,
}

impl LocalizedText {
    /// Creates a localized text.
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }

    /// Text without a locale.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("", text)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamic value.
///
/// `Array` elements are homogeneous. `Null` is the explicit "no value"
/// result of decoding a wire type this crate does not understand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 text. Embedded NUL characters are kept.
    String(String),
    /// Raw bytes.
    ByteString(Vec<u8>),
    /// Point in time, millisecond precision on the wire.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Reference to another node.
    NodeId(NodeId),
    /// Namespace-qualified name.
    QualifiedName(QualifiedName),
    /// Localized text.
    LocalizedText(LocalizedText),
    /// Status code.
    StatusCode(StatusCode),
    /// XML fragment.
    XmlElement(String),
    /// Homogeneous array.
    Array(Vec<Value>),
}

/// The kind of a [`Value`], without its payload.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    ByteString,
    DateTime,
    Guid,
    NodeId,
    QualifiedName,
    LocalizedText,
    StatusCode,
    XmlElement,
    Array,
}

impl ValueKind {
    /// Returns the kind name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::ByteString => "ByteString",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::NodeId => "NodeId",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
            Self::StatusCode => "StatusCode",
            Self::XmlElement => "XmlElement",
            Self::Array => "Array",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::SByte(_) => ValueKind::SByte,
            Self::Byte(_) => ValueKind::Byte,
            Self::Int16(_) => ValueKind::Int16,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::Int32(_) => ValueKind::Int32,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::ByteString(_) => ValueKind::ByteString,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Guid(_) => ValueKind::Guid,
            Self::NodeId(_) => ValueKind::NodeId,
            Self::QualifiedName(_) => ValueKind::QualifiedName,
            Self::LocalizedText(_) => ValueKind::LocalizedText,
            Self::StatusCode(_) => ValueKind::StatusCode,
            Self::XmlElement(_) => ValueKind::XmlElement,
            Self::Array(_) => ValueKind::Array,
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload widened to `i128`, for range-checked narrowing.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::SByte(v) => Some(i128::from(*v)),
            Self::Byte(v) => Some(i128::from(*v)),
            Self::Int16(v) => Some(i128::from(*v)),
            Self::UInt16(v) => Some(i128::from(*v)),
            Self::Int32(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Numeric payload as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_integer().map(|v| v as f64),
        }
    }

    /// Text payload of String, XmlElement or LocalizedText.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::XmlElement(v) => Some(v),
            Self::LocalizedText(v) => Some(&v.text),
            _ => None,
        }
    }

    /// Builds an array from anything convertible into values.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Array elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

// =============================================================================
// From conversions
// =============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => ByteString,
    DateTime<Utc> => DateTime,
    Uuid => Guid,
    NodeId => NodeId,
    QualifiedName => QualifiedName,
    LocalizedText => LocalizedText,
    StatusCode => StatusCode,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
