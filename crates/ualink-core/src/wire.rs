// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire-level typed values.
//!
//! A [`WireVariant`] is what a backend connection sends and receives: a
//! built-in type tag plus a scalar or array payload. It is also encodable to
//! the protocol's binary Variant layout (little-endian, length-prefixed
//! strings, encoding-mask byte with the array flag in bit 7).

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::{Identifier, NodeId};
use crate::error::{CodecError, CodecResult};

// =============================================================================
// TypeTag
// =============================================================================

/// Built-in wire types, numbered by their protocol type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeTag {
    /// Boolean.
    Boolean = 1,
    /// Signed 8-bit integer.
    SByte = 2,
    /// Unsigned 8-bit integer.
    Byte = 3,
    /// Signed 16-bit integer.
    Int16 = 4,
    /// Unsigned 16-bit integer.
    UInt16 = 5,
    /// Signed 32-bit integer.
    Int32 = 6,
    /// Unsigned 32-bit integer.
    UInt32 = 7,
    /// Signed 64-bit integer.
    Int64 = 8,
    /// Unsigned 64-bit integer.
    UInt64 = 9,
    /// 32-bit float.
    Float = 10,
    /// 64-bit float.
    Double = 11,
    /// UTF-8 string.
    String = 12,
    /// 100 ns ticks since 1601-01-01.
    DateTime = 13,
    /// GUID.
    Guid = 14,
    /// Byte string.
    ByteString = 15,
    /// XML element.
    XmlElement = 16,
    /// Node id.
    NodeId = 17,
    /// Status code.
    StatusCode = 19,
    /// Qualified name.
    QualifiedName = 20,
    /// Localized text.
    LocalizedText = 21,
}

impl TypeTag {
    /// All tags this crate can carry.
    pub const ALL: [TypeTag; 20] = [
        TypeTag::Boolean,
        TypeTag::SByte,
        TypeTag::Byte,
        TypeTag::Int16,
        TypeTag::UInt16,
        TypeTag::Int32,
        TypeTag::UInt32,
        TypeTag::Int64,
        TypeTag::UInt64,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::String,
        TypeTag::DateTime,
        TypeTag::Guid,
        TypeTag::ByteString,
        TypeTag::XmlElement,
        TypeTag::NodeId,
        TypeTag::StatusCode,
        TypeTag::QualifiedName,
        TypeTag::LocalizedText,
    ];

    /// Looks a tag up by protocol type id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| *tag as u8 == id)
    }

    /// Protocol type id.
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Returns the type name.
    pub const fn name(self) -> &'static str {
        match self {
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
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::XmlElement => "XmlElement",
            Self::NodeId => "NodeId",
            Self::StatusCode => "StatusCode",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// WireScalar / WireVariant
// =============================================================================

/// A single wire-level value.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum WireScalar {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Raw ticks, see [`crate::codec::TICKS_PER_MILLISECOND`].
    DateTime(i64),
    Guid(Uuid),
    ByteString(Vec<u8>),
    XmlElement(String),
    NodeId(NodeId),
    StatusCode(u32),
    QualifiedName { namespace_index: u16, name: String },
    LocalizedText { locale: String, text: String },
}

impl WireScalar {
    /// The wire type of this scalar.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Boolean(_) => TypeTag::Boolean,
            Self::SByte(_) => TypeTag::SByte,
            Self::Byte(_) => TypeTag::Byte,
            Self::Int16(_) => TypeTag::Int16,
            Self::UInt16(_) => TypeTag::UInt16,
            Self::Int32(_) => TypeTag::Int32,
            Self::UInt32(_) => TypeTag::UInt32,
            Self::Int64(_) => TypeTag::Int64,
            Self::UInt64(_) => TypeTag::UInt64,
            Self::Float(_) => TypeTag::Float,
            Self::Double(_) => TypeTag::Double,
            Self::String(_) => TypeTag::String,
            Self::DateTime(_) => TypeTag::DateTime,
            Self::Guid(_) => TypeTag::Guid,
            Self::ByteString(_) => TypeTag::ByteString,
            Self::XmlElement(_) => TypeTag::XmlElement,
            Self::NodeId(_) => TypeTag::NodeId,
            Self::StatusCode(_) => TypeTag::StatusCode,
            Self::QualifiedName { .. } => TypeTag::QualifiedName,
            Self::LocalizedText { .. } => TypeTag::LocalizedText,
        }
    }
}

/// A typed value as carried by a backend connection.
#[derive(Debug, Clone, PartialEq)]
pub enum WireVariant {
    /// The empty variant.
    Empty,
    /// One scalar.
    Scalar(WireScalar),
    /// A one-dimensional array whose elements all have `element_type`.
    Array {
        /// Element wire type.
        element_type: TypeTag,
        /// Elements.
        elements: Vec<WireScalar>,
    },
    /// A built-in type this crate does not model, such as ExtensionObject.
    Unknown {
        /// Protocol type id.
        type_id: u8,
    },
}

impl WireVariant {
    /// Wire type of the payload, if any.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Empty | Self::Unknown { .. } => None,
            Self::Scalar(s) => Some(s.type_tag()),
            Self::Array { element_type, .. } => Some(*element_type),
        }
    }

    /// Returns `true` for an array payload.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    // =========================================================================
    // Binary encoding
    // =========================================================================

    const ARRAY_FLAG: u8 = 0x80;
    const DIMENSIONS_FLAG: u8 = 0x40;
    const TYPE_MASK: u8 = 0x3F;

    /// Encodes to the binary Variant layout.
    ///
    /// [`WireVariant::Unknown`] has no payload to write and fails.
    pub fn encode_binary(&self) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        match self {
            Self::Empty => buf.put_u8(0),
            Self::Scalar(scalar) => {
                buf.put_u8(scalar.type_tag().id());
                put_scalar(&mut buf, scalar)?;
            }
            Self::Array {
                element_type,
                elements,
            } => {
                buf.put_u8(element_type.id() | Self::ARRAY_FLAG);
                put_length(&mut buf, elements.len())?;
                for element in elements {
                    if element.type_tag() != *element_type {
                        return Err(CodecError::invalid_payload(
                            *element_type,
                            format!("array element of type {}", element.type_tag()),
                        ));
                    }
                    put_scalar(&mut buf, element)?;
                }
            }
            Self::Unknown { type_id } => {
                return Err(CodecError::UnknownTypeId { type_id: *type_id })
            }
        }
        Ok(buf.freeze())
    }

    /// Decodes one Variant from the front of `buf`.
    ///
    /// Array dimensions are read and discarded; arrays are flattened to one
    /// dimension.
    pub fn decode_binary(buf: &mut impl Buf) -> CodecResult<Self> {
        need(buf, 1)?;
        let mask = buf.get_u8();
        let type_id = mask & Self::TYPE_MASK;
        if type_id == 0 {
            return Ok(Self::Empty);
        }
        let tag = TypeTag::from_id(type_id).ok_or(CodecError::UnknownTypeId { type_id })?;

        if mask & Self::ARRAY_FLAG == 0 {
            return Ok(Self::Scalar(get_scalar(buf, tag)?));
        }

        let len = get_length(buf)?;
        let mut elements = Vec::with_capacity(len.min(buf.remaining()));
        for _ in 0..len {
            elements.push(get_scalar(buf, tag)?);
        }
        if mask & Self::DIMENSIONS_FLAG != 0 {
            let dims = get_length(buf)?;
            need(buf, dims * 4)?;
            buf.advance(dims * 4);
        }
        Ok(Self::Array {
            element_type: tag,
            elements,
        })
    }
}

impl From<WireScalar> for WireVariant {
    fn from(scalar: WireScalar) -> Self {
        Self::Scalar(scalar)
    }
}

// =============================================================================
// Binary helpers
// =============================================================================

fn need(buf: &impl Buf, n: usize) -> CodecResult<()> {
    if buf.remaining() < n {
        return Err(CodecError::Truncated {
            needed: n,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn put_length(buf: &mut BytesMut, len: usize) -> CodecResult<()> {
    let len = i32::try_from(len).map_err(|_| CodecError::out_of_range(len, TypeTag::Int32))?;
    buf.put_i32_le(len);
    Ok(())
}

/// A negative length is the protocol's null marker and reads as zero.
fn get_length(buf: &mut impl Buf) -> CodecResult<usize> {
    need(buf, 4)?;
    let len = buf.get_i32_le();
    Ok(usize::try_from(len).unwrap_or(0))
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> CodecResult<()> {
    put_length(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

fn get_bytes(buf: &mut impl Buf) -> CodecResult<Vec<u8>> {
    let len = get_length(buf)?;
    need(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn get_string(buf: &mut impl Buf, tag: TypeTag) -> CodecResult<String> {
    String::from_utf8(get_bytes(buf)?)
        .map_err(|e| CodecError::invalid_payload(tag, format!("invalid UTF-8: {}", e)))
}

fn put_guid(buf: &mut BytesMut, guid: &Uuid) {
    let (d1, d2, d3, d4) = guid.as_fields();
    buf.put_u32_le(d1);
    buf.put_u16_le(d2);
    buf.put_u16_le(d3);
    buf.put_slice(d4);
}

fn get_guid(buf: &mut impl Buf) -> CodecResult<Uuid> {
    need(buf, 16)?;
    let d1 = buf.get_u32_le();
    let d2 = buf.get_u16_le();
    let d3 = buf.get_u16_le();
    let mut d4 = [0u8; 8];
    buf.copy_to_slice(&mut d4);
    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

fn put_node_id(buf: &mut BytesMut, node: &NodeId) -> CodecResult<()> {
    let ns = node.namespace_index;
    match &node.identifier {
        Identifier::Numeric(id) if ns == 0 && *id <= 0xFF => {
            buf.put_u8(0x00);
            buf.put_u8(*id as u8);
        }
        Identifier::Numeric(id) if ns <= 0xFF && *id <= 0xFFFF => {
            buf.put_u8(0x01);
            buf.put_u8(ns as u8);
            buf.put_u16_le(*id as u16);
        }
        Identifier::Numeric(id) => {
            buf.put_u8(0x02);
            buf.put_u16_le(ns);
            buf.put_u32_le(*id);
        }
        Identifier::String(s) => {
            buf.put_u8(0x03);
            buf.put_u16_le(ns);
            put_bytes(buf, s.as_bytes())?;
        }
        Identifier::Guid(g) => {
            buf.put_u8(0x04);
            buf.put_u16_le(ns);
            put_guid(buf, g);
        }
        Identifier::Opaque(b) => {
            buf.put_u8(0x05);
            buf.put_u16_le(ns);
            put_bytes(buf, b)?;
        }
    }
    Ok(())
}

fn get_node_id(buf: &mut impl Buf) -> CodecResult<NodeId> {
    need(buf, 1)?;
    match buf.get_u8() {
        0x00 => {
            need(buf, 1)?;
            Ok(NodeId::numeric(0, u32::from(buf.get_u8())))
        }
        0x01 => {
            need(buf, 3)?;
            let ns = u16::from(buf.get_u8());
            Ok(NodeId::numeric(ns, u32::from(buf.get_u16_le())))
        }
        0x02 => {
            need(buf, 6)?;
            let ns = buf.get_u16_le();
            Ok(NodeId::numeric(ns, buf.get_u32_le()))
        }
        0x03 => {
            need(buf, 2)?;
            let ns = buf.get_u16_le();
            Ok(NodeId::string(ns, get_string(buf, TypeTag::NodeId)?))
        }
        0x04 => {
            need(buf, 2)?;
            let ns = buf.get_u16_le();
            Ok(NodeId::guid(ns, get_guid(buf)?))
        }
        0x05 => {
            need(buf, 2)?;
            let ns = buf.get_u16_le();
            Ok(NodeId::opaque(ns, get_bytes(buf)?))
        }
        other => Err(CodecError::invalid_payload(
            TypeTag::NodeId,
            format!("encoding byte 0x{:02X}", other),
        )),
    }
}

fn put_scalar(buf: &mut BytesMut, scalar: &WireScalar) -> CodecResult<()> {
    match scalar {
        WireScalar::Boolean(v) => buf.put_u8(u8::from(*v)),
        WireScalar::SByte(v) => buf.put_i8(*v),
        WireScalar::Byte(v) => buf.put_u8(*v),
        WireScalar::Int16(v) => buf.put_i16_le(*v),
        WireScalar::UInt16(v) => buf.put_u16_le(*v),
        WireScalar::Int32(v) => buf.put_i32_le(*v),
        WireScalar::UInt32(v) => buf.put_u32_le(*v),
        WireScalar::Int64(v) => buf.put_i64_le(*v),
        WireScalar::UInt64(v) => buf.put_u64_le(*v),
        WireScalar::Float(v) => buf.put_f32_le(*v),
        WireScalar::Double(v) => buf.put_f64_le(*v),
        WireScalar::String(v) | WireScalar::XmlElement(v) => put_bytes(buf, v.as_bytes())?,
        WireScalar::DateTime(v) => buf.put_i64_le(*v),
        WireScalar::Guid(v) => put_guid(buf, v),
        WireScalar::ByteString(v) => put_bytes(buf, v)?,
        WireScalar::NodeId(v) => put_node_id(buf, v)?,
        WireScalar::StatusCode(v) => buf.put_u32_le(*v),
        WireScalar::QualifiedName {
            namespace_index,
            name,
        } => {
            buf.put_u16_le(*namespace_index);
            put_bytes(buf, name.as_bytes())?;
        }
        WireScalar::LocalizedText { locale, text } => {
            let mut mask = 0u8;
            if !locale.is_empty() {
                mask |= 0x01;
            }
            if !text.is_empty() {
                mask |= 0x02;
            }
            buf.put_u8(mask);
            if !locale.is_empty() {
                put_bytes(buf, locale.as_bytes())?;
            }
            if !text.is_empty() {
                put_bytes(buf, text.as_bytes())?;
            }
        }
    }
    Ok(())
}

fn get_scalar(buf: &mut impl Buf, tag: TypeTag) -> CodecResult<WireScalar> {
    let scalar = match tag {
        TypeTag::Boolean => {
            need(buf, 1)?;
            WireScalar::Boolean(buf.get_u8() != 0)
        }
        TypeTag::SByte => {
            need(buf, 1)?;
            WireScalar::SByte(buf.get_i8())
        }
        TypeTag::Byte => {
            need(buf, 1)?;
            WireScalar::Byte(buf.get_u8())
        }
        TypeTag::Int16 => {
            need(buf, 2)?;
            WireScalar::Int16(buf.get_i16_le())
        }
        TypeTag::UInt16 => {
            need(buf, 2)?;
            WireScalar::UInt16(buf.get_u16_le())
        }
        TypeTag::Int32 => {
            need(buf, 4)?;
            WireScalar::Int32(buf.get_i32_le())
        }
        TypeTag::UInt32 => {
            need(buf, 4)?;
            WireScalar::UInt32(buf.get_u32_le())
        }
        TypeTag::Int64 => {
            need(buf, 8)?;
            WireScalar::Int64(buf.get_i64_le())
        }
        TypeTag::UInt64 => {
            need(buf, 8)?;
            WireScalar::UInt64(buf.get_u64_le())
        }
        TypeTag::Float => {
            need(buf, 4)?;
            WireScalar::Float(buf.get_f32_le())
        }
        TypeTag::Double => {
            need(buf, 8)?;
            WireScalar::Double(buf.get_f64_le())
        }
        TypeTag::String => WireScalar::String(get_string(buf, tag)?),
        TypeTag::DateTime => {
            need(buf, 8)?;
            WireScalar::DateTime(buf.get_i64_le())
        }
        TypeTag::Guid => WireScalar::Guid(get_guid(buf)?),
        TypeTag::ByteString => WireScalar::ByteString(get_bytes(buf)?),
        TypeTag::XmlElement => WireScalar::XmlElement(get_string(buf, tag)?),
        TypeTag::NodeId => WireScalar::NodeId(get_node_id(buf)?),
        TypeTag::StatusCode => {
            need(buf, 4)?;
            WireScalar::StatusCode(buf.get_u32_le())
        }
        TypeTag::QualifiedName => {
            need(buf, 2)?;
            let namespace_index = buf.get_u16_le();
            WireScalar::QualifiedName {
                namespace_index,
                name: get_string(buf, tag)?,
            }
        }
        TypeTag::LocalizedText => {
            need(buf, 1)?;
            let mask = buf.get_u8();
            let locale = if mask & 0x01 != 0 {
                get_string(buf, tag)?
            } else {
                String::new()
            };
            let text = if mask & 0x02 != 0 {
                get_string(buf, tag)?
            } else {
                String::new()
            };
            WireScalar::LocalizedText { locale, text }
        }
    };
    Ok(scalar)
}

// =============================================================================
// Tests
// =============================================================================
