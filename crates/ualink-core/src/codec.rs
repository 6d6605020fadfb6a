// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversion between [`Value`] and [`WireVariant`].
//!
//! # Type resolution
//!
//! When the caller passes an explicit [`TypeTag`] it governs the encoding, so
//! an `Int32(5)` can be sent as `Int16` or `UInt16` when the target's declared
//! type is known. Without a tag the wire type comes from
//! [`DEFAULT_WIRE_TYPES`]:
//!
//! | value kind                    | wire type |
//! |-------------------------------|-----------|
//! | Boolean                       | Boolean   |
//! | SByte, Int16, Int32           | Int32     |
//! | Byte, UInt16, UInt32          | UInt32    |
//! | Int64 / UInt64                | Int64 / UInt64 |
//! | Float, Double                 | Double    |
//! | String                        | String    |
//! | DateTime                      | DateTime  |
//!
//! Every other kind (Float as Float, LocalizedText, NodeId, Guid, ...) needs
//! an explicit tag and fails with [`CodecError::NoDefaultType`] otherwise.
//!
//! # Arrays
//!
//! The element wire type is resolved once from the first element (or the
//! explicit tag) and applied to every element. One failing element fails the
//! whole array. An empty array without a tag encodes to
//! [`WireVariant::Empty`].

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::address::parse_canonical_guid;
use crate::error::{CodecError, CodecResult};
use crate::value::{LocalizedText, QualifiedName, Value, ValueKind};
use crate::wire::{TypeTag, WireScalar, WireVariant};

// =============================================================================
// Tables
// =============================================================================

/// Wire ticks (100 ns) per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks between 1601-01-01 and 1970-01-01.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// Default wire type per value kind, used when no explicit tag is given.
pub static DEFAULT_WIRE_TYPES: &[(ValueKind, TypeTag)] = &[
    (ValueKind::Boolean, TypeTag::Boolean),
    (ValueKind::SByte, TypeTag::Int32),
    (ValueKind::Int16, TypeTag::Int32),
    (ValueKind::Int32, TypeTag::Int32),
    (ValueKind::Byte, TypeTag::UInt32),
    (ValueKind::UInt16, TypeTag::UInt32),
    (ValueKind::UInt32, TypeTag::UInt32),
    (ValueKind::Int64, TypeTag::Int64),
    (ValueKind::UInt64, TypeTag::UInt64),
    (ValueKind::Float, TypeTag::Double),
    (ValueKind::Double, TypeTag::Double),
    (ValueKind::String, TypeTag::String),
    (ValueKind::DateTime, TypeTag::DateTime),
];

// =============================================================================
// ValueCodec
// =============================================================================

/// Stateless converter between the value model and wire variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    /// Returns the wire type used for `kind` when no tag is given.
    pub fn default_type(kind: ValueKind) -> Option<TypeTag> {
        DEFAULT_WIRE_TYPES
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, tag)| *tag)
    }

    /// Encodes a value, optionally forcing the wire type.
    pub fn encode(value: &Value, explicit_type: Option<TypeTag>) -> CodecResult<WireVariant> {
        match value {
            Value::Null => Ok(WireVariant::Empty),
            Value::Array(items) => encode_array(items, explicit_type),
            scalar => {
                let tag = resolve_type(scalar, explicit_type)?;
                encode_scalar(scalar, tag).map(WireVariant::Scalar)
            }
        }
    }

    /// Decodes a wire variant.
    ///
    /// Unknown wire types decode to [`Value::Null`] and are logged.
    pub fn decode(wire: &WireVariant) -> CodecResult<Value> {
        match wire {
            WireVariant::Empty => Ok(Value::Null),
            WireVariant::Scalar(scalar) => decode_scalar(scalar),
            WireVariant::Array {
                element_type,
                elements,
            } => elements
                .iter()
                .enumerate()
                .map(|(index, element)| {
                    if element.type_tag() != *element_type {
                        return Err(CodecError::ArrayElement {
                            index,
                            target: *element_type,
                            source: Box::new(CodecError::invalid_payload(
                                *element_type,
                                format!("element of type {}", element.type_tag()),
                            )),
                        });
                    }
                    decode_scalar(element)
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            WireVariant::Unknown { type_id } => {
                warn!(type_id, "Unknown wire type, decoding as no value");
                Ok(Value::Null)
            }
        }
    }

    /// Converts a timestamp to wire ticks.
    pub fn datetime_to_ticks(value: &DateTime<Utc>) -> CodecResult<i64> {
        value
            .timestamp_millis()
            .checked_mul(TICKS_PER_MILLISECOND)
            .and_then(|ticks| ticks.checked_add(UNIX_EPOCH_TICKS))
            .ok_or_else(|| CodecError::out_of_range(value, TypeTag::DateTime))
    }

    /// Converts wire ticks to a timestamp, truncated to milliseconds.
    pub fn ticks_to_datetime(ticks: i64) -> CodecResult<DateTime<Utc>> {
        let millis = (i128::from(ticks) - i128::from(UNIX_EPOCH_TICKS))
            .div_euclid(i128::from(TICKS_PER_MILLISECOND));
        i64::try_from(millis)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| CodecError::out_of_range(ticks, TypeTag::DateTime))
    }
}

fn resolve_type(value: &Value, explicit_type: Option<TypeTag>) -> CodecResult<TypeTag> {
    explicit_type
        .or_else(|| ValueCodec::default_type(value.kind()))
        .ok_or(CodecError::NoDefaultType { kind: value.kind() })
}

fn encode_array(items: &[Value], explicit_type: Option<TypeTag>) -> CodecResult<WireVariant> {
    let Some(first) = items.first() else {
        return Ok(match explicit_type {
            Some(element_type) => WireVariant::Array {
                element_type,
                elements: Vec::new(),
            },
            None => WireVariant::Empty,
        });
    };
    if matches!(first, Value::Array(_)) {
        return Err(CodecError::NestedArray);
    }

    let element_type = resolve_type(first, explicit_type)?;
    let elements = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            encode_scalar(item, element_type).map_err(|source| CodecError::ArrayElement {
                index,
                target: element_type,
                source: Box::new(source),
            })
        })
        .collect::<CodecResult<Vec<_>>>()?;

    Ok(WireVariant::Array {
        element_type,
        elements,
    })
}

// =============================================================================
// Scalar encoding
// =============================================================================

/// Narrows an integral (or integral-valued float, or boolean) value.
fn integer<T: TryFrom<i128>>(value: &Value, target: TypeTag) -> CodecResult<T> {
    let wide = match value {
        Value::Boolean(b) => i128::from(*b),
        Value::Float(_) | Value::Double(_) => {
            let f = value.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() || f.fract() != 0.0 {
                return Err(CodecError::out_of_range(f, target));
            }
            // Saturating cast; the TryFrom below rejects anything out of range.
            f as i128
        }
        other => other
            .as_integer()
            .ok_or_else(|| CodecError::type_mismatch(other.kind(), target))?,
    };
    T::try_from(wide).map_err(|_| CodecError::out_of_range(wide, target))
}

fn float(value: &Value, target: TypeTag) -> CodecResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| CodecError::type_mismatch(value.kind(), target))
}

/// Non-finite values pass through; finite ones must fit an `f32`.
fn narrow_float(value: &Value, target: TypeTag) -> CodecResult<f32> {
    let f = float(value, target)?;
    if f.is_finite() && f.abs() > f64::from(f32::MAX) {
        return Err(CodecError::out_of_range(f, target));
    }
    Ok(f as f32)
}

fn encode_scalar(value: &Value, tag: TypeTag) -> CodecResult<WireScalar> {
    let mismatch = || CodecError::type_mismatch(value.kind(), tag);

    let scalar = match tag {
        TypeTag::Boolean => match value {
            Value::Boolean(b) => WireScalar::Boolean(*b),
            other => WireScalar::Boolean(other.as_integer().ok_or_else(mismatch)? != 0),
        },
        TypeTag::SByte => WireScalar::SByte(integer(value, tag)?),
        TypeTag::Byte => WireScalar::Byte(integer(value, tag)?),
        TypeTag::Int16 => WireScalar::Int16(integer(value, tag)?),
        TypeTag::UInt16 => WireScalar::UInt16(integer(value, tag)?),
        TypeTag::Int32 => WireScalar::Int32(integer(value, tag)?),
        TypeTag::UInt32 => WireScalar::UInt32(integer(value, tag)?),
        TypeTag::Int64 => WireScalar::Int64(integer(value, tag)?),
        TypeTag::UInt64 => WireScalar::UInt64(integer(value, tag)?),
        TypeTag::Float => WireScalar::Float(narrow_float(value, tag)?),
        TypeTag::Double => WireScalar::Double(float(value, tag)?),
        TypeTag::String => match value {
            Value::String(s) | Value::XmlElement(s) => WireScalar::String(s.clone()),
            Value::LocalizedText(t) => WireScalar::String(t.text.clone()),
            _ => return Err(mismatch()),
        },
        TypeTag::XmlElement => match value {
            Value::XmlElement(s) | Value::String(s) => WireScalar::XmlElement(s.clone()),
            _ => return Err(mismatch()),
        },
        TypeTag::ByteString => match value {
            Value::ByteString(b) => WireScalar::ByteString(b.clone()),
            Value::String(s) => WireScalar::ByteString(s.as_bytes().to_vec()),
            _ => return Err(mismatch()),
        },
        TypeTag::DateTime => match value {
            Value::DateTime(dt) => WireScalar::DateTime(ValueCodec::datetime_to_ticks(dt)?),
            _ => return Err(mismatch()),
        },
        TypeTag::Guid => match value {
            Value::Guid(g) => WireScalar::Guid(*g),
            Value::String(s) => WireScalar::Guid(parse_canonical_guid(s).ok_or_else(|| {
                CodecError::invalid_payload(tag, format!("'{}' is not a canonical GUID", s))
            })?),
            _ => return Err(mismatch()),
        },
        TypeTag::NodeId => match value {
            Value::NodeId(n) => WireScalar::NodeId(n.clone()),
            Value::String(s) => WireScalar::NodeId(
                s.parse()
                    .map_err(|e| CodecError::invalid_payload(tag, format!("{}", e)))?,
            ),
            _ => return Err(mismatch()),
        },
        TypeTag::StatusCode => match value {
            Value::StatusCode(c) => WireScalar::StatusCode(c.bits()),
            Value::UInt32(c) => WireScalar::StatusCode(*c),
            _ => return Err(mismatch()),
        },
        TypeTag::QualifiedName => match value {
            Value::QualifiedName(q) => WireScalar::QualifiedName {
                namespace_index: q.namespace_index,
                name: q.name.clone(),
            },
            Value::String(s) => WireScalar::QualifiedName {
                namespace_index: 0,
                name: s.clone(),
            },
            _ => return Err(mismatch()),
        },
        TypeTag::LocalizedText => match value {
            Value::LocalizedText(t) => WireScalar::LocalizedText {
                locale: t.locale.clone(),
                text: t.text.clone(),
            },
            Value::String(s) => WireScalar::LocalizedText {
                locale: String::new(),
                text: s.clone(),
            },
            _ => return Err(mismatch()),
        },
    };
    Ok(scalar)
}

// =============================================================================
// Scalar decoding
// =============================================================================

fn decode_scalar(scalar: &WireScalar) -> CodecResult<Value> {
    let value = match scalar {
        WireScalar::Boolean(v) => Value::Boolean(*v),
        WireScalar::SByte(v) => Value::SByte(*v),
        WireScalar::Byte(v) => Value::Byte(*v),
        WireScalar::Int16(v) => Value::Int16(*v),
        WireScalar::UInt16(v) => Value::UInt16(*v),
        WireScalar::Int32(v) => Value::Int32(*v),
        WireScalar::UInt32(v) => Value::UInt32(*v),
        WireScalar::Int64(v) => Value::Int64(*v),
        WireScalar::UInt64(v) => Value::UInt64(*v),
        WireScalar::Float(v) => Value::Float(*v),
        WireScalar::Double(v) => Value::Double(*v),
        WireScalar::String(v) => Value::String(v.clone()),
        WireScalar::DateTime(ticks) => Value::DateTime(ValueCodec::ticks_to_datetime(*ticks)?),
        WireScalar::Guid(v) => Value::Guid(*v),
        WireScalar::ByteString(v) => Value::ByteString(v.clone()),
        WireScalar::XmlElement(v) => Value::XmlElement(v.clone()),
        WireScalar::NodeId(v) => Value::NodeId(v.clone()),
        WireScalar::StatusCode(v) => Value::StatusCode((*v).into()),
        WireScalar::QualifiedName {
            namespace_index,
            name,
        } => Value::QualifiedName(QualifiedName::new(*namespace_index, name.clone())),
        WireScalar::LocalizedText { locale, text } => {
            Value::LocalizedText(LocalizedText::new(locale.clone(), text.clone()))
        }
    };
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================
