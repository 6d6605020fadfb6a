// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node attributes.
//!
//! [`AttributeId`] orders by declaration (protocol id) order. [`AttributeSet`]
//! and [`AttributeMap`] are keyed by it, so iteration and batch results
//! always come out in that order.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::status::StatusCode;
use crate::value::Value;
use crate::wire::TypeTag;

// =============================================================================
// AttributeId
// =============================================================================

/// Attribute identifiers, numbered by protocol id.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum AttributeId {
    NodeId = 1,
    NodeClass = 2,
    BrowseName = 3,
    DisplayName = 4,
    Description = 5,
    WriteMask = 6,
    UserWriteMask = 7,
    IsAbstract = 8,
    Symmetric = 9,
    InverseName = 10,
    ContainsNoLoops = 11,
    EventNotifier = 12,
    Value = 13,
    DataType = 14,
    ValueRank = 15,
    ArrayDimensions = 16,
    AccessLevel = 17,
    UserAccessLevel = 18,
    MinimumSamplingInterval = 19,
    Historizing = 20,
    Executable = 21,
    UserExecutable = 22,
}

impl AttributeId {
    /// All attributes in declaration order.
    pub const ALL: [AttributeId; 22] = [
        AttributeId::NodeId,
        AttributeId::NodeClass,
        AttributeId::BrowseName,
        AttributeId::DisplayName,
        AttributeId::Description,
        AttributeId::WriteMask,
        AttributeId::UserWriteMask,
        AttributeId::IsAbstract,
        AttributeId::Symmetric,
        AttributeId::InverseName,
        AttributeId::ContainsNoLoops,
        AttributeId::EventNotifier,
        AttributeId::Value,
        AttributeId::DataType,
        AttributeId::ValueRank,
        AttributeId::ArrayDimensions,
        AttributeId::AccessLevel,
        AttributeId::UserAccessLevel,
        AttributeId::MinimumSamplingInterval,
        AttributeId::Historizing,
        AttributeId::Executable,
        AttributeId::UserExecutable,
    ];

    /// Protocol id.
    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Looks an attribute up by protocol id.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }

    /// The protocol-defined wire type of this attribute.
    ///
    /// `None` for [`AttributeId::Value`], whose type depends on the node.
    pub const fn wire_type(self) -> Option<TypeTag> {
        match self {
            Self::NodeId | Self::DataType => Some(TypeTag::NodeId),
            Self::NodeClass | Self::ValueRank => Some(TypeTag::Int32),
            Self::BrowseName => Some(TypeTag::QualifiedName),
            Self::DisplayName | Self::Description | Self::InverseName => {
                Some(TypeTag::LocalizedText)
            }
            Self::WriteMask | Self::UserWriteMask | Self::ArrayDimensions => {
                Some(TypeTag::UInt32)
            }
            Self::IsAbstract
            | Self::Symmetric
            | Self::ContainsNoLoops
            | Self::Historizing
            | Self::Executable
            | Self::UserExecutable => Some(TypeTag::Boolean),
            Self::EventNotifier | Self::AccessLevel | Self::UserAccessLevel => {
                Some(TypeTag::Byte)
            }
            Self::MinimumSamplingInterval => Some(TypeTag::Double),
            Self::Value => None,
        }
    }

    const fn bit(self) -> u32 {
        1 << (self as u32 - 1)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// AttributeMask
// =============================================================================

/// A set of attributes to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeMask(u32);

impl AttributeMask {
    /// No attributes.
    pub const EMPTY: AttributeMask = AttributeMask(0);

    /// NodeId, NodeClass, BrowseName, DisplayName.
    pub const fn mandatory_base() -> Self {
        Self(
            AttributeId::NodeId.bit()
                | AttributeId::NodeClass.bit()
                | AttributeId::BrowseName.bit()
                | AttributeId::DisplayName.bit(),
        )
    }

    /// Base attributes plus the mandatory attributes of a variable node.
    pub const fn mandatory_variable() -> Self {
        Self(
            Self::mandatory_base().0
                | AttributeId::Value.bit()
                | AttributeId::DataType.bit()
                | AttributeId::ValueRank.bit()
                | AttributeId::AccessLevel.bit()
                | AttributeId::UserAccessLevel.bit()
                | AttributeId::Historizing.bit(),
        )
    }

    /// Returns `true` if `attribute` is in the mask.
    pub const fn contains(self, attribute: AttributeId) -> bool {
        self.0 & attribute.bit() != 0
    }

    /// Returns `true` if the mask is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of attributes in the mask.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Attributes in declaration order.
    pub fn iter(self) -> impl Iterator<Item = AttributeId> {
        AttributeId::ALL.into_iter().filter(move |a| self.contains(*a))
    }
}

impl From<AttributeId> for AttributeMask {
    fn from(attribute: AttributeId) -> Self {
        Self(attribute.bit())
    }
}

impl FromIterator<AttributeId> for AttributeMask {
    fn from_iter<I: IntoIterator<Item = AttributeId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |mask, a| mask | a)
    }
}

impl<T: Into<AttributeMask>> BitOr<T> for AttributeMask {
    type Output = AttributeMask;

    fn bitor(self, rhs: T) -> Self::Output {
        AttributeMask(self.0 | rhs.into().0)
    }
}

impl<T: Into<AttributeMask>> BitOrAssign<T> for AttributeMask {
    fn bitor_assign(&mut self, rhs: T) {
        self.0 |= rhs.into().0;
    }
}

impl BitOr for AttributeId {
    type Output = AttributeMask;

    fn bitor(self, rhs: AttributeId) -> Self::Output {
        AttributeMask::from(self) | rhs
    }
}

// =============================================================================
// AttributeSet
// =============================================================================

/// Result of reading or writing one attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeResult {
    /// The value, absent when the status is bad.
    pub value: Option<Value>,
    /// Per-attribute status.
    pub status: StatusCode,
}

/// Attribute results keyed by attribute, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSet {
    entries: BTreeMap<AttributeId, AttributeResult>,
}

impl AttributeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a result, replacing any previous one.
    pub fn insert(&mut self, attribute: AttributeId, value: Option<Value>, status: StatusCode) {
        self.entries
            .insert(attribute, AttributeResult { value, status });
    }

    /// Returns the full result for `attribute`.
    pub fn get(&self, attribute: AttributeId) -> Option<&AttributeResult> {
        self.entries.get(&attribute)
    }

    /// Returns the value for `attribute`, if one was delivered.
    pub fn value(&self, attribute: AttributeId) -> Option<&Value> {
        self.entries.get(&attribute).and_then(|r| r.value.as_ref())
    }

    /// Returns the status for `attribute`, if it was part of a result.
    pub fn status(&self, attribute: AttributeId) -> Option<StatusCode> {
        self.entries.get(&attribute).map(|r| r.status)
    }

    /// Attributes present, in declaration order.
    pub fn attributes(&self) -> AttributeMask {
        self.entries.keys().copied().collect()
    }

    /// Merges another set into this one, newer results win.
    pub fn merge(&mut self, other: AttributeSet) {
        self.entries.extend(other.entries);
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no attribute is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, &AttributeResult)> {
        self.entries.iter().map(|(a, r)| (*a, r))
    }
}

/// Attribute values to write, iterated in declaration order.
pub type AttributeMap = BTreeMap<AttributeId, Value>;

// =============================================================================
// NodeClass
// =============================================================================

/// Class of a node, as carried by the NodeClass attribute.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Unspecified = 0,
    Object = 1,
    Variable = 2,
    Method = 4,
    ObjectType = 8,
    VariableType = 16,
    ReferenceType = 32,
    DataType = 64,
    View = 128,
}

impl NodeClass {
    /// Maps the attribute's integer value.
    pub fn from_value(value: i32) -> Option<Self> {
        let class = match value {
            0 => Self::Unspecified,
            1 => Self::Object,
            2 => Self::Variable,
            4 => Self::Method,
            8 => Self::ObjectType,
            16 => Self::VariableType,
            32 => Self::ReferenceType,
            64 => Self::DataType,
            128 => Self::View,
            _ => return None,
        };
        Some(class)
    }

    /// Reads the class from a decoded NodeClass attribute value.
    pub fn from_attribute(value: &Value) -> Option<Self> {
        value
            .as_integer()
            .and_then(|v| i32::try_from(v).ok())
            .and_then(Self::from_value)
    }

    /// Whether nodes of this class carry a Value attribute.
    pub const fn has_value(self) -> bool {
        matches!(self, Self::Variable | Self::VariableType)
    }
}

/// Bit of the EventNotifier attribute marking an event source.
pub const EVENT_NOTIFIER_SUBSCRIBE: u8 = 0x01;
