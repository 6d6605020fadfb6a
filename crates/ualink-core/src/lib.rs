// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ualink-core
//!
//! Protocol-facing data model for the ualink OPC UA client engine.
//!
//! ## Modules
//!
//! - [`address`]: [`NodeId`] parsing and formatting (`ns=<u16>;{i|s|g|b}=...`)
//! - [`value`]: the dynamic [`Value`] model
//! - [`wire`]: [`WireVariant`] and [`TypeTag`], plus the binary Variant layout
//! - [`codec`]: [`ValueCodec`], conversion between the two
//! - [`status`]: [`StatusCode`] table and [`ErrorCategory`]
//! - [`attribute`]: attribute ids, masks and result sets
//! - [`error`]: the [`UaError`] hierarchy
//!
//! ## Example
//!
//! ```
//! use ualink_core::{NodeId, TypeTag, Value, ValueCodec};
//!
//! let node: NodeId = "ns=2;s=Demo.Static.Scalar.Int16".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! // Without a tag an integer travels as Int32; the tag narrows it.
//! let wire = ValueCodec::encode(&Value::Int32(7), Some(TypeTag::Int16)).unwrap();
//! assert_eq!(wire.type_tag(), Some(TypeTag::Int16));
//! assert_eq!(ValueCodec::decode(&wire).unwrap(), Value::Int16(7));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod attribute;
pub mod codec;
pub mod error;
pub mod status;
pub mod value;
pub mod wire;

pub use address::{AddressError, Identifier, NodeId};
pub use attribute::{
    AttributeId, AttributeMap, AttributeMask, AttributeResult, AttributeSet, NodeClass,
    EVENT_NOTIFIER_SUBSCRIBE,
};
pub use codec::ValueCodec;
pub use error::{
    CodecError, CodecResult, ConfigError, ConnectionError, ErrorKind, ErrorSeverity, StateError,
    UaError, UaResult,
};
pub use status::{ErrorCategory, StatusCode};
pub use value::{LocalizedText, QualifiedName, Value, ValueKind};
pub use wire::{TypeTag, WireScalar, WireVariant};
