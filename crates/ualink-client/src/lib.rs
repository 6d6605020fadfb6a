// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ualink-client
//!
//! Backend-agnostic OPC UA client engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  Node / Subscription / Monitor handles
//! │  Client  │─────────────────────────────────────────┐
//! └────┬─────┘                                         │
//!      │ Command (unbounded mpsc) + oneshot reply      │
//!      ▼                                               ▼
//! ┌──────────────────────────┐   watch / broadcast   ClientStatus
//! │          Worker          │──────────────────────►
//! │  SubscriptionEngine      │
//! │  Box<dyn Backend...>     │◄── Tick ── interval drivers
//! └──────────────────────────┘
//! ```
//!
//! Every operation returns a [`Completion`] immediately. Address parsing
//! and value encoding happen before anything is queued, so those errors
//! are returned synchronously.
//!
//! ## Modules
//!
//! - [`backend`]: the [`BackendConnection`] trait and its request types
//! - [`client`]: [`Client`] and the connection state machine
//! - [`node`]: [`Node`] handles over a generational arena
//! - [`subscription`]: subscriptions, monitors and notification dispatch
//! - [`config`]: [`ClientConfig`] and the file/env loader
//! - [`logging`]: `tracing-subscriber` setup

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod attribute_service;
pub mod backend;
pub mod client;
pub mod completion;
pub mod config;
pub mod endpoint;
pub mod logging;
pub mod node;
pub mod subscription;
mod worker;

pub use backend::{
    BackendConnection, BackendError, DataValue, MonitorKind, Notification, NotificationPayload,
    Request, Response,
};
pub use client::{Client, ClientError, ClientState, ClientStatus};
pub use completion::Completion;
pub use config::{ClientConfig, ConfigFormat, ConfigLoader, LogFormat, LoggingConfig};
pub use endpoint::{Credentials, Endpoint};
pub use logging::init_logging;
pub use node::{Node, NodeKey};
pub use subscription::{DataChange, EventMonitor, EventNotification, Subscription, ValueMonitor};

pub use ualink_core;
