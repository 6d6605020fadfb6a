// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscriptions and monitored items.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SubscriptionEngine                      │
//! │   (owned by the worker; no locks)                            │
//! │                                                              │
//! │   subscriptions: id ──► interval, item ids                   │
//! │   items:         id ──► subscription, node, sink             │
//! │   drivers:       interval ──► tick task (ref-counted)        │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲ Tick { interval }                │ try_send
//!          │                                  ▼
//!    interval driver                   ValueMonitor / EventMonitor
//! ```
//!
//! Subscriptions sharing a sampling interval share one driver. A driver
//! only enqueues ticks; polling and dispatch run on the worker so every
//! backend call stays on one task.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ualink_core::{NodeId, StateError, StatusCode, UaResult, Value, ValueCodec};

use crate::backend::{MonitorKind, Notification, NotificationPayload};
use crate::client::ClientInner;
use crate::completion::{Completion, Reply};
use crate::node::Node;
use crate::worker::{Command, MonitorReply};

// =============================================================================
// Notifications
// =============================================================================

/// A new value of a monitored node.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// The value.
    pub value: Value,
    /// Status reported with the value.
    pub status: StatusCode,
    /// Source timestamp, or the arrival time when the server sent none.
    pub source_timestamp: DateTime<Utc>,
}

/// An event raised by a monitored notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    /// Selected event fields in order.
    pub fields: Vec<Value>,
    /// When the notification was dispatched.
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Handles
// =============================================================================

/// Handle to a subscription.
#[derive(Clone)]
pub struct Subscription {
    id: u32,
    interval_ms: u32,
    owner: ClientInner,
}

impl Subscription {
    pub(crate) fn new(id: u32, interval_ms: u32, owner: ClientInner) -> Self {
        Self {
            id,
            interval_ms,
            owner,
        }
    }

    /// Subscription id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Revised sampling interval.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Monitors the Value attribute of `node`.
    ///
    /// Resolves to `None` when the server rejects the item, for example
    /// because the node does not exist or has no Value attribute.
    pub fn add_value_monitor(&self, node: &Node) -> UaResult<Completion<Option<ValueMonitor>>> {
        self.add_monitor(node, MonitorReply::Value)
    }

    /// Monitors events raised by `node`.
    ///
    /// Resolves to `None` when the node cannot raise events.
    pub fn add_event_monitor(&self, node: &Node) -> UaResult<Completion<Option<EventMonitor>>> {
        self.add_monitor(node, MonitorReply::Event)
    }

    fn add_monitor<T>(
        &self,
        node: &Node,
        wrap: impl FnOnce(Reply<Option<T>>) -> MonitorReply,
    ) -> UaResult<Completion<Option<T>>> {
        if !node.is_live() {
            return Err(StateError::StaleNode {
                index: node.key().index(),
                generation: node.key().generation(),
            }
            .into());
        }
        let owner = self.owner.clone();
        self.owner.submit(|reply| Command::AddMonitor {
            subscription: self.id,
            node: node.id().clone(),
            owner,
            reply: wrap(reply),
        })
    }

    /// Deletes the subscription and all of its monitors.
    pub fn delete(&self) -> UaResult<Completion<()>> {
        self.owner.submit(|reply| Command::DeleteSubscription { id: self.id, reply })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("interval_ms", &self.interval_ms)
            .finish()
    }
}

macro_rules! monitor_handle {
    ($(#[$doc:meta])* $name:ident, $notification:ty) => {
        $(#[$doc])*
        pub struct $name {
            item_id: u32,
            subscription_id: u32,
            node: NodeId,
            receiver: mpsc::Receiver<$notification>,
            owner: ClientInner,
        }

        impl $name {
            pub(crate) fn new(
                item_id: u32,
                subscription_id: u32,
                node: NodeId,
                receiver: mpsc::Receiver<$notification>,
                owner: ClientInner,
            ) -> Self {
                Self {
                    item_id,
                    subscription_id,
                    node,
                    receiver,
                    owner,
                }
            }

            /// Monitored item id.
            pub fn item_id(&self) -> u32 {
                self.item_id
            }

            /// Owning subscription.
            pub fn subscription_id(&self) -> u32 {
                self.subscription_id
            }

            /// Monitored node.
            pub fn node(&self) -> &NodeId {
                &self.node
            }

            /// Waits for the next notification.
            ///
            /// Returns `None` once the monitor is removed or torn down and
            /// every queued notification has been received.
            pub async fn recv(&mut self) -> Option<$notification> {
                self.receiver.recv().await
            }

            /// Takes a queued notification without waiting.
            pub fn try_recv(&mut self) -> Option<$notification> {
                self.receiver.try_recv().ok()
            }

            /// Stops monitoring. Notifications already queued stay readable.
            pub fn remove(&self) -> UaResult<Completion<()>> {
                self.owner.submit(|reply| Command::RemoveMonitor {
                    item_id: self.item_id,
                    reply,
                })
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("item_id", &self.item_id)
                    .field("subscription_id", &self.subscription_id)
                    .field("node", &self.node)
                    .finish()
            }
        }
    };
}

monitor_handle!(
    /// Receives [`DataChange`]s for one node.
    ValueMonitor,
    DataChange
);

monitor_handle!(
    /// Receives [`EventNotification`]s from one notifier.
    EventMonitor,
    EventNotification
);

// =============================================================================
// SubscriptionEngine
// =============================================================================

/// Where a monitored item's notifications go.
pub(crate) enum Sink {
    DataChange(mpsc::Sender<DataChange>),
    Event(mpsc::Sender<EventNotification>),
}

impl Sink {
    pub(crate) fn kind(&self) -> MonitorKind {
        match self {
            Self::DataChange(_) => MonitorKind::DataChange,
            Self::Event(_) => MonitorKind::Event,
        }
    }
}

struct SubscriptionEntry {
    interval_ms: u32,
    items: BTreeSet<u32>,
}

struct ItemEntry {
    subscription: u32,
    node: NodeId,
    sink: Sink,
}

/// Tick source for one interval, shared by every subscription on it.
struct IntervalDriver {
    subscriptions: usize,
    pending: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl IntervalDriver {
    fn spawn(interval_ms: u32, ticks: mpsc::WeakUnboundedSender<Command>) -> Self {
        let pending = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&pending);
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_millis(u64::from(interval_ms)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer.tick().await;
            loop {
                timer.tick().await;
                let Some(sender) = ticks.upgrade() else {
                    break;
                };
                // skip while the previous tick is still queued
                if flag.swap(true, Ordering::AcqRel) {
                    continue;
                }
                if sender.send(Command::Tick { interval_ms }).is_err() {
                    break;
                }
            }
        });
        Self {
            subscriptions: 1,
            pending,
            task,
        }
    }
}

impl Drop for IntervalDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscription bookkeeping and notification dispatch.
pub(crate) struct SubscriptionEngine {
    ticks: mpsc::WeakUnboundedSender<Command>,
    min_interval_ms: u32,
    next_subscription_id: u32,
    next_item_id: u32,
    subscriptions: HashMap<u32, SubscriptionEntry>,
    items: HashMap<u32, ItemEntry>,
    drivers: BTreeMap<u32, IntervalDriver>,
}

impl SubscriptionEngine {
    pub(crate) fn new(ticks: mpsc::WeakUnboundedSender<Command>, min_interval_ms: u32) -> Self {
        Self {
            ticks,
            min_interval_ms,
            next_subscription_id: 1,
            next_item_id: 1,
            subscriptions: HashMap::new(),
            items: HashMap::new(),
            drivers: BTreeMap::new(),
        }
    }

    /// Creates a subscription; returns its id and revised interval.
    pub(crate) fn create(&mut self, requested_ms: u32) -> (u32, u32) {
        let interval_ms = requested_ms.max(self.min_interval_ms);
        let id = self.next_subscription_id;
        self.next_subscription_id = self.next_subscription_id.wrapping_add(1);

        self.subscriptions.insert(
            id,
            SubscriptionEntry {
                interval_ms,
                items: BTreeSet::new(),
            },
        );
        match self.drivers.get_mut(&interval_ms) {
            Some(driver) => driver.subscriptions += 1,
            None => {
                tracing::debug!(interval_ms, "Starting interval driver");
                self.drivers
                    .insert(interval_ms, IntervalDriver::spawn(interval_ms, self.ticks.clone()));
            }
        }

        tracing::info!(
            subscription_id = id,
            requested_ms,
            interval_ms,
            "Subscription created"
        );
        (id, interval_ms)
    }

    pub(crate) fn interval_of(&self, id: u32) -> Result<u32, StateError> {
        self.subscriptions
            .get(&id)
            .map(|entry| entry.interval_ms)
            .ok_or(StateError::SubscriptionDeleted { id })
    }

    pub(crate) fn allocate_item_id(&mut self) -> u32 {
        let id = self.next_item_id;
        self.next_item_id = self.next_item_id.wrapping_add(1);
        id
    }

    pub(crate) fn register(
        &mut self,
        subscription: u32,
        item_id: u32,
        node: NodeId,
        sink: Sink,
    ) -> Result<(), StateError> {
        let entry = self
            .subscriptions
            .get_mut(&subscription)
            .ok_or(StateError::SubscriptionDeleted { id: subscription })?;
        entry.items.insert(item_id);
        tracing::debug!(
            subscription_id = subscription,
            item_id,
            node = %node,
            kind = %sink.kind(),
            "Monitored item added"
        );
        self.items.insert(
            item_id,
            ItemEntry {
                subscription,
                node,
                sink,
            },
        );
        Ok(())
    }

    /// Forgets an item. Dropping its sink ends the monitor's stream once
    /// queued notifications are read.
    pub(crate) fn remove_item(&mut self, item_id: u32) -> Result<(), StateError> {
        let item = self
            .items
            .remove(&item_id)
            .ok_or(StateError::MonitorRemoved { id: item_id })?;
        if let Some(entry) = self.subscriptions.get_mut(&item.subscription) {
            entry.items.remove(&item_id);
        }
        tracing::debug!(item_id, node = %item.node, "Monitored item removed");
        Ok(())
    }

    /// Deletes a subscription; returns the item ids it owned.
    pub(crate) fn delete(&mut self, id: u32) -> Result<Vec<u32>, StateError> {
        let entry = self
            .subscriptions
            .remove(&id)
            .ok_or(StateError::SubscriptionDeleted { id })?;
        for item_id in &entry.items {
            self.items.remove(item_id);
        }
        self.release_driver(entry.interval_ms);
        tracing::info!(
            subscription_id = id,
            items = entry.items.len(),
            "Subscription deleted"
        );
        Ok(entry.items.into_iter().collect())
    }

    fn release_driver(&mut self, interval_ms: u32) {
        if let Some(driver) = self.drivers.get_mut(&interval_ms) {
            driver.subscriptions = driver.subscriptions.saturating_sub(1);
            if driver.subscriptions == 0 {
                self.drivers.remove(&interval_ms);
                tracing::debug!(interval_ms, "Interval driver stopped");
            }
        }
    }

    /// Drops every subscription, item and driver; returns how many
    /// subscriptions were dropped.
    pub(crate) fn teardown(&mut self) -> usize {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        self.items.clear();
        self.drivers.clear();
        if count > 0 {
            tracing::info!(subscriptions = count, "Subscriptions torn down");
        }
        count
    }

    /// Marks the interval's tick as taken off the queue.
    pub(crate) fn tick_serviced(&self, interval_ms: u32) {
        if let Some(driver) = self.drivers.get(&interval_ms) {
            driver.pending.store(false, Ordering::Release);
        }
    }

    /// Items of every subscription on `interval_ms`, in id order.
    pub(crate) fn items_for_interval(&self, interval_ms: u32) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .subscriptions
            .values()
            .filter(|entry| entry.interval_ms == interval_ms)
            .flat_map(|entry| entry.items.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Delivers notifications to their monitors; returns how many were
    /// delivered.
    pub(crate) fn dispatch(&self, notifications: Vec<Notification>) -> usize {
        let mut delivered = 0;
        for notification in notifications {
            let item_id = notification.item_id;
            let Some(item) = self.items.get(&item_id) else {
                tracing::trace!(item_id, "Notification for removed item dropped");
                continue;
            };
            let result = match (&item.sink, notification.payload) {
                (Sink::DataChange(sink), NotificationPayload::DataChange(data)) => {
                    let value = match data.value.as_ref().map(ValueCodec::decode).transpose() {
                        Ok(value) => value.unwrap_or(Value::Null),
                        Err(err) => {
                            tracing::warn!(item_id, node = %item.node, error = %err, "Data change not decodable");
                            continue;
                        }
                    };
                    offer(
                        sink,
                        DataChange {
                            value,
                            status: data.status,
                            source_timestamp: data.source_timestamp.unwrap_or_else(Utc::now),
                        },
                    )
                }
                (Sink::Event(sink), NotificationPayload::Event(fields)) => {
                    let fields = fields
                        .iter()
                        .map(|field| {
                            ValueCodec::decode(field).unwrap_or_else(|err| {
                                tracing::warn!(item_id, error = %err, "Event field not decodable");
                                Value::Null
                            })
                        })
                        .collect();
                    offer(
                        sink,
                        EventNotification {
                            fields,
                            received_at: Utc::now(),
                        },
                    )
                }
                (sink, _) => {
                    tracing::warn!(item_id, expected = %sink.kind(), "Notification kind mismatch");
                    continue;
                }
            };
            match result {
                Ok(()) => delivered += 1,
                Err(Offer::Full) => {
                    tracing::warn!(item_id, node = %item.node, "Monitor buffer full, notification dropped");
                }
                Err(Offer::Closed) => {
                    tracing::trace!(item_id, "Monitor receiver dropped");
                }
            }
        }
        delivered
    }

    /// Distinct intervals with their subscription counts.
    pub(crate) fn active_intervals(&self) -> Vec<(u32, usize)> {
        self.drivers
            .iter()
            .map(|(interval, driver)| (*interval, driver.subscriptions))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

enum Offer {
    Full,
    Closed,
}

fn offer<T>(sink: &mpsc::Sender<T>, notification: T) -> Result<(), Offer> {
    sink.try_send(notification).map_err(|err| match err {
        TrySendError::Full(_) => Offer::Full,
        TrySendError::Closed(_) => Offer::Closed,
    })
}
