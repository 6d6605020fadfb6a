// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The per-client worker task.
//!
//! The worker owns the backend connection and the subscription engine and
//! processes [`Command`]s one at a time, so operations complete in the
//! order they were submitted. A backend call in flight is raced against
//! the client leaving [`ClientState::Connected`]; a disconnect therefore
//! fails pending work promptly instead of waiting on the backend.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use ualink_core::{
    AttributeId, AttributeMask, AttributeSet, NodeId, StatusCode, UaError, UaResult, Value,
    WireVariant,
};

use crate::attribute_service::AttributeService;
use crate::backend::{BackendConnection, BackendError, MonitorKind, Request, Response};
use crate::client::{ClientError, ClientInner, ClientState, ClientStatus, SharedState};
use crate::completion::Reply;
use crate::endpoint::Endpoint;
use crate::node::NodeKey;
use crate::subscription::{EventMonitor, Sink, Subscription, SubscriptionEngine, ValueMonitor};

// =============================================================================
// Commands
// =============================================================================

/// One attribute write, with the original value for the cache.
#[derive(Debug, Clone)]
pub(crate) struct WriteItem {
    pub(crate) attribute: AttributeId,
    pub(crate) value: Value,
    pub(crate) wire: WireVariant,
}

pub(crate) enum WriteReply {
    Single(Reply<StatusCode>),
    Many(Reply<Vec<(AttributeId, StatusCode)>>),
}

pub(crate) enum MonitorReply {
    Value(Reply<Option<ValueMonitor>>),
    Event(Reply<Option<EventMonitor>>),
}

/// Work for the worker.
pub(crate) enum Command {
    Connect {
        endpoint: Endpoint,
        reply: Reply<()>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    Read {
        key: NodeKey,
        node: NodeId,
        attributes: AttributeMask,
        reply: Reply<AttributeSet>,
    },
    Write {
        key: NodeKey,
        node: NodeId,
        items: Vec<WriteItem>,
        reply: WriteReply,
    },
    Browse {
        node: NodeId,
        reply: Reply<Vec<NodeId>>,
    },
    Call {
        object: NodeId,
        method: NodeId,
        arguments: Vec<WireVariant>,
        reply: Reply<Vec<Value>>,
    },
    CreateSubscription {
        interval_ms: u32,
        owner: ClientInner,
        reply: Reply<Subscription>,
    },
    DeleteSubscription {
        id: u32,
        reply: Reply<()>,
    },
    AddMonitor {
        subscription: u32,
        node: NodeId,
        owner: ClientInner,
        reply: MonitorReply,
    },
    RemoveMonitor {
        item_id: u32,
        reply: Reply<()>,
    },
    ActiveIntervals {
        reply: Reply<Vec<(u32, usize)>>,
    },
    /// Sent by interval drivers.
    Tick {
        interval_ms: u32,
    },
}

// =============================================================================
// Worker
// =============================================================================

pub(crate) struct Worker {
    backend: Box<dyn BackendConnection>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Receiver<ClientStatus>,
    shared: Arc<SharedState>,
    engine: SubscriptionEngine,
}

impl Worker {
    pub(crate) fn new(
        backend: Box<dyn BackendConnection>,
        commands: mpsc::UnboundedReceiver<Command>,
        ticks: mpsc::WeakUnboundedSender<Command>,
        shared: Arc<SharedState>,
    ) -> Self {
        let engine = SubscriptionEngine::new(ticks, shared.config.min_sampling_interval_ms);
        Self {
            backend,
            commands,
            status: shared.watch(),
            shared,
            engine,
        }
    }

    /// Processes commands until every client handle is gone.
    pub(crate) async fn run(mut self) {
        tracing::debug!(backend = self.backend.name(), "Client worker started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }

        self.engine.teardown();
        if self.shared.state() != ClientState::Disconnected {
            if let Err(err) = self.backend.close().await {
                tracing::warn!(error = %err, "Backend close failed during shutdown");
            }
            self.shared.update(|status| {
                status.state = ClientState::Disconnected;
                true
            });
        }
        tracing::debug!(backend = self.backend.name(), "Client worker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { endpoint, reply } => {
                let result = self.connect(endpoint).await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(Ok(()));
            }
            Command::Read {
                key,
                node,
                attributes,
                reply,
            } => {
                let result = self.read(key, &node, attributes).await;
                let _ = reply.send(result);
            }
            Command::Write {
                key,
                node,
                items,
                reply,
            } => {
                let result = self.write(key, &node, items).await;
                match reply {
                    WriteReply::Single(tx) => {
                        let single = result.and_then(|statuses| {
                            statuses
                                .into_iter()
                                .next()
                                .map(|(_, status)| status)
                                .ok_or_else(|| UaError::protocol(format!("write of {node}: no result")))
                        });
                        let _ = tx.send(single);
                    }
                    WriteReply::Many(tx) => {
                        let _ = tx.send(result);
                    }
                }
            }
            Command::Browse { node, reply } => {
                let result = self.browse(&node).await;
                let _ = reply.send(result);
            }
            Command::Call {
                object,
                method,
                arguments,
                reply,
            } => {
                let result = self.call(object, method, arguments).await;
                let _ = reply.send(result);
            }
            Command::CreateSubscription {
                interval_ms,
                owner,
                reply,
            } => {
                let result = self
                    .require_connected()
                    .map(|()| self.engine.create(interval_ms))
                    .map(|(id, revised)| Subscription::new(id, revised, owner));
                let _ = reply.send(result);
            }
            Command::DeleteSubscription { id, reply } => {
                let result = self.delete_subscription(id).await;
                let _ = reply.send(result);
            }
            Command::AddMonitor {
                subscription,
                node,
                owner,
                reply,
            } => self.add_monitor(subscription, node, owner, reply).await,
            Command::RemoveMonitor { item_id, reply } => {
                let result = self.remove_monitor(item_id).await;
                let _ = reply.send(result);
            }
            Command::ActiveIntervals { reply } => {
                let _ = reply.send(Ok(self.engine.active_intervals()));
            }
            Command::Tick { interval_ms } => self.tick(interval_ms).await,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    async fn connect(&mut self, endpoint: Endpoint) -> UaResult<()> {
        tracing::info!(endpoint = %endpoint, backend = self.backend.name(), "Connecting");

        match self.backend.open(&endpoint).await {
            Ok(()) => {
                self.shared.update(|status| {
                    if status.state != ClientState::Connecting {
                        return false;
                    }
                    status.state = ClientState::Connected;
                    status.error = ClientError::NoError;
                    true
                });
                Ok(())
            }
            Err(err) => {
                let error = match err {
                    BackendError::AccessDenied { .. } => ClientError::AccessDenied,
                    _ => ClientError::ConnectionError,
                };
                self.shared.update(|status| {
                    status.state = ClientState::Disconnected;
                    status.error = error;
                    true
                });
                let err = err.into_ua_error(&endpoint.to_string());
                err.log("connect");
                Err(err)
            }
        }
    }

    async fn disconnect(&mut self) {
        // the session may already be gone after a connection loss
        if self.shared.state() != ClientState::Closing {
            return;
        }
        self.engine.teardown();
        if let Err(err) = self.backend.close().await {
            tracing::warn!(error = %err, "Backend close failed");
        }
        self.shared.update(|status| {
            status.state = ClientState::Disconnected;
            status.error = ClientError::NoError;
            true
        });
    }

    fn connection_lost(&mut self, err: &BackendError) {
        tracing::error!(error = %err, "Connection lost");
        self.engine.teardown();
        self.shared.update(|status| {
            if !matches!(status.state, ClientState::Connected | ClientState::Closing) {
                return false;
            }
            status.state = ClientState::Disconnected;
            status.error = ClientError::ConnectionError;
            true
        });
    }

    fn require_connected(&self) -> UaResult<()> {
        match self.shared.state() {
            ClientState::Connected => Ok(()),
            ClientState::Closing => Err(UaError::connection_closed()),
            ClientState::Disconnected | ClientState::Connecting => Err(UaError::not_connected()),
        }
    }

    /// Sends a request unless the client leaves the connected state first.
    async fn execute(&mut self, request: Request) -> UaResult<Response> {
        self.require_connected()?;
        let operation = request.operation();
        let outcome = tokio::select! {
            biased;
            _ = left_connected(&mut self.status) => return Err(UaError::connection_closed()),
            outcome = self.backend.send_request(request) => outcome,
        };
        match outcome {
            Ok(response) => Ok(response),
            Err(err) => {
                if err.is_fatal() {
                    self.connection_lost(&err);
                }
                Err(err.into_ua_error(operation))
            }
        }
    }

    // =========================================================================
    // Attribute operations
    // =========================================================================

    async fn read(
        &mut self,
        key: NodeKey,
        node: &NodeId,
        attributes: AttributeMask,
    ) -> UaResult<AttributeSet> {
        self.require_connected()?;
        if attributes.is_empty() {
            return Ok(AttributeSet::new());
        }
        let response = self
            .execute(AttributeService::read_request(node, attributes))
            .await?;
        let set = AttributeService::read_result(node, attributes, response)?;

        if let Ok(entry) = self.shared.nodes.lock().get_mut(key) {
            entry.attributes.merge(set.clone());
        }
        tracing::trace!(node = %node, attributes = set.len(), "Read completed");
        Ok(set)
    }

    async fn write(
        &mut self,
        key: NodeKey,
        node: &NodeId,
        items: Vec<WriteItem>,
    ) -> UaResult<Vec<(AttributeId, StatusCode)>> {
        let attributes: Vec<AttributeId> = items.iter().map(|item| item.attribute).collect();
        let request = Request::Write {
            node: node.clone(),
            values: items
                .iter()
                .map(|item| (item.attribute, item.wire.clone()))
                .collect(),
        };
        let response = self.execute(request).await?;
        let results = AttributeService::write_result(node, &attributes, response)?;

        if let Ok(entry) = self.shared.nodes.lock().get_mut(key) {
            for (item, (_, status)) in items.into_iter().zip(&results) {
                if status.is_good() {
                    entry
                        .attributes
                        .insert(item.attribute, Some(item.value), *status);
                }
            }
        }
        for (attribute, status) in &results {
            if !status.is_good() {
                tracing::debug!(node = %node, attribute = %attribute, status = %status, "Write rejected");
            }
        }
        Ok(results)
    }

    async fn browse(&mut self, node: &NodeId) -> UaResult<Vec<NodeId>> {
        let response = self
            .execute(Request::Browse { node: node.clone() })
            .await?;
        AttributeService::browse_result(node, response)
    }

    async fn call(
        &mut self,
        object: NodeId,
        method: NodeId,
        arguments: Vec<WireVariant>,
    ) -> UaResult<Vec<Value>> {
        let context = method.clone();
        let response = self
            .execute(Request::Call {
                object,
                method,
                arguments,
            })
            .await?;
        AttributeService::call_result(&context, response)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn delete_subscription(&mut self, id: u32) -> UaResult<()> {
        let items = self.engine.delete(id)?;
        if !items.is_empty() {
            if let Err(err) = self
                .execute(Request::DeleteMonitoredItems { item_ids: items })
                .await
            {
                tracing::warn!(subscription_id = id, error = %err, "Server-side item cleanup failed");
            }
        }
        Ok(())
    }

    async fn add_monitor(
        &mut self,
        subscription: u32,
        node: NodeId,
        owner: ClientInner,
        reply: MonitorReply,
    ) {
        let buffer = self.shared.config.notification_buffer;
        match reply {
            MonitorReply::Value(tx) => {
                let (sink, receiver) = mpsc::channel(buffer);
                let result = self
                    .create_item(subscription, &node, Sink::DataChange(sink))
                    .await
                    .map(|created| {
                        created.map(|item_id| {
                            ValueMonitor::new(item_id, subscription, node, receiver, owner)
                        })
                    });
                let _ = tx.send(result);
            }
            MonitorReply::Event(tx) => {
                let (sink, receiver) = mpsc::channel(buffer);
                let result = self
                    .create_item(subscription, &node, Sink::Event(sink))
                    .await
                    .map(|created| {
                        created.map(|item_id| {
                            EventMonitor::new(item_id, subscription, node, receiver, owner)
                        })
                    });
                let _ = tx.send(result);
            }
        }
    }

    /// Creates the item at the server and registers it; `None` when the
    /// server rejects it.
    async fn create_item(
        &mut self,
        subscription: u32,
        node: &NodeId,
        sink: Sink,
    ) -> UaResult<Option<u32>> {
        let interval_ms = self.engine.interval_of(subscription)?;
        let kind: MonitorKind = sink.kind();
        let item_id = self.engine.allocate_item_id();

        let response = self
            .execute(Request::CreateMonitoredItem {
                item_id,
                node: node.clone(),
                kind,
                sampling_interval_ms: interval_ms,
            })
            .await?;
        let status = match response {
            Response::MonitoredItemCreated(status) => status,
            other => {
                return Err(UaError::protocol(format!(
                    "monitor of {node} answered with a {} response",
                    other.operation()
                )))
            }
        };
        if !status.is_good() {
            tracing::debug!(node = %node, kind = %kind, status = %status, "Monitored item rejected");
            return Ok(None);
        }

        self.engine.register(subscription, item_id, node.clone(), sink)?;
        Ok(Some(item_id))
    }

    async fn remove_monitor(&mut self, item_id: u32) -> UaResult<()> {
        self.engine.remove_item(item_id)?;
        if let Err(err) = self
            .execute(Request::DeleteMonitoredItems {
                item_ids: vec![item_id],
            })
            .await
        {
            tracing::warn!(item_id, error = %err, "Server-side item cleanup failed");
        }
        Ok(())
    }

    async fn tick(&mut self, interval_ms: u32) {
        self.engine.tick_serviced(interval_ms);
        if self.shared.state() != ClientState::Connected {
            return;
        }
        let items = self.engine.items_for_interval(interval_ms);
        if items.is_empty() {
            return;
        }

        let polled = tokio::select! {
            biased;
            _ = left_connected(&mut self.status) => return,
            polled = self.backend.poll_notifications(&items) => polled,
        };
        match polled {
            Ok(notifications) if notifications.is_empty() => {}
            Ok(notifications) => {
                let received = notifications.len();
                let delivered = self.engine.dispatch(notifications);
                tracing::trace!(interval_ms, received, delivered, "Notifications dispatched");
            }
            Err(err) => {
                tracing::warn!(
                    interval_ms,
                    error = %err,
                    "Notification poll failed, retrying on next tick"
                );
            }
        }
    }
}

/// Resolves once the client is no longer connected.
async fn left_connected(status: &mut watch::Receiver<ClientStatus>) {
    loop {
        if status.borrow_and_update().state != ClientState::Connected {
            return;
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}
