// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node handles and the node arena.
//!
//! Every [`Node`] handle is a key into a generational arena owned by the
//! client. The arena slot holds the node id and the attribute cache that
//! reads and successful writes keep up to date. The slot is released when
//! the last clone of a handle drops, or earlier through [`Node::dispose`].
//! Releasing bumps the slot generation, so copies of a disposed handle
//! become stale instead of silently aliasing whatever reuses the slot.

use std::fmt;
use std::sync::Arc;

use ualink_core::{
    AttributeId, AttributeMap, AttributeMask, AttributeSet, NodeClass, NodeId, StateError,
    StatusCode, TypeTag, UaResult, Value, ValueCodec, WireVariant,
};

use crate::attribute_service::AttributeService;
use crate::client::ClientInner;
use crate::completion::{Completion, Reply};
use crate::worker::{Command, WriteItem, WriteReply};

// =============================================================================
// NodeArena
// =============================================================================

/// Arena key: slot index plus the generation it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

impl NodeKey {
    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn stale(self) -> StateError {
        StateError::StaleNode {
            index: self.index,
            generation: self.generation,
        }
    }
}

/// What the arena stores per live node.
#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    pub(crate) id: NodeId,
    pub(crate) attributes: AttributeSet,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<NodeEntry>,
}

/// Generational storage for node entries.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: NodeId) -> NodeKey {
        let entry = NodeEntry {
            id,
            attributes: AttributeSet::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return NodeKey {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        NodeKey {
            index,
            generation: 0,
        }
    }

    fn slot(&self, key: NodeKey) -> Option<&Slot> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
    }

    pub(crate) fn get(&self, key: NodeKey) -> Result<&NodeEntry, StateError> {
        self.slot(key)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or_else(|| key.stale())
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Result<&mut NodeEntry, StateError> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or_else(|| key.stale())
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> Result<NodeEntry, StateError> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .ok_or_else(|| key.stale())?;
        let entry = slot.entry.take().ok_or_else(|| key.stale())?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Ok(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }
}

// =============================================================================
// Node
// =============================================================================

/// Owns one arena slot; frees it on drop unless already disposed.
struct NodeHandle {
    key: NodeKey,
    id: NodeId,
    owner: ClientInner,
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        // Stale after dispose.
        if self.owner.shared.nodes.lock().remove(self.key).is_ok() {
            tracing::trace!(node = %self.id, "Node released");
        }
    }
}

/// Handle to one node of the server address space.
///
/// Handles are cheap to clone; all clones share the same attribute cache.
#[derive(Clone)]
pub struct Node {
    handle: Arc<NodeHandle>,
}

impl Node {
    pub(crate) fn new(key: NodeKey, id: NodeId, owner: ClientInner) -> Self {
        Self {
            handle: Arc::new(NodeHandle { key, id, owner }),
        }
    }

    /// The node id.
    pub fn id(&self) -> &NodeId {
        &self.handle.id
    }

    /// The arena key.
    pub fn key(&self) -> NodeKey {
        self.handle.key
    }

    fn owner(&self) -> &ClientInner {
        &self.handle.owner
    }

    /// Returns `false` once the node has been disposed.
    pub fn is_live(&self) -> bool {
        self.owner().shared.nodes.lock().get(self.key()).is_ok()
    }

    fn ensure_live(&self) -> UaResult<()> {
        self.owner().shared.nodes.lock().get(self.key())?;
        Ok(())
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    /// Reads the attributes in `attributes`.
    ///
    /// The result carries exactly the requested attributes, each with its
    /// own status. An unknown node is not an error: every attribute comes
    /// back with `BadNodeIdUnknown`.
    pub fn read(&self, attributes: AttributeMask) -> UaResult<Completion<AttributeSet>> {
        self.ensure_live()?;
        self.owner().submit(|reply| Command::Read {
            key: self.key(),
            node: self.id().clone(),
            attributes,
            reply,
        })
    }

    /// Writes one attribute.
    ///
    /// `value_type` selects the wire type of the Value attribute; other
    /// attributes always use their fixed type.
    ///
    /// # Errors
    ///
    /// Encoding failures are returned here, before anything is sent.
    pub fn write(
        &self,
        attribute: AttributeId,
        value: Value,
        value_type: Option<TypeTag>,
    ) -> UaResult<Completion<StatusCode>> {
        self.ensure_live()?;
        let wire = AttributeService::encode_write(attribute, &value, value_type)?;
        self.submit_write(
            vec![WriteItem {
                attribute,
                value,
                wire,
            }],
            WriteReply::Single,
        )
    }

    /// Writes the Value attribute.
    pub fn write_value(
        &self,
        value: Value,
        value_type: Option<TypeTag>,
    ) -> UaResult<Completion<StatusCode>> {
        self.write(AttributeId::Value, value, value_type)
    }

    /// Writes several attributes in one request, in attribute order.
    ///
    /// # Errors
    ///
    /// If any value fails to encode, nothing is sent.
    pub fn write_many(
        &self,
        values: AttributeMap,
        value_type: Option<TypeTag>,
    ) -> UaResult<Completion<Vec<(AttributeId, StatusCode)>>> {
        self.ensure_live()?;
        let items = values
            .into_iter()
            .map(|(attribute, value)| -> UaResult<WriteItem> {
                let wire = AttributeService::encode_write(attribute, &value, value_type)?;
                Ok(WriteItem {
                    attribute,
                    value,
                    wire,
                })
            })
            .collect::<UaResult<Vec<_>>>()?;
        self.submit_write(items, WriteReply::Many)
    }

    fn submit_write<T>(
        &self,
        items: Vec<WriteItem>,
        wrap: impl FnOnce(Reply<T>) -> WriteReply,
    ) -> UaResult<Completion<T>> {
        self.owner().submit(|reply| Command::Write {
            key: self.key(),
            node: self.id().clone(),
            items,
            reply: wrap(reply),
        })
    }

    /// Lists the ids of child nodes.
    pub fn children(&self) -> UaResult<Completion<Vec<NodeId>>> {
        self.ensure_live()?;
        self.owner().submit(|reply| Command::Browse {
            node: self.id().clone(),
            reply,
        })
    }

    /// Calls a method on this node.
    ///
    /// # Errors
    ///
    /// A malformed method address or an argument that fails to encode is
    /// returned here.
    pub fn call(
        &self,
        method: &str,
        arguments: &[(Value, Option<TypeTag>)],
    ) -> UaResult<Completion<Vec<Value>>> {
        self.ensure_live()?;
        let method = NodeId::parse(method)?;
        let arguments = arguments
            .iter()
            .map(|(value, tag)| ValueCodec::encode(value, *tag))
            .collect::<Result<Vec<WireVariant>, _>>()?;
        self.owner().submit(|reply| Command::Call {
            object: self.id().clone(),
            method,
            arguments,
            reply,
        })
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Cached value of `attribute` from the last read or write.
    pub fn attribute(&self, attribute: AttributeId) -> UaResult<Option<Value>> {
        let nodes = self.owner().shared.nodes.lock();
        Ok(nodes.get(self.key())?.attributes.value(attribute).cloned())
    }

    /// Cached status of `attribute`.
    pub fn attribute_status(&self, attribute: AttributeId) -> UaResult<Option<StatusCode>> {
        let nodes = self.owner().shared.nodes.lock();
        Ok(nodes.get(self.key())?.attributes.status(attribute))
    }

    /// Copy of the whole cache.
    pub fn cached_attributes(&self) -> UaResult<AttributeSet> {
        let nodes = self.owner().shared.nodes.lock();
        Ok(nodes.get(self.key())?.attributes.clone())
    }

    /// Node class from the cache, once NodeClass has been read.
    pub fn node_class(&self) -> UaResult<Option<NodeClass>> {
        Ok(self
            .attribute(AttributeId::NodeClass)?
            .as_ref()
            .and_then(NodeClass::from_attribute))
    }

    /// Releases the arena slot now. Every clone of this handle becomes stale.
    pub fn dispose(self) -> UaResult<()> {
        let removed = self.owner().shared.nodes.lock().remove(self.key());
        let entry = removed?;
        tracing::trace!(node = %entry.id, "Node disposed");
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", self.id())
            .field("key", &self.key())
            .finish()
    }
}
