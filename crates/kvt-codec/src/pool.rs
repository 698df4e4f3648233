//! Per-call arena for store value nodes.
//!
//! A [`StaticPool`] hands out [`NodeId`] indices instead of heap-owned
//! children. Nodes are linked by index while a container is walked and only
//! materialized into an owned [`StoreValue`] tree by [`StaticPool::take`].
//! Whatever is left in the arena is freed in one go when the pool drops, so an
//! aborted walk never leaves half-built values behind.

use std::mem;

use kvt_types::{CodecError, CodecResult, StoreValue};
use tracing::trace;

/// Index of a node inside a [`StaticPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
enum Node {
    Leaf(StoreValue),
    List(Vec<NodeId>),
    Map(Vec<(StoreValue, NodeId)>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    /// Allocated, not yet linked anywhere.
    Free,
    /// Linked under a parent node.
    Attached,
    /// Moved out by `take`.
    Taken,
}

#[derive(Debug)]
struct Slot {
    node: Node,
    state: SlotState,
}

/// Counters describing what a pool did during one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: usize,
    pub attached: usize,
    pub taken: usize,
    pub limit: usize,
}

impl PoolStats {
    /// Nodes that were allocated but never linked into an output tree.
    pub fn released(&self) -> usize {
        self.allocated - self.attached - self.taken
    }
}

/// Arena of store value nodes scoped to a single transcoding call.
#[derive(Debug)]
pub struct StaticPool {
    slots: Vec<Slot>,
    limit: usize,
    attached: usize,
    taken: usize,
}

impl StaticPool {
    /// Create a pool with room for `capacity` nodes up front and a hard cap of
    /// `limit` nodes in total.
    pub fn new(capacity: usize, limit: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(limit)),
            limit,
            attached: 0,
            taken: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.slots.len(),
            attached: self.attached,
            taken: self.taken,
            limit: self.limit,
        }
    }

    fn alloc(&mut self, node: Node) -> CodecResult<NodeId> {
        if self.slots.len() >= self.limit {
            return Err(CodecError::client(format!(
                "static pool exhausted: limit of {} nodes reached",
                self.limit
            )));
        }
        let id = u32::try_from(self.slots.len())
            .map_err(|_| CodecError::client("static pool index overflow"))?;
        self.slots.push(Slot {
            node,
            state: SlotState::Free,
        });
        Ok(NodeId(id))
    }

    pub fn alloc_leaf(&mut self, value: StoreValue) -> CodecResult<NodeId> {
        self.alloc(Node::Leaf(value))
    }

    pub fn alloc_list(&mut self, capacity: usize) -> CodecResult<NodeId> {
        self.alloc(Node::List(Vec::with_capacity(capacity)))
    }

    pub fn alloc_map(&mut self, capacity: usize) -> CodecResult<NodeId> {
        self.alloc(Node::Map(Vec::with_capacity(capacity)))
    }

    fn slot_mut(&mut self, id: NodeId) -> CodecResult<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .ok_or_else(|| CodecError::client(format!("unknown pool node {}", id.0)))
    }

    /// Mark `child` as linked. A node can have at most one parent.
    fn claim(&mut self, child: NodeId) -> CodecResult<()> {
        let slot = self.slot_mut(child)?;
        if slot.state != SlotState::Free {
            return Err(CodecError::client(format!(
                "pool node {} is already attached",
                child.0
            )));
        }
        slot.state = SlotState::Attached;
        self.attached += 1;
        Ok(())
    }

    /// Check that `parent` is a container of the expected shape and `child`
    /// is free to be linked under it.
    fn check_link(&self, parent: NodeId, child: NodeId, want_list: bool) -> CodecResult<()> {
        if parent == child {
            return Err(CodecError::client("pool node cannot contain itself"));
        }
        let slot = self
            .slots
            .get(parent.index())
            .ok_or_else(|| CodecError::client(format!("unknown pool node {}", parent.0)))?;
        match (&slot.node, want_list) {
            (Node::List(_), true) | (Node::Map(_), false) => Ok(()),
            (_, true) => Err(CodecError::client(format!("pool node {} is not a list", parent.0))),
            (_, false) => Err(CodecError::client(format!("pool node {} is not a map", parent.0))),
        }
    }

    /// Append `child` to the list node `parent`.
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> CodecResult<()> {
        self.check_link(parent, child, true)?;
        self.claim(child)?;
        if let Node::List(children) = &mut self.slot_mut(parent)?.node {
            children.push(child);
        }
        Ok(())
    }

    /// Associate `child` under `key` in the map node `parent`.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        key: StoreValue,
        child: NodeId,
    ) -> CodecResult<()> {
        self.check_link(parent, child, false)?;
        self.claim(child)?;
        if let Node::Map(entries) = &mut self.slot_mut(parent)?.node {
            entries.push((key, child));
        }
        Ok(())
    }

    /// Move the tree rooted at `root` out of the pool as an owned value.
    ///
    /// `root` must not be attached under another node.
    pub fn take(&mut self, root: NodeId) -> CodecResult<StoreValue> {
        let slot = self.slot_mut(root)?;
        if slot.state != SlotState::Free {
            return Err(CodecError::client(format!(
                "pool node {} is not a free root",
                root.0
            )));
        }
        slot.state = SlotState::Taken;
        self.taken += 1;
        self.materialize(root)
    }

    fn materialize(&mut self, id: NodeId) -> CodecResult<StoreValue> {
        let node = mem::replace(&mut self.slot_mut(id)?.node, Node::Leaf(StoreValue::Nil));
        match node {
            Node::Leaf(value) => Ok(value),
            Node::List(children) => {
                let mut items = Vec::with_capacity(children.len());
                for child in children {
                    items.push(self.materialize(child)?);
                }
                Ok(StoreValue::List(items))
            }
            Node::Map(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, child) in entries {
                    out.push((key, self.materialize(child)?));
                }
                Ok(StoreValue::Map(out))
            }
        }
    }
}

impl Drop for StaticPool {
    fn drop(&mut self) {
        let stats = self.stats();
        trace!(
            allocated = stats.allocated,
            attached = stats.attached,
            taken = stats.taken,
            released = stats.released(),
            "static pool released"
        );
    }
}
