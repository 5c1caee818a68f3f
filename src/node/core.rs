use std::fmt;

use crate::error::{Result, ViewError};

/// Opaque handle to a slot in a [`NodeArena`].
///
/// Handles are minted by [`NodeArena::insert`] and stay valid for the life
/// of the arena; slots are never reclaimed. A handle is only meaningful to
/// the arena that minted it: membership checks are positional, so a handle
/// from another arena whose index happens to be in range aliases a slot
/// here instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Visitor verdict for [`NodeArena::descend`] and [`NodeArena::ascend`].
///
/// `Stop` prunes the current call frame: the remaining siblings at that
/// depth are skipped, while outer frames keep walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    Stop,
}

/// Outcome of [`NodeArena::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The child was appended under the parent, detached from `from` first.
    Moved { from: Option<NodeId> },
    /// The child already sat under the parent; nothing changed.
    AlreadyChild,
}

#[derive(Debug)]
struct Slot<T> {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload: T,
}

/// Generic ownership tree backed by an append-only slab.
///
/// Every node has at most one parent and an insertion-ordered child list.
/// Structural mutation goes through [`attach`](NodeArena::attach) and
/// [`detach`](NodeArena::detach), which keep the tree cycle-free.
#[derive(Debug)]
pub struct NodeArena<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached root slot and returns its handle.
    pub fn insert(&mut self, payload: T) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            parent: None,
            children: Vec::new(),
            payload,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.0).map(|slot| &slot.payload)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.payload)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(id.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Walks parent links to the root of `id`'s tree.
    pub fn head(&self, id: NodeId) -> NodeId {
        let mut cursor = id;
        while let Some(parent) = self.parent(cursor) {
            cursor = parent;
        }
        cursor
    }

    /// Number of edges between `id` and its root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            depth += 1;
            cursor = self.parent(node);
        }
        depth
    }

    /// True when `ancestor` appears strictly above `node` in its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Appends `child` under `parent`, detaching it from any current parent.
    ///
    /// No-op when the edge already exists. The cycle check runs before any
    /// mutation, so a rejected attach leaves both nodes untouched.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<AttachOutcome> {
        self.ensure(parent)?;
        self.ensure(child)?;

        if self.slots[child.0].parent == Some(parent) {
            return Ok(AttachOutcome::AlreadyChild);
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(ViewError::CycleDetected { parent, child });
        }

        let from = self.slots[child.0].parent;
        if let Some(old) = from {
            self.slots[old.0].children.retain(|&c| c != child);
        }
        self.slots[parent.0].children.push(child);
        self.slots[child.0].parent = Some(parent);
        Ok(AttachOutcome::Moved { from })
    }

    /// Removes `child` from `parent`'s child list and clears its parent
    /// link, turning it into a root. Returns `None` when the edge does not
    /// exist.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<Option<NodeId>> {
        self.ensure(parent)?;
        self.ensure(child)?;

        let position = self.slots[parent.0]
            .children
            .iter()
            .position(|&c| c == child);
        match position {
            Some(idx) => self.detach_index(parent, idx),
            None => Ok(None),
        }
    }

    /// Positional form of [`detach`](NodeArena::detach).
    pub fn detach_index(&mut self, parent: NodeId, index: usize) -> Result<Option<NodeId>> {
        self.ensure(parent)?;

        if index >= self.slots[parent.0].children.len() {
            return Ok(None);
        }
        let child = self.slots[parent.0].children.remove(index);
        self.slots[child.0].parent = None;
        Ok(Some(child))
    }

    /// Depth-first visitation of `id`'s descendants (`id` itself is not
    /// visited). `before` runs pre-order, `after` post-order. A `Walk::Stop`
    /// from either callback abandons the current call frame only.
    pub fn descend<B, A>(&self, id: NodeId, before: &mut B, after: &mut A)
    where
        B: FnMut(NodeId) -> Walk,
        A: FnMut(NodeId) -> Walk,
    {
        let Some(slot) = self.slots.get(id.0) else {
            return;
        };
        for idx in 0..slot.children.len() {
            let child = self.slots[id.0].children[idx];
            if let Walk::Stop = before(child) {
                return;
            }
            self.descend(child, before, after);
            if let Walk::Stop = after(child) {
                return;
            }
        }
    }

    /// Pre-order-only convenience over [`descend`](NodeArena::descend).
    pub fn each_descendant<F>(&self, id: NodeId, visit: &mut F)
    where
        F: FnMut(NodeId) -> Walk,
    {
        self.descend(id, visit, &mut |_| Walk::Continue);
    }

    /// Visits `id`, then its parent, grandparent and so on until the root
    /// or a `Walk::Stop`.
    pub fn ascend<F>(&self, id: NodeId, visit: &mut F)
    where
        F: FnMut(NodeId) -> Walk,
    {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if !self.contains(node) {
                return;
            }
            if let Walk::Stop = visit(node) {
                return;
            }
            cursor = self.slots[node.0].parent;
        }
    }

    fn ensure(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ViewError::ForeignNode(id))
        }
    }
}
