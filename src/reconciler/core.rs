//! Pull-based reconciliation over a registry of page views.
//!
//! Where activation pushes a view up through its ancestors, the reconciler
//! starts from a target page id and derives the full plan itself: which
//! unrelated stacks must come down, which ancestors must come up, and in
//! what order. Both formulations drive the same [`ViewTree`] and can be
//! mixed freely.

use std::collections::HashMap;

use crate::error::{Result, ViewError};
use crate::node::NodeId;
use crate::view::ViewTree;

#[derive(Default)]
pub struct PageReconciler {
    items: HashMap<String, NodeId>,
    order: Vec<String>,
}

impl PageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page under `id`. Registering an id again replaces its
    /// node; the original registration order is kept.
    pub fn register(
        &mut self,
        tree: &ViewTree,
        id: impl Into<String>,
        node: NodeId,
    ) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(ViewError::MissingArgument("id"));
        }
        if !tree.contains(node) {
            return Err(ViewError::ForeignNode(node));
        }
        if !self.items.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.items.insert(id, node);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<NodeId> {
        let removed = self.items.remove(id);
        if removed.is_some() {
            self.order.retain(|key| key != id);
        }
        removed
    }

    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.items.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bring the page registered under `id` on screen.
    ///
    /// Unrelated active pages come down first (deepest first), then the
    /// target's own stale children. If the target is already active that is
    /// all; otherwise the inactive ancestor chain is cleared of rival
    /// branches and brought up top-down, rendering only the views that own
    /// their presentation.
    pub fn render(&self, tree: &mut ViewTree, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(ViewError::MissingArgument("id"));
        }
        let target = self
            .items
            .get(id)
            .copied()
            .ok_or_else(|| ViewError::UnknownView(id.to_string()))?;

        for item in self.active_items_unrelated_to(tree, id)? {
            tree.teardown(item)?;
        }

        let stale: Vec<NodeId> = tree
            .children_of(target)
            .iter()
            .rev()
            .copied()
            .filter(|&child| tree.is_active(child))
            .collect();
        for child in stale {
            tree.teardown(child)?;
        }

        if tree.is_active(target) {
            return Ok(());
        }

        let chain = self.inactive_ancestors(tree, id)?;
        if let Some(&top) = chain.first() {
            // a still-active parent may carry branches from a prior path
            if let Some(parent) = tree.parent_of(top) {
                let rivals: Vec<NodeId> = tree
                    .children_of(parent)
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&child| child != top && tree.is_active(child))
                    .collect();
                for rival in rivals {
                    tree.teardown(rival)?;
                }
            }
        }

        if let (Some(parent), Some(container)) = (
            tree.parent_of(target),
            tree.container_of(target).map(str::to_string),
        ) {
            self.teardown_child_view(tree, parent, &container)?;
        }

        for node in chain {
            tree.occupy_slot(node)?;
        }
        Ok(())
    }

    /// Attach `child` under the page registered as `parent_id`, evicting
    /// any active sibling that holds the child's container.
    pub fn add_child_view(
        &self,
        tree: &mut ViewTree,
        parent_id: &str,
        child: NodeId,
    ) -> Result<()> {
        if parent_id.is_empty() {
            return Err(ViewError::MissingArgument("parent_id"));
        }
        let parent = self
            .items
            .get(parent_id)
            .copied()
            .ok_or_else(|| ViewError::UnknownView(parent_id.to_string()))?;
        if !tree.contains(child) {
            return Err(ViewError::ForeignNode(child));
        }
        if let Some(container) = tree.container_of(child).map(str::to_string) {
            self.teardown_child_view(tree, parent, &container)?;
        }
        tree.attach(parent, child)
    }

    /// Registered pages that are active but live under a different root
    /// than the page registered as `id`, deepest first.
    pub fn active_items_unrelated_to(&self, tree: &ViewTree, id: &str) -> Result<Vec<NodeId>> {
        let target = self
            .items
            .get(id)
            .copied()
            .ok_or_else(|| ViewError::UnknownView(id.to_string()))?;
        let target_head = tree.head(target);
        let mut unrelated: Vec<NodeId> = self
            .order
            .iter()
            .filter_map(|key| self.items.get(key).copied())
            .filter(|&node| tree.head(node) != target_head && tree.is_active(node))
            .collect();
        unrelated.sort_by(|&a, &b| tree.depth(b).cmp(&tree.depth(a)));
        Ok(unrelated)
    }

    /// The inactive ancestor chain ending at the page registered as `id`,
    /// ordered root-side first. Empty when the page is active.
    pub fn inactive_ancestors(&self, tree: &ViewTree, id: &str) -> Result<Vec<NodeId>> {
        let target = self
            .items
            .get(id)
            .copied()
            .ok_or_else(|| ViewError::UnknownView(id.to_string()))?;
        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            if tree.is_active(node) {
                break;
            }
            chain.push(node);
            cursor = tree.parent_of(node);
        }
        chain.reverse();
        Ok(chain)
    }

    fn teardown_child_view(
        &self,
        tree: &mut ViewTree,
        parent: NodeId,
        container: &str,
    ) -> Result<()> {
        let occupants: Vec<NodeId> = tree
            .children_of(parent)
            .iter()
            .copied()
            .filter(|&child| tree.is_active(child))
            .filter(|&child| tree.container_of(child) == Some(container))
            .collect();
        for occupant in occupants {
            tree.teardown(occupant)?;
        }
        Ok(())
    }
}
