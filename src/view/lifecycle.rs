//! Activation, render, and teardown paths for [`ViewTree`].
//!
//! Activation is asynchronous-shaped even though execution is synchronous:
//! a request either completes inline (parent already active) or parks
//! one-shot continuations on the parent's `Rendered` channel and recurses up
//! the ancestor chain. Teardown is the inverse cascade and always runs
//! leaf-first.

use crate::error::{Result, ViewError};
use crate::logging::{LogLevel, json_str};
use crate::node::NodeId;
use crate::signal::{Scope, Signal};

use super::audit::LifecycleStage;
use super::core::{ActivateFn, NullBehavior, TeardownScope, ViewTree};

impl ViewTree {
    /// Request activation of a view, bringing inactive ancestors up first.
    pub fn activate(&mut self, id: NodeId) -> Result<()> {
        self.activate_request(id, None)
    }

    /// Request activation and run `callback` once the view settles. If the
    /// view is already active the callback runs immediately; if a request is
    /// already in flight the callback joins its queue.
    pub fn activate_with(&mut self, id: NodeId, callback: ActivateFn) -> Result<()> {
        self.activate_request(id, Some(callback))
    }

    fn activate_request(&mut self, id: NodeId, callback: Option<ActivateFn>) -> Result<()> {
        self.ensure_node(id)?;
        if self.node(id)?.active {
            if let Some(callback) = callback {
                callback(self)?;
            }
            return Ok(());
        }
        if self.node(id)?.activating {
            if let Some(callback) = callback {
                self.node_mut(id)?.pending.push_back(callback);
            }
            self.record_metric(|metrics| metrics.record_coalesced());
            self.audit_stage(id, LifecycleStage::ActivationCoalesced, std::iter::empty());
            return Ok(());
        }

        {
            let node = self.node_mut(id)?;
            node.activating = true;
            if let Some(callback) = callback {
                node.pending.push_back(callback);
            }
        }
        self.record_metric(|metrics| metrics.record_activation());
        self.audit_stage(id, LifecycleStage::ActivationRequested, std::iter::empty());
        self.log_lifecycle_event(
            LogLevel::Debug,
            "activation_requested",
            [json_str("view", self.label(id))],
        );
        self.fire(id, Signal::Activating)?;

        match self.parent_of(id) {
            None => self.activate_root(id),
            Some(parent) => self.activate_under(id, parent),
        }
    }

    fn activate_root(&mut self, id: NodeId) -> Result<()> {
        self.occupy_slot(id)?;
        self.finish_activation(id)
    }

    fn activate_under(&mut self, id: NodeId, parent: NodeId) -> Result<()> {
        if self.node(parent)?.active {
            self.child_activating(parent, id)?;
            self.occupy_slot(id)?;
            return self.finish_activation(id);
        }

        // Park two continuations on the parent's `Rendered` channel: the
        // first claims the container and renders, the second marks the view
        // active and completes the request. Both carry this view's scope so
        // a teardown mid-flight sweeps them away.
        let scope = Scope::View(id);
        self.once_scoped(
            parent,
            Signal::Rendered,
            scope,
            Box::new(move |tree, rendered_parent| {
                tree.child_activating(rendered_parent, id)?;
                if tree.node(id)?.render_on_activate {
                    tree.render(id)?;
                }
                Ok(())
            }),
        )?;
        self.once_scoped(
            parent,
            Signal::Rendered,
            scope,
            Box::new(move |tree, _| {
                if !tree.node(id)?.active {
                    tree.node_mut(id)?.active = true;
                    tree.fire(id, Signal::Rendered)?;
                }
                tree.finish_activation(id)
            }),
        )?;
        self.activate(parent)
    }

    /// Render if the view owns its presentation, otherwise just mark it
    /// active and announce the transition. Shared by the event-driven
    /// ascent and the pull-based reconciler so both honor the render flag.
    pub(crate) fn occupy_slot(&mut self, id: NodeId) -> Result<()> {
        if self.node(id)?.render_on_activate {
            self.render(id)?;
        } else {
            self.node_mut(id)?.active = true;
            self.fire(id, Signal::Rendered)?;
        }
        Ok(())
    }

    fn finish_activation(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.activating = false;
        self.flush_pending(id)?;
        self.audit_stage(id, LifecycleStage::ActivationCompleted, std::iter::empty());
        self.log_lifecycle_event(
            LogLevel::Debug,
            "activation_completed",
            [json_str("view", self.label(id))],
        );
        Ok(())
    }

    // Callbacks leave the queue one at a time so a callback that re-enters
    // activation never sees itself still queued.
    fn flush_pending(&mut self, id: NodeId) -> Result<()> {
        loop {
            let Some(callback) = self.node_mut(id)?.pending.pop_front() else {
                break;
            };
            callback(self)?;
        }
        Ok(())
    }

    /// A child is claiming its slot under `parent`: make sure the parent is
    /// up, then evict any active sibling holding the same container.
    fn child_activating(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.node(parent)?.active {
            self.activate(parent)?;
        }
        let Some(slot) = self.node(child)?.container.clone() else {
            return Ok(());
        };
        let rivals: Vec<NodeId> = self
            .children_of(parent)
            .iter()
            .copied()
            .filter(|&other| other != child && self.is_active(other))
            .filter(|&other| self.container_of(other) == Some(slot.as_str()))
            .collect();
        let evicted = rivals.len();
        for rival in rivals {
            self.audit_stage(
                rival,
                LifecycleStage::RivalEvicted,
                [
                    json_str("container", slot.clone()),
                    json_str("replacement", self.label(child)),
                ],
            );
            self.log_lifecycle_event(
                LogLevel::Info,
                "rival_evicted",
                [
                    json_str("view", self.label(rival)),
                    json_str("container", slot.clone()),
                    json_str("replacement", self.label(child)),
                ],
            );
            self.teardown(rival)?;
        }
        self.record_metric(|metrics| metrics.record_evictions(evicted));
        Ok(())
    }

    /// Resolve the view's container, inject its template markup, and mark it
    /// active. Fails if the view is already settled, its parent is inactive,
    /// or its container does not resolve. Does not modify the in-flight
    /// activation flag, so a failed chain can be resumed by rendering the
    /// ancestor that stalled.
    pub fn render(&mut self, id: NodeId) -> Result<()> {
        self.ensure_node(id)?;
        {
            let node = self.node(id)?;
            if node.active && !node.activating {
                return Err(ViewError::AlreadyRendered(self.label(id)));
            }
        }
        if let Some(parent) = self.parent_of(id) {
            if !self.node(parent)?.active {
                return Err(ViewError::ParentNotActive {
                    view: self.label(id),
                    parent: self.label(parent),
                });
            }
        }

        self.fire(id, Signal::Rendering)?;

        let container = self.node(id)?.container.clone();
        let Some(container) = container else {
            self.record_metric(|metrics| metrics.record_render_failure());
            return Err(ViewError::MissingContainer {
                view: self.label(id),
                container: String::from("(unset)"),
            });
        };
        if !self.host.resolve(&container) {
            self.record_metric(|metrics| metrics.record_render_failure());
            return Err(ViewError::MissingContainer {
                view: self.label(id),
                container,
            });
        }

        let markup = self.markup_for(id)?.unwrap_or_default();
        self.host.inject(&container, &markup);
        self.node_mut(id)?.active = true;
        self.record_metric(|metrics| metrics.record_render());
        self.audit_stage(
            id,
            LifecycleStage::ViewRendered,
            [json_str("container", container.clone())],
        );
        self.log_lifecycle_event(
            LogLevel::Info,
            "view_rendered",
            [
                json_str("view", self.label(id)),
                json_str("container", container),
            ],
        );
        self.fire(id, Signal::Rendered)
    }

    /// Tear a view down: active children first (most recent attachment
    /// first), then the five behavior hooks, then listener and state
    /// cleanup. Inactive views are left untouched.
    pub fn teardown(&mut self, id: NodeId) -> Result<()> {
        self.ensure_node(id)?;
        if !self.node(id)?.active {
            return Ok(());
        }

        let cascade: Vec<NodeId> = self
            .children_of(id)
            .iter()
            .rev()
            .copied()
            .filter(|&child| self.is_active(child))
            .collect();
        for child in cascade {
            self.teardown(child)?;
        }

        // the behavior steps out of its node so the hooks can borrow the tree
        let mut behavior =
            std::mem::replace(&mut self.node_mut(id)?.behavior, Box::new(NullBehavior));
        {
            let mut scope = TeardownScope::new(self, id);
            behavior.before_teardown(&mut scope);
            behavior.on_teardown(&mut scope);
            behavior.detach_events(&mut scope);
            behavior.remove_from_dom(&mut scope);
            behavior.after_teardown(&mut scope);
        }
        self.node_mut(id)?.behavior = behavior;

        // continuations this view parked on its parent die with it
        if let Some(parent) = self.parent_of(id) {
            self.purge_listener_scope(parent, Scope::View(id))?;
        }
        {
            let node = self.node_mut(id)?;
            node.pending.clear();
            node.activating = false;
            node.active = false;
        }
        self.record_metric(|metrics| metrics.record_teardown());
        self.audit_stage(id, LifecycleStage::ViewTornDown, std::iter::empty());
        self.log_lifecycle_event(
            LogLevel::Info,
            "view_torn_down",
            [json_str("view", self.label(id))],
        );
        Ok(())
    }
}
