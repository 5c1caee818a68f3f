//! Core view tree: node payloads, configuration, and the tree owner.
//!
//! `ViewTree` is the central coordinator. It owns the arena of view nodes,
//! the mount host and template source collaborators, and the signal channels
//! every lifecycle transition travels through. Activation, render, and
//! teardown live in the sibling `lifecycle` module; this file provides the
//! structure they operate on plus the shared plumbing (logging, metrics,
//! audit, dispatch).

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;

use crate::error::{Result, ViewError};
use crate::logging::{LogLevel, Logger, event_with_fields, json_str};
use crate::metrics::{LifecycleMetrics, MetricSnapshot};
use crate::mount::MountHost;
use crate::node::{AttachOutcome, NodeArena, NodeId};
use crate::signal::{DetachFilter, ListenerToken, Scope, Signal, SignalHub};
use crate::template::TemplateSource;

use super::audit::{
    LifecycleAudit, LifecycleAuditEventBuilder, LifecycleStage, NullLifecycleAudit,
};

/// Callback invoked when a signal fires on a view.
///
/// The callback receives the tree itself so it can drive further lifecycle
/// work; the second argument is the view the signal fired on.
pub type SignalFn = Box<dyn FnMut(&mut ViewTree, NodeId) -> Result<()>>;

/// One-shot completion callback attached to an activation request.
pub type ActivateFn = Box<dyn FnOnce(&mut ViewTree) -> Result<()>>;

/// Configuration knobs for a view tree.
#[derive(Clone)]
pub struct TreeConfig {
    /// Structured logger; `None` disables lifecycle logging entirely.
    pub logger: Option<Logger>,
    /// Shared metrics accumulator; `None` disables metrics collection.
    pub metrics: Option<Arc<Mutex<LifecycleMetrics>>>,
    /// Target string stamped on emitted log events.
    pub log_target: String,
    /// Whether the default teardown path blanks the view's mount content.
    pub clear_mounts_on_teardown: bool,
    /// Emit a trace event for every signal dispatch.
    pub trace_signals: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            log_target: "atrium::view".to_string(),
            clear_mounts_on_teardown: true,
            trace_signals: false,
        }
    }
}

impl TreeConfig {
    /// Enable metrics collection with a fresh accumulator.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(LifecycleMetrics::new())));
        }
    }

    /// Disable metrics collection.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<LifecycleMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Extension points a view can supply for its teardown sequence.
///
/// The five hooks run in declaration order while the view tears down. The
/// defaults perform the canonical cleanup; overriding a hook replaces that
/// step entirely, so an override that still wants the stock behavior calls
/// the matching [`TeardownScope`] method itself.
pub trait ViewBehavior {
    /// Runs before any cleanup, while the view still counts as active.
    fn before_teardown(&mut self, _scope: &mut TeardownScope<'_>) {}

    /// Main teardown work for the view's own resources.
    fn on_teardown(&mut self, _scope: &mut TeardownScope<'_>) {}

    /// Removes listeners the view registered on itself.
    fn detach_events(&mut self, scope: &mut TeardownScope<'_>) {
        scope.detach_own_listeners();
    }

    /// Removes the view's content from its mount point.
    fn remove_from_dom(&mut self, scope: &mut TeardownScope<'_>) {
        scope.clear_container();
    }

    /// Runs last, after the mount content is gone.
    fn after_teardown(&mut self, _scope: &mut TeardownScope<'_>) {}
}

/// Behavior with no overrides; every hook keeps its default.
#[derive(Debug, Default)]
pub struct NullBehavior;

impl ViewBehavior for NullBehavior {}

/// Narrow window into the tree handed to behavior hooks during teardown.
pub struct TeardownScope<'a> {
    tree: &'a mut ViewTree,
    view: NodeId,
}

impl<'a> TeardownScope<'a> {
    pub(super) fn new(tree: &'a mut ViewTree, view: NodeId) -> Self {
        Self { tree, view }
    }

    /// The view being torn down.
    pub fn view(&self) -> NodeId {
        self.view
    }

    /// Human-readable label for the view being torn down.
    pub fn view_label(&self) -> String {
        self.tree.label(self.view)
    }

    /// The container key the view renders into, if any.
    pub fn container(&self) -> Option<String> {
        self.tree.container_of(self.view).map(str::to_string)
    }

    /// Mutable access to the mount host for custom DOM work.
    pub fn host(&mut self) -> &mut dyn MountHost {
        self.tree.host.as_mut()
    }

    /// Purge every listener this view registered on its own channels.
    pub fn detach_own_listeners(&mut self) {
        let _ = self
            .tree
            .purge_listener_scope(self.view, Scope::View(self.view));
    }

    /// Blank the view's mount content, honoring the tree configuration.
    pub fn clear_container(&mut self) {
        if !self.tree.config.clear_mounts_on_teardown {
            return;
        }
        let container = self.tree.container_of(self.view).map(str::to_string);
        if let Some(container) = container {
            self.tree.host.clear(&container);
        }
    }
}

/// Declarative description of a view to spawn.
pub struct ViewSpec {
    id: Option<String>,
    container: Option<String>,
    template: Option<String>,
    render_on_activate: bool,
    behavior: Box<dyn ViewBehavior>,
}

impl Default for ViewSpec {
    fn default() -> Self {
        Self {
            id: None,
            container: None,
            template: None,
            render_on_activate: false,
            behavior: Box::new(NullBehavior),
        }
    }
}

impl ViewSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a named view: `ViewSpec::layout("loggedIn")`.
    pub fn layout(id: impl Into<String>) -> Self {
        Self::new().id(id)
    }

    /// Registry id; also the fallback template key.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Container key the view renders into.
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Explicit template key, overriding the id-based lookup.
    pub fn template(mut self, key: impl Into<String>) -> Self {
        self.template = Some(key.into());
        self
    }

    /// Render into the container as part of activation.
    pub fn render_on_activate(mut self) -> Self {
        self.render_on_activate = true;
        self
    }

    /// Custom teardown behavior.
    pub fn behavior(mut self, behavior: Box<dyn ViewBehavior>) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Arena payload holding one view's lifecycle state.
pub(super) struct ViewNode {
    pub(super) id: Option<String>,
    pub(super) container: Option<String>,
    pub(super) template: Option<String>,
    pub(super) render_on_activate: bool,
    pub(super) active: bool,
    pub(super) activating: bool,
    pub(super) pending: VecDeque<ActivateFn>,
    pub(super) hub: SignalHub<SignalFn>,
    pub(super) behavior: Box<dyn ViewBehavior>,
}

/// Central owner of the view hierarchy and its collaborators.
pub struct ViewTree {
    pub(super) arena: NodeArena<ViewNode>,
    pub(super) host: Box<dyn MountHost>,
    pub(super) templates: Box<dyn TemplateSource>,
    pub(super) config: TreeConfig,
    pub(super) audit: Arc<dyn LifecycleAudit>,
    pub(super) dispatching: HashSet<(NodeId, Signal)>,
    pub(super) pending_purges: Vec<(NodeId, Scope)>,
    pub(super) next_coordinator_tag: u64,
    pub(super) start_instant: Instant,
}

impl ViewTree {
    pub fn new(host: Box<dyn MountHost>, templates: Box<dyn TemplateSource>) -> Self {
        Self::with_config(host, templates, TreeConfig::default())
    }

    pub fn with_config(
        host: Box<dyn MountHost>,
        templates: Box<dyn TemplateSource>,
        config: TreeConfig,
    ) -> Self {
        Self {
            arena: NodeArena::new(),
            host,
            templates,
            config,
            audit: Arc::new(NullLifecycleAudit),
            dispatching: HashSet::new(),
            pending_purges: Vec::new(),
            next_coordinator_tag: 0,
            start_instant: Instant::now(),
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TreeConfig {
        &mut self.config
    }

    /// Install an audit sink; replaces the default no-op sink.
    pub fn set_audit(&mut self, audit: Arc<dyn LifecycleAudit>) {
        self.audit = audit;
    }

    /// Snapshot the current metric counters, if metrics are enabled.
    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(self.start_instant.elapsed()))
    }

    // ----- structure -------------------------------------------------------

    /// Add a detached view to the tree and return its handle.
    pub fn spawn(&mut self, spec: ViewSpec) -> NodeId {
        let node = ViewNode {
            id: spec.id,
            container: spec.container,
            template: spec.template,
            render_on_activate: spec.render_on_activate,
            active: false,
            activating: false,
            pending: VecDeque::new(),
            hub: SignalHub::new(),
            behavior: spec.behavior,
        };
        let id = self.arena.insert(node);
        self.audit_stage(id, LifecycleStage::ViewSpawned, std::iter::empty());
        self.log_lifecycle_event(
            LogLevel::Debug,
            "view_spawned",
            [json_str("view", self.label(id))],
        );
        id
    }

    /// Spawn a view directly under an existing parent.
    pub fn spawn_in(&mut self, parent: NodeId, spec: ViewSpec) -> Result<NodeId> {
        let child = self.spawn(spec);
        self.attach(parent, child)?;
        Ok(child)
    }

    /// Attach `child` under `parent`, tearing the child down first if the
    /// move would carry an active subtree to a new slot.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_node(parent)?;
        self.ensure_node(child)?;
        if self.arena.parent(child) == Some(parent) {
            return Ok(());
        }
        // reject the move before any teardown side effects
        if parent == child || self.arena.is_ancestor(child, parent) {
            return Err(ViewError::CycleDetected { parent, child });
        }
        if self.is_active(child) {
            self.teardown(child)?;
        }
        match self.arena.attach(parent, child)? {
            AttachOutcome::Moved { .. } => {
                self.log_lifecycle_event(
                    LogLevel::Debug,
                    "view_reparented",
                    [
                        json_str("view", self.label(child)),
                        json_str("parent", self.label(parent)),
                    ],
                );
                self.fire(child, Signal::ParentChanged)?;
            }
            AttachOutcome::AlreadyChild => {}
        }
        Ok(())
    }

    /// Detach `child` from `parent`, leaving it parked as a root.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<Option<NodeId>> {
        let removed = self.arena.detach(parent, child)?;
        if let Some(id) = removed {
            self.fire(id, Signal::ParentChanged)?;
        }
        Ok(removed)
    }

    /// Detach the child at `index` under `parent`, if any.
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<Option<NodeId>> {
        let removed = self.arena.detach_index(parent, index)?;
        if let Some(id) = removed {
            self.fire(id, Signal::ParentChanged)?;
        }
        Ok(removed)
    }

    // ----- queries ---------------------------------------------------------

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.arena.get(id).map(|node| node.active).unwrap_or(false)
    }

    pub fn is_activating(&self, id: NodeId) -> bool {
        self.arena
            .get(id)
            .map(|node| node.activating)
            .unwrap_or(false)
    }

    pub fn id_of(&self, id: NodeId) -> Option<&str> {
        self.arena.get(id).and_then(|node| node.id.as_deref())
    }

    pub fn container_of(&self, id: NodeId) -> Option<&str> {
        self.arena.get(id).and_then(|node| node.container.as_deref())
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.arena.parent(id)
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.arena.children(id)
    }

    pub fn head(&self, id: NodeId) -> NodeId {
        self.arena.head(id)
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.arena.depth(id)
    }

    /// Registry id when present, otherwise a positional fallback.
    pub fn label(&self, id: NodeId) -> String {
        match self.id_of(id) {
            Some(name) => name.to_string(),
            None => format!("view{id}"),
        }
    }

    // ----- signals ---------------------------------------------------------

    /// Register a persistent listener on a view's signal channel.
    pub fn on(&mut self, node: NodeId, signal: Signal, callback: SignalFn) -> Result<ListenerToken> {
        self.ensure_node(node)?;
        Ok(self.arena_hub(node)?.on(signal, None, callback))
    }

    /// Persistent listener tagged with an ownership scope.
    pub fn on_scoped(
        &mut self,
        node: NodeId,
        signal: Signal,
        scope: Scope,
        callback: SignalFn,
    ) -> Result<ListenerToken> {
        self.ensure_node(node)?;
        Ok(self.arena_hub(node)?.on(signal, Some(scope), callback))
    }

    /// Register a single-fire listener on a view's signal channel.
    pub fn once(
        &mut self,
        node: NodeId,
        signal: Signal,
        callback: SignalFn,
    ) -> Result<ListenerToken> {
        self.ensure_node(node)?;
        Ok(self.arena_hub(node)?.once(signal, None, callback))
    }

    /// Single-fire listener tagged with an ownership scope.
    pub fn once_scoped(
        &mut self,
        node: NodeId,
        signal: Signal,
        scope: Scope,
        callback: SignalFn,
    ) -> Result<ListenerToken> {
        self.ensure_node(node)?;
        Ok(self.arena_hub(node)?.once(signal, Some(scope), callback))
    }

    /// Remove listeners matching `filter` from one signal channel.
    pub fn detach_listeners(
        &mut self,
        node: NodeId,
        signal: Signal,
        filter: DetachFilter,
    ) -> Result<usize> {
        Ok(self.arena_hub(node)?.detach(signal, filter))
    }

    pub fn listener_count(&self, node: NodeId, signal: Signal) -> usize {
        self.arena
            .get(node)
            .map(|view| view.hub.listener_count(signal))
            .unwrap_or(0)
    }

    /// Fire a signal on a view: single-fire listeners drain first, then the
    /// persistent list runs. Re-firing the same signal on the same view
    /// while its dispatch is in flight is an error.
    pub fn fire(&mut self, node: NodeId, signal: Signal) -> Result<()> {
        self.ensure_node(node)?;
        if !self.dispatching.insert((node, signal)) {
            return Err(ViewError::SignalReentry { node, signal });
        }
        let outcome = self.dispatch(node, signal);
        self.dispatching.remove(&(node, signal));
        if !self.dispatching.iter().any(|&(other, _)| other == node) {
            self.apply_deferred_purges(node);
        }
        outcome
    }

    fn dispatch(&mut self, node: NodeId, signal: Signal) -> Result<()> {
        self.record_metric(|metrics| metrics.record_signal());
        if self.config.trace_signals {
            self.log_lifecycle_event(
                LogLevel::Trace,
                "signal_fired",
                [
                    json_str("view", self.label(node)),
                    json_str("signal", signal.as_str()),
                ],
            );
        }
        let drained = self.arena_hub(node)?.drain_once(signal);
        for entry in drained {
            let mut callback = entry.callback;
            callback(self, node)?;
        }
        // persistent listeners run against a taken snapshot so they can
        // mutate the tree; the snapshot is restored even when one fails
        let mut persistent = self.arena_hub(node)?.take_persistent(signal);
        let mut outcome = Ok(());
        for entry in persistent.iter_mut() {
            if let Err(err) = (entry.callback)(self, node) {
                outcome = Err(err);
                break;
            }
        }
        self.arena_hub(node)?.restore_persistent(signal, persistent);
        outcome
    }

    /// Drop every listener tagged with `scope` on `node`. If the node is
    /// mid-dispatch the purge is replayed once its snapshot is restored.
    pub(super) fn purge_listener_scope(&mut self, node: NodeId, scope: Scope) -> Result<usize> {
        let dropped = self.arena_hub(node)?.purge_scope(scope);
        if self.dispatching.iter().any(|&(target, _)| target == node) {
            self.pending_purges.push((node, scope));
        }
        Ok(dropped)
    }

    fn apply_deferred_purges(&mut self, node: NodeId) {
        if self.pending_purges.is_empty() {
            return;
        }
        let queued = std::mem::take(&mut self.pending_purges);
        let mut keep = Vec::with_capacity(queued.len());
        for (target, scope) in queued {
            if target == node {
                if let Some(view) = self.arena.get_mut(target) {
                    view.hub.purge_scope(scope);
                }
            } else {
                keep.push((target, scope));
            }
        }
        self.pending_purges = keep;
    }

    // ----- shared plumbing -------------------------------------------------

    pub(super) fn ensure_node(&self, id: NodeId) -> Result<()> {
        if self.arena.contains(id) {
            Ok(())
        } else {
            Err(ViewError::ForeignNode(id))
        }
    }

    pub(super) fn node(&self, id: NodeId) -> Result<&ViewNode> {
        self.arena.get(id).ok_or(ViewError::ForeignNode(id))
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> Result<&mut ViewNode> {
        self.arena.get_mut(id).ok_or(ViewError::ForeignNode(id))
    }

    fn arena_hub(&mut self, id: NodeId) -> Result<&mut SignalHub<SignalFn>> {
        Ok(&mut self.node_mut(id)?.hub)
    }

    /// Template markup for a view: explicit template key first, registry id
    /// as the fallback.
    pub(super) fn markup_for(&self, id: NodeId) -> Result<Option<String>> {
        let node = self.node(id)?;
        let key = node.template.as_deref().or(node.id.as_deref());
        Ok(key.and_then(|key| self.templates.markup_for(key)))
    }

    pub(super) fn next_coordinator_scope(&mut self) -> Scope {
        let tag = self.next_coordinator_tag;
        self.next_coordinator_tag += 1;
        Scope::Coordinator(tag)
    }

    pub(super) fn log_lifecycle_event<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, &self.config.log_target, message, fields);
            let _ = logger.log_event(event);
        }
    }

    pub(super) fn record_metric(&self, record: impl FnOnce(&mut LifecycleMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut guard);
            }
        }
    }

    pub(super) fn audit_stage<I>(&self, id: NodeId, stage: LifecycleStage, details: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut builder = LifecycleAuditEventBuilder::new(stage);
        builder.detail("view", Value::String(self.label(id)));
        for (key, value) in details {
            builder.detail(key, value);
        }
        self.audit.record(builder.finish());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountRegistry;
    use crate::template::StaticTemplates;

    fn empty_tree() -> ViewTree {
        ViewTree::new(
            Box::new(MountRegistry::new()),
            Box::new(StaticTemplates::new()),
        )
    }

    #[test]
    fn spawn_in_parents_the_new_view() {
        let mut tree = empty_tree();
        let parent = tree.spawn(ViewSpec::layout("parent"));
        let child = tree
            .spawn_in(parent, ViewSpec::layout("child"))
            .expect("spawn_in");
        assert_eq!(tree.parent_of(child), Some(parent));
        assert_eq!(tree.children_of(parent), &[child]);
        assert_eq!(tree.head(child), parent);
    }

    #[test]
    fn attach_to_current_parent_is_a_quiet_no_op() {
        let mut tree = empty_tree();
        let parent = tree.spawn(ViewSpec::new());
        let child = tree.spawn_in(parent, ViewSpec::new()).expect("spawn_in");

        let fired = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = std::rc::Rc::clone(&fired);
        tree.on(
            child,
            Signal::ParentChanged,
            Box::new(move |_, _| {
                seen.set(seen.get() + 1);
                Ok(())
            }),
        )
        .expect("on");

        tree.attach(parent, child).expect("attach");
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn attach_rejects_cycles_without_side_effects() {
        let mut tree = empty_tree();
        let a = tree.spawn(ViewSpec::layout("a"));
        let b = tree.spawn_in(a, ViewSpec::layout("b")).expect("spawn_in");
        let c = tree.spawn_in(b, ViewSpec::layout("c")).expect("spawn_in");

        let err = tree.attach(c, a).expect_err("cycle");
        assert!(matches!(err, ViewError::CycleDetected { .. }));
        assert_eq!(tree.parent_of(a), None);
        assert_eq!(tree.parent_of(c), Some(b));
    }

    #[test]
    fn reparenting_fires_parent_changed() {
        let mut tree = empty_tree();
        let first = tree.spawn(ViewSpec::layout("first"));
        let second = tree.spawn(ViewSpec::layout("second"));
        let child = tree.spawn_in(first, ViewSpec::layout("child")).expect("spawn_in");

        let moves = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = std::rc::Rc::clone(&moves);
        tree.on(
            child,
            Signal::ParentChanged,
            Box::new(move |_, _| {
                seen.set(seen.get() + 1);
                Ok(())
            }),
        )
        .expect("on");

        tree.attach(second, child).expect("attach");
        assert_eq!(tree.parent_of(child), Some(second));
        assert_eq!(moves.get(), 1);

        tree.remove_child(second, child).expect("remove_child");
        assert_eq!(tree.parent_of(child), None);
        assert_eq!(moves.get(), 2);
    }

    #[test]
    fn remove_child_of_absent_pairing_is_ok_none() {
        let mut tree = empty_tree();
        let a = tree.spawn(ViewSpec::new());
        let b = tree.spawn(ViewSpec::new());
        assert_eq!(tree.remove_child(a, b).expect("remove"), None);
        assert_eq!(tree.remove_child_at(a, 5).expect("remove_at"), None);
    }

    #[test]
    fn once_listeners_drain_before_persistent_ones() {
        let mut tree = empty_tree();
        let view = tree.spawn(ViewSpec::layout("view"));

        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let record = std::rc::Rc::clone(&order);
        tree.on(
            view,
            Signal::Rendered,
            Box::new(move |_, _| {
                record.borrow_mut().push("persistent");
                Ok(())
            }),
        )
        .expect("on");
        let record = std::rc::Rc::clone(&order);
        tree.once(
            view,
            Signal::Rendered,
            Box::new(move |_, _| {
                record.borrow_mut().push("once");
                Ok(())
            }),
        )
        .expect("once");

        tree.fire(view, Signal::Rendered).expect("fire");
        tree.fire(view, Signal::Rendered).expect("fire again");
        assert_eq!(
            *order.borrow(),
            vec!["once", "persistent", "persistent"]
        );
    }

    #[test]
    fn listener_registered_mid_dispatch_waits_for_the_next_fire() {
        let mut tree = empty_tree();
        let view = tree.spawn(ViewSpec::layout("view"));

        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let inner_calls = std::rc::Rc::clone(&calls);
        tree.on(
            view,
            Signal::Rendered,
            Box::new(move |tree, node| {
                if inner_calls.get() == 0 {
                    let late_calls = std::rc::Rc::clone(&inner_calls);
                    tree.on(
                        node,
                        Signal::Rendered,
                        Box::new(move |_, _| {
                            late_calls.set(late_calls.get() + 10);
                            Ok(())
                        }),
                    )?;
                }
                inner_calls.set(inner_calls.get() + 1);
                Ok(())
            }),
        )
        .expect("on");

        tree.fire(view, Signal::Rendered).expect("first fire");
        assert_eq!(calls.get(), 1);
        tree.fire(view, Signal::Rendered).expect("second fire");
        assert_eq!(calls.get(), 12);
    }

    #[test]
    fn refiring_a_signal_inside_its_own_dispatch_errors() {
        let mut tree = empty_tree();
        let view = tree.spawn(ViewSpec::layout("loop"));
        tree.on(
            view,
            Signal::Rendered,
            Box::new(|tree, node| tree.fire(node, Signal::Rendered)),
        )
        .expect("on");

        let err = tree.fire(view, Signal::Rendered).expect_err("reentry");
        assert!(matches!(
            err,
            ViewError::SignalReentry {
                signal: Signal::Rendered,
                ..
            }
        ));
        // the guard clears with the dispatch, so a fresh fire works
        tree.detach_listeners(view, Signal::Rendered, DetachFilter::All)
            .expect("detach");
        tree.fire(view, Signal::Rendered).expect("fresh fire");
    }

    #[test]
    fn failed_persistent_listener_keeps_the_roster_intact() {
        let mut tree = empty_tree();
        let view = tree.spawn(ViewSpec::layout("view"));

        let ran = std::rc::Rc::new(std::cell::Cell::new(0));
        let first = std::rc::Rc::clone(&ran);
        tree.on(
            view,
            Signal::Rendering,
            Box::new(move |_, node| {
                first.set(first.get() + 1);
                Err(ViewError::AlreadyRendered(format!("view{node}")))
            }),
        )
        .expect("on");
        let second = std::rc::Rc::clone(&ran);
        tree.on(
            view,
            Signal::Rendering,
            Box::new(move |_, _| {
                second.set(second.get() + 100);
                Ok(())
            }),
        )
        .expect("on");

        assert!(tree.fire(view, Signal::Rendering).is_err());
        // first listener ran, second never did, both still registered
        assert_eq!(ran.get(), 1);
        assert_eq!(tree.listener_count(view, Signal::Rendering), 2);
    }

    #[test]
    fn purge_during_own_dispatch_still_lands() {
        let mut tree = empty_tree();
        let view = tree.spawn(ViewSpec::layout("view"));
        let tag = tree.next_coordinator_scope();

        tree.on_scoped(
            view,
            Signal::ParentChanged,
            tag,
            Box::new(move |tree, node| {
                tree.purge_listener_scope(node, tag)?;
                Ok(())
            }),
        )
        .expect("on_scoped");

        tree.fire(view, Signal::ParentChanged).expect("fire");
        // the listener removed its own scope while its snapshot was out
        assert_eq!(tree.listener_count(view, Signal::ParentChanged), 0);
    }

    #[test]
    fn labels_fall_back_to_position() {
        let mut tree = empty_tree();
        let named = tree.spawn(ViewSpec::layout("home"));
        let anonymous = tree.spawn(ViewSpec::new());
        assert_eq!(tree.label(named), "home");
        assert_eq!(tree.label(anonymous), format!("view{anonymous}"));
    }

    #[test]
    fn metrics_snapshot_counts_signals() {
        let mut config = TreeConfig::default();
        config.enable_metrics();
        let mut tree = ViewTree::with_config(
            Box::new(MountRegistry::new()),
            Box::new(StaticTemplates::new()),
            config,
        );
        let view = tree.spawn(ViewSpec::layout("view"));
        tree.fire(view, Signal::Rendered).expect("fire");
        tree.fire(view, Signal::Rendered).expect("fire");

        let snapshot = tree.metrics_snapshot().expect("snapshot");
        assert_eq!(snapshot.signals, 2);
        assert_eq!(snapshot.renders, 0);
    }
}
