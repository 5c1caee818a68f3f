use std::collections::HashMap;
use std::fmt;

use crate::node::NodeId;

/// Lifecycle signals a view node can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Activation of the node has been requested and is now in flight.
    Activating,
    /// The node is about to replace its mount content.
    Rendering,
    /// The node finished activating; its subtree slot is ready.
    Rendered,
    /// The node gained or lost a parent.
    ParentChanged,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Activating => "activating",
            Signal::Rendering => "rendering",
            Signal::Rendered => "rendered",
            Signal::ParentChanged => "parent-changed",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the registrant of a listener, for bulk detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Registered by another view (the waiting child during activation).
    View(NodeId),
    /// Registered by a root coordinator, keyed by its tag.
    Coordinator(u64),
}

/// Handle returned by registration, used for targeted detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Matching rule for [`SignalHub::detach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachFilter {
    Token(ListenerToken),
    Scope(Scope),
    /// Both the token and the scope must match.
    TokenAndScope(ListenerToken, Scope),
    /// Everything registered for the signal.
    All,
}

impl DetachFilter {
    fn matches<F>(&self, entry: &ListenerEntry<F>) -> bool {
        match *self {
            DetachFilter::Token(token) => entry.token == token,
            DetachFilter::Scope(scope) => entry.scope == Some(scope),
            DetachFilter::TokenAndScope(token, scope) => {
                entry.token == token && entry.scope == Some(scope)
            }
            DetachFilter::All => true,
        }
    }
}

/// A registered listener: its identity plus the stored callback payload.
#[derive(Debug)]
pub struct ListenerEntry<F> {
    pub token: ListenerToken,
    pub scope: Option<Scope>,
    pub callback: F,
}

#[derive(Debug)]
struct Lane<F> {
    once: Vec<ListenerEntry<F>>,
    persistent: Vec<ListenerEntry<F>>,
}

impl<F> Default for Lane<F> {
    fn default() -> Self {
        Self {
            once: Vec::new(),
            persistent: Vec::new(),
        }
    }
}

/// Per-node listener registry, one lane per signal.
///
/// Insertion order is preserved within each lane; tokens are unique per
/// hub. The hub never invokes callbacks itself, which keeps it generic
/// over the payload type.
#[derive(Debug)]
pub struct SignalHub<F> {
    lanes: HashMap<Signal, Lane<F>>,
    next_token: u64,
}

impl<F> Default for SignalHub<F> {
    fn default() -> Self {
        Self {
            lanes: HashMap::new(),
            next_token: 0,
        }
    }
}

impl<F> SignalHub<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a persistent listener; it survives every dispatch.
    pub fn on(&mut self, signal: Signal, scope: Option<Scope>, callback: F) -> ListenerToken {
        let token = self.mint();
        self.lanes
            .entry(signal)
            .or_default()
            .persistent
            .push(ListenerEntry {
                token,
                scope,
                callback,
            });
        token
    }

    /// Registers a single-fire listener; it is drained by the next dispatch.
    pub fn once(&mut self, signal: Signal, scope: Option<Scope>, callback: F) -> ListenerToken {
        let token = self.mint();
        self.lanes
            .entry(signal)
            .or_default()
            .once
            .push(ListenerEntry {
                token,
                scope,
                callback,
            });
        token
    }

    /// Removes matching listeners from the signal's lane, both single-fire
    /// and persistent. Returns how many were dropped.
    pub fn detach(&mut self, signal: Signal, filter: DetachFilter) -> usize {
        let Some(lane) = self.lanes.get_mut(&signal) else {
            return 0;
        };
        let before = lane.once.len() + lane.persistent.len();
        lane.once.retain(|entry| !filter.matches(entry));
        lane.persistent.retain(|entry| !filter.matches(entry));
        before - (lane.once.len() + lane.persistent.len())
    }

    /// Removes every listener with the given scope across all lanes.
    pub fn purge_scope(&mut self, scope: Scope) -> usize {
        let mut dropped = 0;
        for lane in self.lanes.values_mut() {
            let before = lane.once.len() + lane.persistent.len();
            lane.once.retain(|entry| entry.scope != Some(scope));
            lane.persistent.retain(|entry| entry.scope != Some(scope));
            dropped += before - (lane.once.len() + lane.persistent.len());
        }
        dropped
    }

    /// Takes every single-fire listener currently parked on the signal.
    pub fn drain_once(&mut self, signal: Signal) -> Vec<ListenerEntry<F>> {
        self.lanes
            .get_mut(&signal)
            .map(|lane| std::mem::take(&mut lane.once))
            .unwrap_or_default()
    }

    /// Takes the persistent listeners out for dispatch; pair with
    /// [`restore_persistent`](SignalHub::restore_persistent).
    pub fn take_persistent(&mut self, signal: Signal) -> Vec<ListenerEntry<F>> {
        self.lanes
            .get_mut(&signal)
            .map(|lane| std::mem::take(&mut lane.persistent))
            .unwrap_or_default()
    }

    /// Puts taken persistent listeners back, ahead of any listener that was
    /// registered while they were out.
    pub fn restore_persistent(&mut self, signal: Signal, mut taken: Vec<ListenerEntry<F>>) {
        let lane = self.lanes.entry(signal).or_default();
        let registered_meanwhile = std::mem::take(&mut lane.persistent);
        taken.extend(registered_meanwhile);
        lane.persistent = taken;
    }

    /// Listeners currently parked on a signal, both kinds.
    pub fn listener_count(&self, signal: Signal) -> usize {
        self.lanes
            .get(&signal)
            .map(|lane| lane.once.len() + lane.persistent.len())
            .unwrap_or(0)
    }

    fn mint(&mut self) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        token
    }
}
