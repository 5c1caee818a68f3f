//! Lifecycle audit utilities (RSB MODULE_SPEC compliant).
//!
//! Lightweight instrumentation hooks so callers can observe the major
//! transitions a `ViewTree` drives. Records capture a stage identifier plus
//! structured metadata so downstream code can log, buffer, or visualize the
//! hierarchy's progression without contorting the lifecycle paths.

use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints emitted by `ViewTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// A view slot was added to the tree.
    ViewSpawned,
    /// An activation request started its flight.
    ActivationRequested,
    /// An activation request joined one already in flight.
    ActivationCoalesced,
    /// Activation resolved and the pending queue was flushed.
    ActivationCompleted,
    /// A sibling was torn down to free a contested container.
    RivalEvicted,
    /// A view replaced its mount content.
    ViewRendered,
    /// A teardown cascade finished with this view.
    ViewTornDown,
    /// A root view was registered for mutual exclusion.
    RootTracked,
    /// A root view left its coordinator.
    RootUntracked,
    /// A tracked root was torn down because another came forward.
    RootEvicted,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct LifecycleAuditEvent {
    pub timestamp: SystemTime,
    pub stage: LifecycleStage,
    pub details: Vec<(String, Value)>,
}

impl LifecycleAuditEvent {
    fn new(stage: LifecycleStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }
}

/// Builder helper to append fields ergonomically.
pub struct LifecycleAuditEventBuilder {
    event: LifecycleAuditEvent,
}

impl LifecycleAuditEventBuilder {
    pub fn new(stage: LifecycleStage) -> Self {
        Self {
            event: LifecycleAuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> LifecycleAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait LifecycleAudit: Send + Sync {
    fn record(&self, event: LifecycleAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullLifecycleAudit;

impl LifecycleAudit for NullLifecycleAudit {
    fn record(&self, _event: LifecycleAuditEvent) {}
}
