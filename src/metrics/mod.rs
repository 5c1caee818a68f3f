use crate::logging::{LogEvent, LogFields, LogLevel};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct LifecycleMetrics {
    activations: u64,
    coalesced: u64,
    renders: u64,
    render_failures: u64,
    teardowns: u64,
    evictions: u64,
    signals: u64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_activation(&mut self) {
        self.activations = self.activations.saturating_add(1);
    }

    /// An activation request that joined an in-flight one.
    pub fn record_coalesced(&mut self) {
        self.coalesced = self.coalesced.saturating_add(1);
    }

    pub fn record_render(&mut self) {
        self.renders = self.renders.saturating_add(1);
    }

    pub fn record_render_failure(&mut self) {
        self.render_failures = self.render_failures.saturating_add(1);
    }

    pub fn record_teardown(&mut self) {
        self.teardowns = self.teardowns.saturating_add(1);
    }

    pub fn record_evictions(&mut self, count: usize) {
        if count > 0 {
            self.evictions = self.evictions.saturating_add(count as u64);
        }
    }

    pub fn record_signal(&mut self) {
        self.signals = self.signals.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            activations: self.activations,
            coalesced: self.coalesced,
            renders: self.renders,
            render_failures: self.render_failures,
            teardowns: self.teardowns,
            evictions: self.evictions,
            signals: self.signals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub activations: u64,
    pub coalesced: u64,
    pub renders: u64,
    pub render_failures: u64,
    pub teardowns: u64,
    pub evictions: u64,
    pub signals: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "lifecycle_metrics".to_string(),
            self.as_fields(),
        )
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("activations".to_string(), json!(self.activations));
        map.insert("coalesced".to_string(), json!(self.coalesced));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("render_failures".to_string(), json!(self.render_failures));
        map.insert("teardowns".to_string(), json!(self.teardowns));
        map.insert("evictions".to_string(), json!(self.evictions));
        map.insert("signals".to_string(), json!(self.signals));
        map
    }
}

pub fn snapshot_event(snapshot: &MetricSnapshot, target: &str) -> LogEvent {
    snapshot.to_log_event(target)
}
