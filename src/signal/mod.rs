//! Signal module orchestrator following the RSB module specification.
//!
//! Per-node listener registry for the lifecycle signals. The hub stores and
//! orders listeners; dispatch policy (once-before-persistent, reentry
//! guard) lives with the tree that owns the hubs.

mod core;

pub use core::{DetachFilter, ListenerEntry, ListenerToken, Scope, Signal, SignalHub};
