//! Reconciler module orchestrator following the RSB module specification.
//!
//! [`PageReconciler`] maps stable page ids onto view tree nodes and derives
//! full bring-up/bring-down plans from a single target id.

mod core;

pub use core::PageReconciler;
