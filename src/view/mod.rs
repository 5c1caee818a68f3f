//! View module orchestrator following the RSB module specification.
//!
//! [`ViewTree`] owns the view hierarchy and drives the activation, render,
//! and teardown paths defined in `lifecycle`. `coordinator` adds mutual
//! exclusion between top-level stacks, and `audit` carries the observation
//! hooks shared by all of them.

pub mod audit;
mod coordinator;
mod core;
mod lifecycle;

pub use audit::{
    LifecycleAudit, LifecycleAuditEvent, LifecycleAuditEventBuilder, LifecycleStage,
    NullLifecycleAudit,
};
pub use coordinator::RootCoordinator;
pub use core::{
    ActivateFn, NullBehavior, SignalFn, TeardownScope, TreeConfig, ViewBehavior, ViewSpec,
    ViewTree,
};
