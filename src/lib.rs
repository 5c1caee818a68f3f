//! Experimental pilot implementation of the Atrium view lifecycle MVP.
//!
//! This crate lives under `concepts/atrium/pilot` while the API solidifies.
//! The modules follow the RSB `MODULE_SPEC` pattern so we can eventually
//! promote the code into a production crate without major surgery.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod mount;
pub mod node;
pub mod reconciler;
pub mod signal;
pub mod template;
pub mod view;

pub use error::{Result, ViewError};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{LifecycleMetrics, MetricSnapshot};
pub use mount::{ContainerId, MountHost, MountRegistry, MountState};
pub use node::{AttachOutcome, NodeArena, NodeId, Walk};
pub use reconciler::PageReconciler;
pub use signal::{DetachFilter, ListenerToken, Scope, Signal, SignalHub};
pub use template::{StaticTemplates, TemplateSource};
pub use view::audit::{
    LifecycleAudit, LifecycleAuditEvent, LifecycleAuditEventBuilder, LifecycleStage,
    NullLifecycleAudit,
};
pub use view::{
    ActivateFn, NullBehavior, RootCoordinator, SignalFn, TeardownScope, TreeConfig, ViewBehavior,
    ViewSpec, ViewTree,
};
