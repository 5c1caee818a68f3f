use thiserror::Error;

use crate::node::NodeId;
use crate::signal::Signal;

/// Unified result type for the Atrium MVP crate.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors surfaced by the view lifecycle engine.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("node {0} does not belong to this tree")]
    ForeignNode(NodeId),
    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },
    #[error("render called on `{0}` while it is active and not activating")]
    AlreadyRendered(String),
    #[error("cannot render `{view}` while its parent `{parent}` is inactive")]
    ParentNotActive { view: String, parent: String },
    #[error("signal `{signal}` fired again on {node} during its own dispatch")]
    SignalReentry { node: NodeId, signal: Signal },
    #[error("view {0} has a parent and cannot be tracked as a root")]
    NotARoot(NodeId),
    #[error("container `{container}` for `{view}` did not resolve to a mount point")]
    MissingContainer { view: String, container: String },
    #[error("required argument `{0}` was empty or missing")]
    MissingArgument(&'static str),
    #[error("no view registered under id `{0}`")]
    UnknownView(String),
}
