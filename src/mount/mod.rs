//! Mount module orchestrator following the RSB module specification.
//!
//! [`MountHost`] is the boundary to whatever owns the real mount points;
//! [`MountRegistry`] is the crate's in-memory default with change tracking.

mod core;

pub use core::{ContainerId, MountHost, MountRegistry, MountState};
