//! Ownership-tree module orchestrator following the RSB module specification.
//!
//! The generic arena lives in the private `core` module; the rest of the
//! crate works with [`NodeArena`] handles rather than owning node structs.

mod core;

pub use core::{AttachOutcome, NodeArena, NodeId, Walk};
