//! Error module orchestrator following the RSB module specification.
//!
//! Downstream code imports the crate error and result types from here while
//! the definitions live in the private `types` module.

mod types;

pub use types::{Result, ViewError};
