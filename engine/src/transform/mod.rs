//! Transformation module.
//!
//! - Pipeline: import, replay a recipe, export
//! - Report: per-step outcome of a run

pub mod pipeline;
pub mod report;

pub use pipeline::*;
pub use report::*;
