//! Pipeline registry and requirement resolution.
//!
//! This module provides:
//! - The [`Pipeline`] registry of pipes
//! - Two-phase requirement resolution with cycle detection
//! - The requirement stack and [`RequirementGraph`] views

mod graph;
mod registry;


pub use graph::RequirementGraph;
pub use registry::Pipeline;

pub(crate) use registry::PipelineInner;
