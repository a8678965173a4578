//! Testing utilities for stepflow pipelines.
//!
//! This module provides:
//! - Workers that record their calls or always fail
//! - Session fixtures rooted in a temporary directory

mod fixtures;
mod mocks;

pub use fixtures::{session_at, test_date};
pub use mocks::{FailingWorker, RecordingWorker, WorkerCall};
