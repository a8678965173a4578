//! Steps: cacheable computations with declared requirements.
//!
//! This module provides:
//! - Step declarations ([`StepDef`]) and step objects ([`Step`])
//! - The worker contract
//! - The generation state machine ([`Step::generate`])
//! - Level computation over the requirement graph
//! - Multi-session helpers

mod definition;
mod generate;
mod level;
mod multisession;
mod worker;

pub use definition::{Requirement, Step, StepDef};
pub use generate::{GenerateOptions, RefreshRequirements};
pub use level::StepLevel;
pub use multisession::{Extras, MultiSession};
pub use worker::{FnWorker, OutputData, Worker, WorkerArgs};
