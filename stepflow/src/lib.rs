//! # Stepflow
//!
//! Dependency-aware, disk-cached computation steps.
//!
//! Stepflow organizes computations into named steps grouped into pipes,
//! themselves registered to a pipeline:
//!
//! - **Cached steps**: every step output is saved as an artifact named after
//!   the pipe, the step, its version and an optional extra tag
//! - **Requirements**: steps declare the steps they need, across pipes; the
//!   pipeline resolves them lazily and rejects cycles
//! - **Staleness detection**: an artifact produced by an earlier step of the
//!   chain, or by another version of the step, is never returned as is
//! - **Generation**: `generate` loads what is fresh and recomputes the rest,
//!   regenerating stale requirements first
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepflow::prelude::*;
//! use serde_json::json;
//!
//! let pipeline = Pipeline::new("exp");
//! let pipe = pipeline.register_pipe(
//!     PipeBuilder::new("Trials")
//!         .step(StepDef::new("raw", |_, _, _| Ok(json!([1, 2, 3]))))
//!         .step(StepDef::new("filtered", |_, _, _| Ok(json!([2]))).requires("Trials.raw").version("2")),
//! )?;
//!
//! let session = Session::new("mouse12", date, Some(1), "/data").with_auto_path();
//! let output = pipe
//!     .step("filtered")
//!     .expect("declared above")
//!     .generate(&session, &GenerateOptions::new().run_requirements(true))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod disk;
pub mod errors;
pub mod observability;
pub mod pipe;
pub mod pipeline;
pub mod session;
pub mod step;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PipelineConfig, StorageConfig};
    pub use crate::disk::{
        ArtifactStore, DiskObject, DiskObjectFactory, FsStore, MemoryStore,
        StoreDiskObjectFactory,
    };
    pub use crate::errors::{
        CircularDependencyError, ConfigurationError, DuplicateNameError, NotFoundError,
        StepflowError, UnresolvedReferenceError,
    };
    pub use crate::pipe::{Pipe, PipeBuilder};
    pub use crate::pipeline::{Pipeline, RequirementGraph};
    pub use crate::session::Session;
    pub use crate::step::{
        Extras, GenerateOptions, OutputData, RefreshRequirements, Step, StepDef, Worker,
        WorkerArgs,
    };
}
