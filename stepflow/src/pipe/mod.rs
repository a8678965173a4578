//! Pipes: named groups of chained steps sharing one storage strategy.

mod builder;

pub use builder::PipeBuilder;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::disk::{DiskObject, DiskObjectFactory};
use crate::errors::{Result, StepflowError};
use crate::pipeline::{Pipeline, PipelineInner};
use crate::session::Session;
use crate::step::{OutputData, Step};

/// Transform applied to every freshly computed output before it is saved.
pub type PreRunHook = Arc<dyn Fn(OutputData) -> OutputData + Send + Sync>;

/// A named group of steps registered to a pipeline.
pub struct Pipe {
    name: String,
    single_step: bool,
    default_extra: String,
    steps: HashMap<String, Arc<Step>>,
    step_order: Vec<String>,
    pipeline: Weak<PipelineInner>,
    disk_factory: Arc<dyn DiskObjectFactory>,
    pre_run: Option<PreRunHook>,
}

impl Pipe {
    /// The pipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the pipe was declared with a single step, which then stands
    /// for the whole pipe in requirement references.
    #[must_use]
    pub fn is_single_step(&self) -> bool {
        self.single_step
    }

    /// Extra used when none is given, and by steps of other pipes requiring this one.
    #[must_use]
    pub fn default_extra(&self) -> &str {
        &self.default_extra
    }

    /// Gets a step by name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<Arc<Step>> {
        self.steps.get(name).cloned()
    }

    /// Steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> Vec<Arc<Step>> {
        self.step_order
            .iter()
            .filter_map(|name| self.steps.get(name).cloned())
            .collect()
    }

    /// Step names in declaration order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.step_order.iter().map(String::as_str).collect()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: a pipe has at least one step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The pipeline this pipe is registered to.
    pub fn pipeline(&self) -> Result<Pipeline> {
        self.pipeline
            .upgrade()
            .map(Pipeline::from_inner)
            .ok_or_else(|| StepflowError::Detached(self.name.clone()))
    }

    /// Level of each step within this pipe's chain, in declaration order.
    pub fn steps_levels(&self) -> Result<Vec<(String, usize)>> {
        self.steps()
            .iter()
            .map(|step| Ok((step.step_name().to_string(), step.get_level(true)?)))
            .collect()
    }

    /// Builds the disk object of one of this pipe's steps.
    pub fn disk_object(
        &self,
        session: &Session,
        step: &Step,
        extra: &str,
    ) -> Result<Box<dyn DiskObject>> {
        self.disk_factory.disk_object(session, step, extra)
    }

    pub(crate) fn pre_run(&self, output: OutputData) -> OutputData {
        match &self.pre_run {
            Some(hook) => hook(output),
            None => output,
        }
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("name", &self.name)
            .field("single_step", &self.single_step)
            .field("steps", &self.step_order)
            .finish_non_exhaustive()
    }
}
