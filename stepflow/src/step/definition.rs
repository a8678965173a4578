//! Step declarations and step objects.

use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

use super::level::StepLevel;
use super::multisession::MultiSession;
use super::worker::{FnWorker, OutputData, Worker, WorkerArgs};
use crate::disk::DiskObject;
use crate::errors::{NotFoundError, Result, StepflowError, UnresolvedReferenceError};
use crate::pipe::Pipe;
use crate::pipeline::Pipeline;
use crate::session::Session;

/// A requirement of a step, before or after pipeline resolution.
#[derive(Clone)]
pub enum Requirement {
    /// A `"Pipe.step"` reference, looked up when the pipeline resolves.
    Unresolved(String),
    /// A step of the pipeline.
    Resolved(Weak<Step>),
}

impl Requirement {
    fn describe(&self) -> String {
        match self {
            Self::Unresolved(reference) => reference.clone(),
            Self::Resolved(step) => step
                .upgrade()
                .map_or_else(|| "<dropped step>".to_string(), |s| s.full_name().to_string()),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved(reference) => f.debug_tuple("Unresolved").field(reference).finish(),
            Self::Resolved(_) => f.debug_tuple("Resolved").field(&self.describe()).finish(),
        }
    }
}

/// Declaration of a step, consumed by [`PipeBuilder`](crate::pipe::PipeBuilder).
#[derive(Clone)]
pub struct StepDef {
    pub(crate) name: String,
    pub(crate) requires: Vec<Requirement>,
    pub(crate) version: Option<String>,
    pub(crate) worker: Arc<dyn Worker>,
}

impl StepDef {
    /// Declares a step computed by a closure.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Session, &WorkerArgs, &str) -> anyhow::Result<OutputData> + Send + Sync + 'static,
    {
        Self::from_worker(name, Arc::new(FnWorker::new(func)))
    }

    /// Declares a step computed by a [`Worker`].
    pub fn from_worker(name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            version: None,
            worker,
        }
    }

    /// Adds a `"Pipe.step"` requirement.
    #[must_use]
    pub fn requires(mut self, reference: impl Into<String>) -> Self {
        self.requires.push(Requirement::Unresolved(reference.into()));
        self
    }

    /// Adds several `"Pipe.step"` requirements.
    #[must_use]
    pub fn requires_all(mut self, references: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.requires
            .extend(references.into_iter().map(|r| Requirement::Unresolved(r.into())));
        self
    }

    /// Adds a requirement on an already registered step.
    #[must_use]
    pub fn requires_step(mut self, step: &Arc<Step>) -> Self {
        self.requires.push(Requirement::Resolved(Arc::downgrade(step)));
        self
    }

    /// Sets the version tag. Empty tags mean unversioned.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the step declares at least one requirement.
    #[must_use]
    pub fn has_requirements(&self) -> bool {
        !self.requires.is_empty()
    }
}

impl fmt::Debug for StepDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDef")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A cacheable computation belonging to a pipe.
pub struct Step {
    pipe_name: String,
    step_name: String,
    full_name: String,
    version: Option<String>,
    requires: RwLock<Vec<Requirement>>,
    worker: Arc<dyn Worker>,
    pipe: Weak<Pipe>,
}

impl Step {
    pub(crate) fn new(pipe_name: &str, def: StepDef, pipe: Weak<Pipe>) -> Self {
        Self {
            pipe_name: pipe_name.to_string(),
            full_name: format!("{pipe_name}.{}", def.name),
            step_name: def.name,
            version: def.version,
            requires: RwLock::new(def.requires),
            worker: def.worker,
            pipe,
        }
    }

    /// Name of the owning pipe.
    #[must_use]
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }

    /// Name of the step within its pipe.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// `"pipe_name.step_name"`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Version tag, compared by equality only.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The owning pipe.
    pub fn pipe(&self) -> Result<Arc<Pipe>> {
        self.pipe
            .upgrade()
            .ok_or_else(|| StepflowError::Detached(self.full_name.clone()))
    }

    /// The pipeline the owning pipe is registered to.
    pub fn pipeline(&self) -> Result<Pipeline> {
        self.pipe()?.pipeline()
    }

    /// Default extra of the owning pipe.
    pub fn default_extra(&self) -> Result<String> {
        Ok(self.pipe()?.default_extra().to_string())
    }

    /// Direct requirements, resolving the pipeline first if needed.
    pub fn requirements(&self) -> Result<Vec<Arc<Step>>> {
        self.pipeline()?.resolve()?;
        self.resolved_requirements()
    }

    /// Direct requirements as declared, resolved or not.
    #[must_use]
    pub fn declared_requirements(&self) -> Vec<Requirement> {
        self.requires.read().clone()
    }

    /// Direct requirements, failing on references still unresolved.
    pub(crate) fn resolved_requirements(&self) -> Result<Vec<Arc<Step>>> {
        self.requires
            .read()
            .iter()
            .map(|requirement| match requirement {
                Requirement::Resolved(step) => step
                    .upgrade()
                    .ok_or_else(|| StepflowError::Detached(requirement.describe())),
                Requirement::Unresolved(reference) => {
                    Err(UnresolvedReferenceError::new(reference, &self.full_name).into())
                }
            })
            .collect()
    }

    /// Rewrites textual requirements in place with `lookup`.
    pub(crate) fn resolve_requirements<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<Arc<Step>>,
    {
        let mut requires = self.requires.write();
        for requirement in requires.iter_mut() {
            if let Requirement::Unresolved(reference) = requirement {
                let step = lookup(reference.as_str())
                    .ok_or_else(|| UnresolvedReferenceError::new(reference.clone(), &self.full_name))?;
                *requirement = Requirement::Resolved(Arc::downgrade(&step));
            }
        }
        Ok(())
    }

    /// All transitive requirements, dependencies first.
    pub fn requirement_stack(&self) -> Result<Vec<Arc<Step>>> {
        self.pipeline()?.requirement_stack(self)
    }

    /// Full names of [`Self::requirement_stack`].
    pub fn requirement_names(&self) -> Result<Vec<String>> {
        Ok(self
            .requirement_stack()?
            .iter()
            .map(|step| step.full_name().to_string())
            .collect())
    }

    /// Depth of the step in the requirement graph.
    ///
    /// With `selfish`, only requirement edges into the step's own pipe count.
    pub fn get_level(&self, selfish: bool) -> Result<usize> {
        self.pipeline()?.resolve()?;
        let mut level = if selfish {
            StepLevel::within_pipe(&self.pipe_name)
        } else {
            StepLevel::whole_graph()
        };
        level.resolve(self)
    }

    /// Runs the worker directly, bypassing the cache.
    pub fn call(&self, session: &Session, args: &WorkerArgs, extra: &str) -> Result<OutputData> {
        self.worker
            .run(session, args, extra)
            .map_err(|source| StepflowError::Worker {
                step: self.full_name.clone(),
                source,
            })
    }

    /// Builds this step's disk object through the owning pipe.
    pub fn disk_object(&self, session: &Session, extra: Option<&str>) -> Result<Box<dyn DiskObject>> {
        let pipe = self.pipe()?;
        let extra = extra.unwrap_or_else(|| pipe.default_extra());
        pipe.disk_object(session, self, extra)
    }

    /// The step of the same pipe whose artifact is on disk, if any.
    pub fn disk_step(&self, session: &Session, extra: Option<&str>) -> Result<Option<Arc<Step>>> {
        let pipe = self.pipe()?;
        let disk_object = self.disk_object(session, extra)?;
        Ok(disk_object.disk_step_name().and_then(|name| pipe.step(name)))
    }

    /// Loads this step's artifact.
    ///
    /// Fails with [`StepflowError::NotFound`] unless an artifact matching the
    /// step and its version is on disk.
    pub fn load(&self, session: &Session, extra: Option<&str>) -> Result<OutputData> {
        self.pipeline()?.resolve()?;
        let disk_object = self.disk_object(session, extra)?;
        if !disk_object.is_matching() {
            return Err(NotFoundError::new(&self.full_name, disk_object.status_message()).into());
        }
        disk_object.load()
    }

    /// Saves `data` as this step's artifact.
    pub fn save(&self, session: &Session, data: &OutputData, extra: Option<&str>) -> Result<()> {
        self.pipeline()?.resolve()?;
        let mut disk_object = self.disk_object(session, extra)?;
        disk_object.save(data)
    }

    /// Loads the artifact of the last step of `pipe_name` in the requirement stack.
    pub fn load_requirement(
        &self,
        pipe_name: &str,
        session: &Session,
        extra: Option<&str>,
    ) -> Result<OutputData> {
        let required = self
            .requirement_stack()?
            .into_iter()
            .rev()
            .find(|step| step.pipe_name() == pipe_name)
            .ok_or_else(|| UnresolvedReferenceError::new(pipe_name, &self.full_name))?;
        required.load(session, extra)
    }

    /// Accessor running load/save/generate over many sessions.
    #[must_use]
    pub fn multisession(&self) -> MultiSession<'_> {
        MultiSession::new(self)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("full_name", &self.full_name)
            .field("version", &self.version)
            .field("requires", &*self.requires.read())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
