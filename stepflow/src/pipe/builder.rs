//! Pipe builder with validation.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{Pipe, PreRunHook};
use crate::disk::{ArtifactStore, DiskObjectFactory, FsStore, StoreDiskObjectFactory};
use crate::errors::{ConfigurationError, DuplicateNameError, Result};
use crate::pipeline::Pipeline;
use crate::step::{OutputData, Step, StepDef};

/// Builder for pipes, registered with [`Pipeline::register_pipe`].
#[derive(Clone)]
pub struct PipeBuilder {
    name: String,
    single_step: bool,
    default_extra: String,
    steps: Vec<StepDef>,
    store: Option<Arc<dyn ArtifactStore>>,
    disk_factory: Option<Arc<dyn DiskObjectFactory>>,
    pre_run: Option<PreRunHook>,
}

impl PipeBuilder {
    /// Creates a builder for a pipe named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            single_step: false,
            default_extra: String::new(),
            steps: Vec::new(),
            store: None,
            disk_factory: None,
            pre_run: None,
        }
    }

    /// Declares the pipe as holding exactly one step.
    #[must_use]
    pub fn single_step(mut self, single_step: bool) -> Self {
        self.single_step = single_step;
        self
    }

    /// Sets the extra used when a call gives none.
    #[must_use]
    pub fn default_extra(mut self, extra: impl Into<String>) -> Self {
        self.default_extra = extra.into();
        self
    }

    /// Adds a step. Declaration order is kept.
    #[must_use]
    pub fn step(mut self, step: StepDef) -> Self {
        self.steps.push(step);
        self
    }

    /// Stores artifacts in `store` instead of the filesystem.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the default disk object factory. Takes precedence over [`Self::store`].
    #[must_use]
    pub fn disk_factory(mut self, factory: Arc<dyn DiskObjectFactory>) -> Self {
        self.disk_factory = Some(factory);
        self
    }

    /// Sets a transform applied to every computed output before it is saved.
    #[must_use]
    pub fn pre_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(OutputData) -> OutputData + Send + Sync + 'static,
    {
        self.pre_run = Some(Arc::new(hook));
        self
    }

    /// Returns the pipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks the pipe shape.
    ///
    /// # Errors
    ///
    /// Returns an error for an unnamed or empty pipe, a step name used
    /// twice, a single-step pipe with several steps, or steps that do not
    /// form a chain (every step but one must declare a requirement).
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigurationError::new(&self.name, "pipe name cannot be empty").into());
        }
        if self.name.contains('.') {
            return Err(ConfigurationError::new(
                &self.name,
                "pipe name cannot contain '.', it separates pipe and step in references",
            )
            .into());
        }
        if self.steps.is_empty() {
            return Err(ConfigurationError::new(&self.name, "a pipe must have at least one step").into());
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name().is_empty() || step.name().contains('.') {
                return Err(ConfigurationError::new(
                    &self.name,
                    format!("invalid step name '{}'", step.name()),
                )
                .into());
            }
            if !seen.insert(step.name()) {
                return Err(DuplicateNameError::new("step", format!("{}.{}", self.name, step.name())).into());
            }
        }

        let count = self.steps.len();
        if self.single_step && count > 1 {
            return Err(ConfigurationError::new(
                &self.name,
                format!("declared single_step but has {count} steps"),
            )
            .into());
        }

        let chained = self.steps.iter().filter(|s| s.has_requirements()).count();
        if count > 1 && chained < count - 1 {
            return Err(ConfigurationError::new(
                &self.name,
                format!(
                    "{count} steps but only {chained} declare requirements; \
                     steps must chain, with at most one step without requirements"
                ),
            )
            .into());
        }
        Ok(())
    }

    /// Validates and builds the pipe, bound to `pipeline`.
    pub(crate) fn build(self, pipeline: &Pipeline) -> Result<Arc<Pipe>> {
        self.validate()?;

        let disk_factory: Arc<dyn DiskObjectFactory> = match self.disk_factory {
            Some(factory) => factory,
            None => {
                let config = pipeline.config();
                let prefix = config
                    .storage
                    .file_prefix
                    .clone()
                    .unwrap_or_else(|| pipeline.name().to_string());
                let store: Arc<dyn ArtifactStore> = match self.store {
                    Some(store) => store,
                    None => Arc::new(FsStore::new()),
                };
                Arc::new(StoreDiskObjectFactory::new(store, config.storage.clone(), prefix))
            }
        };

        let name = self.name;
        let step_order: Vec<String> = self.steps.iter().map(|s| s.name().to_string()).collect();
        let defs = self.steps;
        let pipe = Arc::new_cyclic(|weak_pipe| {
            let steps = defs
                .into_iter()
                .map(|def| {
                    let step_name = def.name().to_string();
                    (step_name, Arc::new(Step::new(&name, def, weak_pipe.clone())))
                })
                .collect();
            Pipe {
                name: name.clone(),
                single_step: self.single_step,
                default_extra: self.default_extra,
                steps,
                step_order,
                pipeline: pipeline.downgrade(),
                disk_factory,
                pre_run: self.pre_run,
            }
        });
        debug!(pipe = %pipe.name(), steps = ?pipe.step_names(), "built pipe");
        Ok(pipe)
    }
}

impl fmt::Debug for PipeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeBuilder")
            .field("name", &self.name)
            .field("single_step", &self.single_step)
            .field("default_extra", &self.default_extra)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepflowError;
    use serde_json::json;

    fn def(name: &str) -> StepDef {
        StepDef::new(name, |_, _, _| Ok(json!(null)))
    }

    #[test]
    fn test_chained_pipe_is_valid() {
        let builder = PipeBuilder::new("P")
            .step(def("a"))
            .step(def("b").requires("P.a"))
            .step(def("c").requires("P.b"));

        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_empty_pipe_rejected() {
        let err = PipeBuilder::new("P").validate().unwrap_err();
        assert!(matches!(err, StepflowError::Configuration(_)));
    }

    #[test]
    fn test_unchained_steps_rejected() {
        let err = PipeBuilder::new("P")
            .step(def("a"))
            .step(def("b"))
            .validate()
            .unwrap_err();

        assert!(matches!(err, StepflowError::Configuration(_)));
        assert!(err.to_string().contains("only 0 declare requirements"));
    }

    #[test]
    fn test_single_step_with_two_steps_rejected() {
        let err = PipeBuilder::new("P")
            .single_step(true)
            .step(def("a"))
            .step(def("b").requires("P.a"))
            .validate()
            .unwrap_err();

        assert!(matches!(err, StepflowError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = PipeBuilder::new("P")
            .step(def("a"))
            .step(def("a").requires("Q.x"))
            .validate()
            .unwrap_err();

        match err {
            StepflowError::DuplicateName(err) => assert_eq!(err.name, "P.a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dotted_names_rejected() {
        assert!(PipeBuilder::new("P.x").step(def("a")).validate().is_err());
        assert!(PipeBuilder::new("P").step(def("a.b")).validate().is_err());
    }
}
