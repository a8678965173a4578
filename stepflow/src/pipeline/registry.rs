//! The pipeline registry: pipes by name, and lazy requirement resolution.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::graph::{collect_requirements, RequirementGraph};
use crate::config::PipelineConfig;
use crate::errors::{DuplicateNameError, Result};
use crate::pipe::{Pipe, PipeBuilder};
use crate::step::Step;

pub(crate) struct PipelineInner {
    name: String,
    config: PipelineConfig,
    registry: RwLock<Registry>,
}

#[derive(Default)]
struct Registry {
    pipes: HashMap<String, Arc<Pipe>>,
    order: Vec<String>,
    resolved: bool,
}

impl Registry {
    fn steps(&self) -> Vec<Arc<Step>> {
        self.order
            .iter()
            .filter_map(|name| self.pipes.get(name))
            .flat_map(|pipe| pipe.steps())
            .collect()
    }

    /// Finds the step named by a `"Pipe.step"` reference. A single-step pipe
    /// answers with its step whatever the step part, or without one.
    fn lookup(&self, reference: &str) -> Option<Arc<Step>> {
        let (pipe_name, step_name) = match reference.split_once('.') {
            Some((pipe_name, step_name)) => (pipe_name, Some(step_name)),
            None => (reference, None),
        };
        let pipe = self.pipes.get(pipe_name)?;
        if pipe.is_single_step() {
            return pipe.steps().into_iter().next();
        }
        pipe.step(step_name?)
    }
}

/// A namespace of pipes.
///
/// `Pipeline` is a cheap handle: clones share the same registry. Pipes and
/// steps only hold weak references back to it, so the pipeline must be kept
/// alive for as long as its steps are used.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    /// Creates an empty pipeline with the default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, PipelineConfig::default())
    }

    /// Creates an empty pipeline.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                name: name.into(),
                config,
                registry: RwLock::new(Registry::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<PipelineInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<PipelineInner> {
        Arc::downgrade(&self.inner)
    }

    /// The pipeline name, also the default artifact file prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Builds a pipe and registers it. Resolution is invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe name is taken or the pipe shape is invalid.
    pub fn register_pipe(&self, builder: PipeBuilder) -> Result<Arc<Pipe>> {
        if self.inner.registry.read().pipes.contains_key(builder.name()) {
            return Err(DuplicateNameError::new("pipe", builder.name()).into());
        }
        let pipe = builder.build(self)?;

        let mut registry = self.inner.registry.write();
        if registry.pipes.contains_key(pipe.name()) {
            return Err(DuplicateNameError::new("pipe", pipe.name()).into());
        }
        registry.order.push(pipe.name().to_string());
        registry.pipes.insert(pipe.name().to_string(), Arc::clone(&pipe));
        registry.resolved = false;

        info!(
            pipeline = %self.name(),
            pipe = %pipe.name(),
            steps = ?pipe.step_names(),
            "registered pipe"
        );
        Ok(pipe)
    }

    /// Gets a pipe by name.
    #[must_use]
    pub fn pipe(&self, name: &str) -> Option<Arc<Pipe>> {
        self.inner.registry.read().pipes.get(name).cloned()
    }

    /// Pipes in registration order.
    #[must_use]
    pub fn pipes(&self) -> Vec<Arc<Pipe>> {
        let registry = self.inner.registry.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.pipes.get(name).cloned())
            .collect()
    }

    /// Gets a step by `"Pipe.step"` reference.
    #[must_use]
    pub fn step(&self, reference: &str) -> Option<Arc<Step>> {
        self.inner.registry.read().lookup(reference)
    }

    /// Returns true if every requirement is resolved and the graph is known acyclic.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.registry.read().resolved
    }

    /// Resolves textual requirements into steps and checks the graph for cycles.
    ///
    /// Does nothing if nothing was registered since the last successful call.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement names no registered step, if the
    /// graph has a cycle, or if a chain is deeper than `max_recursion`.
    pub fn resolve(&self) -> Result<()> {
        if self.inner.registry.read().resolved {
            return Ok(());
        }

        let mut registry = self.inner.registry.write();
        if registry.resolved {
            return Ok(());
        }

        let steps = registry.steps();
        for step in &steps {
            step.resolve_requirements(|reference| registry.lookup(reference))?;
        }
        for step in &steps {
            collect_requirements(step, self.config().max_recursion)?;
        }

        registry.resolved = true;
        debug!(pipeline = %self.name(), steps = steps.len(), "resolved requirements");
        Ok(())
    }

    /// All transitive requirements of `step`, dependencies first, without
    /// duplicates and without `step` itself.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails.
    pub fn requirement_stack(&self, step: &Step) -> Result<Vec<Arc<Step>>> {
        self.resolve()?;
        collect_requirements(step, self.config().max_recursion)
    }

    /// The whole requirement graph, over steps and over full names.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails.
    pub fn graph(&self) -> Result<(RequirementGraph<Arc<Step>>, RequirementGraph<String>)> {
        self.resolve()?;
        let nodes = self.inner.registry.read().steps();
        let edges = {
            let index: HashMap<&str, usize> = nodes
                .iter()
                .enumerate()
                .map(|(i, step)| (step.full_name(), i))
                .collect();
            let mut edges = Vec::new();
            for (to, step) in nodes.iter().enumerate() {
                for requirement in step.resolved_requirements()? {
                    if let Some(&from) = index.get(requirement.full_name()) {
                        edges.push((from, to));
                    }
                }
            }
            edges
        };

        let steps = RequirementGraph::new(nodes, edges);
        let names = steps.map(|step| step.full_name().to_string());
        Ok((steps, names))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("Pipeline")
            .field("name", &self.inner.name)
            .field("pipes", &registry.order)
            .field("resolved", &registry.resolved)
            .finish()
    }
}
