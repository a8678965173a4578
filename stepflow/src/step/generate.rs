//! The generation state machine: skip, load, recompute or refresh.

use tracing::{info, info_span, warn};

use super::definition::Step;
use super::worker::{OutputData, WorkerArgs};
use crate::errors::{Result, StepflowError};
use crate::session::Session;

/// Which requirements to recompute before a step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefreshRequirements {
    /// Refresh none.
    #[default]
    None,
    /// Refresh the whole requirement stack.
    All,
    /// Refresh the requirements whose pipe name or full name is listed.
    Only(Vec<String>),
}

impl RefreshRequirements {
    /// Returns true if any refresh is requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Only(names) => !names.is_empty(),
        }
    }

    /// Returns true if `step` must be refreshed.
    #[must_use]
    pub fn covers(&self, step: &Step) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Only(names) => names
                .iter()
                .any(|name| name == step.pipe_name() || name == step.full_name()),
        }
    }
}

/// Options of [`Step::generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Disambiguating tag; the pipe's default when absent.
    pub extra: Option<String>,
    /// Return nothing when an artifact exists instead of loading it.
    pub skip: bool,
    /// Ignore any artifact and recompute.
    pub refresh: bool,
    /// Requirements to recompute first. Implies `run_requirements`.
    pub refresh_requirements: RefreshRequirements,
    /// Make sure requirements exist on disk before computing.
    pub run_requirements: bool,
    /// Persist a computed output.
    pub save_output: bool,
    /// Arguments forwarded to the worker.
    pub args: WorkerArgs,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            extra: None,
            skip: false,
            refresh: false,
            refresh_requirements: RefreshRequirements::None,
            run_requirements: false,
            save_output: true,
            args: WorkerArgs::default(),
        }
    }
}

impl GenerateOptions {
    /// Creates default options: load if possible, compute and save otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extra.
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Sets `skip`.
    #[must_use]
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Sets `refresh`.
    #[must_use]
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sets which requirements to refresh.
    #[must_use]
    pub fn refresh_requirements(mut self, refresh_requirements: RefreshRequirements) -> Self {
        self.refresh_requirements = refresh_requirements;
        self
    }

    /// Sets `run_requirements`.
    #[must_use]
    pub fn run_requirements(mut self, run_requirements: bool) -> Self {
        self.run_requirements = run_requirements;
        self
    }

    /// Sets `save_output`.
    #[must_use]
    pub fn save_output(mut self, save_output: bool) -> Self {
        self.save_output = save_output;
        self
    }

    /// Sets the worker arguments.
    #[must_use]
    pub fn with_args(mut self, args: WorkerArgs) -> Self {
        self.args = args;
        self
    }
}

impl Step {
    /// Returns the step's output, from disk when a fresh artifact exists,
    /// computing it (and its stale or missing requirements) otherwise.
    ///
    /// Returns `Ok(None)` when `skip` is set and an artifact exists.
    pub fn generate(&self, session: &Session, options: &GenerateOptions) -> Result<Option<OutputData>> {
        let pipe = self.pipe()?;
        let extra = options
            .extra
            .clone()
            .unwrap_or_else(|| pipe.default_extra().to_string());
        let span = info_span!("generate", step = %self.full_name(), session = %session.identity(), extra = %extra);
        let _entered = span.enter();

        let pipeline = pipe.pipeline()?;
        pipeline.resolve()?;

        if options.refresh && options.skip {
            return Err(StepflowError::ConflictingFlags {
                step: self.full_name().to_string(),
            });
        }

        let mut run_requirements =
            options.run_requirements || options.refresh_requirements.is_requested();
        let mut skip_after_tree = false;
        let mut disk_object = None;

        if options.refresh {
            info!("refresh requested, ignoring artifacts on disk");
        } else {
            let disk = pipe.disk_object(session, self, &extra)?;
            if disk.is_loadable() {
                if disk.step_level_too_low() {
                    info!(
                        disk_step = disk.disk_step_name().unwrap_or_default(),
                        "artifact comes from a lower step, regenerating the requirement tree"
                    );
                    run_requirements = true;
                } else if disk.version_deprecated() {
                    info!(
                        disk_version = disk.disk_version().unwrap_or_default(),
                        "artifact has an outdated version, regenerating the requirement tree"
                    );
                    run_requirements = true;
                } else if options.skip {
                    info!("artifact exists, skipping");
                    if !run_requirements || options.refresh_requirements.is_requested() {
                        return Ok(None);
                    }
                    skip_after_tree = true;
                } else {
                    match disk.load() {
                        Ok(output) => {
                            info!("loaded artifact");
                            return Ok(Some(output));
                        }
                        Err(err) if err.is_not_found() => {
                            warn!(error = %err, "artifact vanished before loading, recomputing");
                        }
                        Err(err) => return Err(err),
                    }
                }
            } else {
                info!(status = %disk.status_message(), "no usable artifact");
            }
            disk_object = Some(disk);
        }

        if run_requirements {
            self.run_requirements(session, &extra, &options.refresh_requirements)?;
        }

        if skip_after_tree {
            return Ok(None);
        }

        info!("computing");
        let output = pipe.pre_run(self.call(session, &options.args, &extra)?);

        if options.save_output {
            let mut disk = match disk_object {
                Some(disk) => disk,
                None => pipe.disk_object(session, self, &extra)?,
            };
            info!("saving output");
            disk.save(&output)?;
        }
        Ok(Some(output))
    }

    fn run_requirements(
        &self,
        session: &Session,
        extra: &str,
        refresh_requirements: &RefreshRequirements,
    ) -> Result<()> {
        if refresh_requirements.is_requested() {
            // Whole stack, dependencies first, refreshing the selected ones.
            for requirement in self.requirement_stack()? {
                let refresh = refresh_requirements.covers(&requirement);
                let options = GenerateOptions::new()
                    .with_extra(self.requirement_extra(&requirement, extra)?)
                    .run_requirements(true)
                    .refresh(refresh)
                    .skip(!refresh);
                requirement.generate(session, &options)?;
            }
        } else {
            // Direct requirements only; each one checks its own in turn, so
            // shared ancestors may be checked more than once.
            for requirement in self.requirements()? {
                info!(requirement = %requirement.full_name(), "checking requirement");
                let options = GenerateOptions::new()
                    .with_extra(self.requirement_extra(&requirement, extra)?)
                    .run_requirements(true)
                    .skip(true);
                requirement.generate(session, &options)?;
            }
        }
        Ok(())
    }

    /// Requirements of the same pipe share the extra; others use their pipe's default.
    fn requirement_extra(&self, requirement: &Step, extra: &str) -> Result<String> {
        if requirement.pipe_name() == self.pipe_name() {
            Ok(extra.to_string())
        } else {
            requirement.default_extra()
        }
    }
}
