//! Running a step over many sessions at once.

use super::definition::Step;
use super::generate::GenerateOptions;
use super::worker::OutputData;
use crate::errors::{Result, StepflowError};
use crate::session::Session;

/// Extras used for a batch of sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Extras {
    /// The pipe's default extra for every session.
    #[default]
    Default,
    /// One extra for every session.
    Same(String),
    /// One extra per session, in order.
    PerSession(Vec<String>),
}

impl Extras {
    fn expand(&self, sessions: usize) -> Result<Vec<Option<&str>>> {
        match self {
            Self::Default => Ok(vec![None; sessions]),
            Self::Same(extra) => Ok(vec![Some(extra.as_str()); sessions]),
            Self::PerSession(extras) if extras.len() == sessions => {
                Ok(extras.iter().map(|e| Some(e.as_str())).collect())
            }
            Self::PerSession(extras) => Err(StepflowError::ArgumentMismatch {
                what: "extras",
                sessions,
                values: extras.len(),
            }),
        }
    }
}

/// Load, save and generate over a batch of sessions.
///
/// Results are listed in session order, keyed by session identity.
#[derive(Debug, Clone, Copy)]
pub struct MultiSession<'a> {
    step: &'a Step,
}

impl<'a> MultiSession<'a> {
    pub(crate) fn new(step: &'a Step) -> Self {
        Self { step }
    }

    /// Loads the step's artifact of every session.
    pub fn load(&self, sessions: &[Session], extras: &Extras) -> Result<Vec<(String, OutputData)>> {
        let extras = extras.expand(sessions.len())?;
        sessions
            .iter()
            .zip(extras)
            .map(|(session, extra)| Ok((session.identity(), self.step.load(session, extra)?)))
            .collect()
    }

    /// Saves one value per session.
    pub fn save(&self, sessions: &[Session], data: &[OutputData], extras: &Extras) -> Result<()> {
        if data.len() != sessions.len() {
            return Err(StepflowError::ArgumentMismatch {
                what: "values",
                sessions: sessions.len(),
                values: data.len(),
            });
        }
        let extras = extras.expand(sessions.len())?;
        for ((session, value), extra) in sessions.iter().zip(data).zip(extras) {
            self.step.save(session, value, extra)?;
        }
        Ok(())
    }

    /// Generates the step for every session with the same options.
    pub fn generate(
        &self,
        sessions: &[Session],
        options: &GenerateOptions,
        extras: &Extras,
    ) -> Result<Vec<(String, Option<OutputData>)>> {
        let extras = extras.expand(sessions.len())?;
        sessions
            .iter()
            .zip(extras)
            .map(|(session, extra)| {
                let output = match extra {
                    Some(extra) => self
                        .step
                        .generate(session, &options.clone().with_extra(extra))?,
                    None => self.step.generate(session, options)?,
                };
                Ok((session.identity(), output))
            })
            .collect()
    }
}
