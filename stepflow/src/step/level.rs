//! Step depth in the requirement graph.

use std::collections::HashMap;

use super::definition::Step;
use crate::errors::Result;

/// Computes step levels: 0 without requirements, else one more than the
/// deepest requirement.
///
/// In pipe-restricted mode, edges into other pipes add nothing, so the level
/// is the position of a step in its own pipe's chain. Cross-pipe staleness is
/// handled by version tags, not levels.
///
/// The requirement graph must be acyclic, which a resolved pipeline
/// guarantees.
#[derive(Debug, Default)]
pub struct StepLevel {
    pipe: Option<String>,
    memo: HashMap<String, usize>,
}

impl StepLevel {
    /// Levels over the whole graph.
    #[must_use]
    pub fn whole_graph() -> Self {
        Self::default()
    }

    /// Levels counting only edges into `pipe_name`.
    #[must_use]
    pub fn within_pipe(pipe_name: &str) -> Self {
        Self {
            pipe: Some(pipe_name.to_string()),
            memo: HashMap::new(),
        }
    }

    /// Level of `step`.
    pub fn resolve(&mut self, step: &Step) -> Result<usize> {
        if let Some(level) = self.memo.get(step.full_name()) {
            return Ok(*level);
        }

        let mut level = 0;
        for requirement in step.resolved_requirements()? {
            let weight = match &self.pipe {
                Some(pipe) if pipe != requirement.pipe_name() => 0,
                _ => 1,
            };
            level = level.max(self.resolve(&requirement)? + weight);
        }

        self.memo.insert(step.full_name().to_string(), level);
        Ok(level)
    }
}
