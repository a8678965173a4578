//! Requirement graph traversal.

use std::sync::Arc;

use crate::errors::{CircularDependencyError, Result, StepflowError};
use crate::step::Step;

/// A view of the requirement graph.
///
/// Nodes are listed in registration order. Edges point from a requirement
/// to the step requiring it, as indices into the node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementGraph<N> {
    nodes: Vec<N>,
    edges: Vec<(usize, usize)>,
}

impl<N> RequirementGraph<N> {
    pub(crate) fn new(nodes: Vec<N>, edges: Vec<(usize, usize)>) -> Self {
        Self { nodes, edges }
    }

    /// The nodes.
    #[must_use]
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// `(requirement, dependent)` index pairs.
    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Edges as node pairs.
    pub fn edge_nodes(&self) -> impl Iterator<Item = (&N, &N)> + '_ {
        self.edges
            .iter()
            .map(|&(from, to)| (&self.nodes[from], &self.nodes[to]))
    }

    /// Nodes without requirements.
    #[must_use]
    pub fn roots(&self) -> Vec<&N> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.edges.iter().any(|&(_, to)| to == *index))
            .map(|(_, node)| node)
            .collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The same graph with every node mapped through `f`.
    pub fn map<M, F: FnMut(&N) -> M>(&self, f: F) -> RequirementGraph<M> {
        RequirementGraph {
            nodes: self.nodes.iter().map(f).collect(),
            edges: self.edges.clone(),
        }
    }
}

/// Collects the transitive requirements of `step`, dependencies first and
/// without duplicates. `step` itself is not included.
///
/// Requirements must already be resolved.
pub(crate) fn collect_requirements(step: &Step, max_recursion: usize) -> Result<Vec<Arc<Step>>> {
    let mut stack = Vec::new();
    let mut parents = vec![step.full_name().to_string()];
    visit(step, &mut parents, &mut stack, max_recursion)?;
    Ok(stack)
}

fn visit(
    step: &Step,
    parents: &mut Vec<String>,
    stack: &mut Vec<Arc<Step>>,
    max_recursion: usize,
) -> Result<()> {
    if parents.len() > max_recursion {
        return Err(StepflowError::RecursionLimit {
            step: step.full_name().to_string(),
            limit: max_recursion,
        });
    }

    for requirement in step.resolved_requirements()? {
        if let Some(start) = parents.iter().position(|p| p == requirement.full_name()) {
            let mut path = parents[start..].to_vec();
            path.push(requirement.full_name().to_string());
            return Err(CircularDependencyError::new(path).into());
        }
        if stack.iter().any(|s| s.full_name() == requirement.full_name()) {
            continue;
        }

        parents.push(requirement.full_name().to_string());
        visit(&requirement, parents, stack, max_recursion)?;
        parents.pop();
        stack.push(requirement);
    }
    Ok(())
}
