//! Error types for the stepflow framework.
//!
//! Construction-time problems (bad pipe shapes, name collisions, unresolved
//! or circular requirements) are fatal and surface as dedicated error
//! structs carrying an [`ErrorInfo`]. Cache misses and stale artifacts are
//! normal control flow and never reach this module, except when a caller
//! asks to [`load`](crate::step::Step::load) something that is not there.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = StepflowError> = std::result::Result<T, E>;

/// The main error type for stepflow operations.
#[derive(Debug, Error)]
pub enum StepflowError {
    /// A pipe was declared with an invalid shape.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A pipe or step name collided with an existing one.
    #[error("{0}")]
    DuplicateName(#[from] DuplicateNameError),

    /// A textual requirement does not name a registered step.
    #[error("{0}")]
    UnresolvedReference(#[from] UnresolvedReferenceError),

    /// The requirement graph contains a cycle.
    #[error("{0}")]
    CircularDependency(#[from] CircularDependencyError),

    /// Requirement traversal went deeper than the configured ceiling.
    #[error(
        "Requirement chain of '{step}' exceeds {limit} levels. \
         Investigate the requirement graph or raise max_recursion"
    )]
    RecursionLimit {
        /// The step being traversed when the limit was hit.
        step: String,
        /// The configured ceiling.
        limit: usize,
    },

    /// `refresh` and `skip` were both requested on one `generate` call.
    #[error(
        "Cannot generate '{step}' with both refresh and skip set: skip trusts the cache \
         or returns nothing, refresh ignores the cache and recomputes"
    )]
    ConflictingFlags {
        /// The step on which `generate` was called.
        step: String,
    },

    /// Nothing loadable was found for a step.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A worker function returned an error.
    #[error("Worker of '{step}' failed: {source}")]
    Worker {
        /// Full name of the step whose worker failed.
        step: String,
        /// The underlying worker error.
        #[source]
        source: anyhow::Error,
    },

    /// Multi-session helpers received a value list of the wrong length.
    #[error("Got {values} {what} for {sessions} sessions, cannot map them one to one")]
    ArgumentMismatch {
        /// What was supplied per session (extras, data).
        what: &'static str,
        /// Number of sessions.
        sessions: usize,
        /// Number of supplied values.
        values: usize,
    },

    /// A step or pipe outlived the pipeline that owned it.
    #[error("'{0}' is no longer attached to a live pipeline")]
    Detached(String),

    /// An artifact file name pattern could not be compiled.
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StepflowError {
    /// Returns true for "nothing to load" failures, including I/O not-found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns the diagnostic info attached to structural errors.
    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Configuration(err) => Some(&err.error_info),
            Self::DuplicateName(err) => Some(&err.error_info),
            Self::UnresolvedReference(err) => Some(&err.error_info),
            Self::CircularDependency(err) => Some(&err.error_info),
            _ => None,
        }
    }
}

/// Diagnostic metadata attached to structural errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "STEPFLOW-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ErrorSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipe is declared with an invalid shape.
#[derive(Debug, Clone, Error)]
#[error("Invalid pipe '{pipe}': {message}")]
pub struct ConfigurationError {
    /// The offending pipe.
    pub pipe: String,
    /// What is wrong with it.
    pub message: String,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(pipe: impl Into<String>, message: impl Into<String>) -> Self {
        let pipe = pipe.into();
        let message = message.into();
        let error_info = ErrorInfo::new("STEPFLOW-CONFIG", message.clone())
            .with_context_entry("pipe", pipe.clone());
        Self {
            pipe,
            message,
            error_info,
        }
    }
}

/// Error raised when a name is registered twice.
#[derive(Debug, Clone, Error)]
#[error("A {kind} named '{name}' is already registered")]
pub struct DuplicateNameError {
    /// The colliding name.
    pub name: String,
    /// What kind of object collided ("pipe" or "step").
    pub kind: &'static str,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl DuplicateNameError {
    /// Creates a new duplicate name error.
    #[must_use]
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        let name = name.into();
        let error_info = ErrorInfo::new("STEPFLOW-DUPLICATE", format!("Duplicate {kind} '{name}'"))
            .with_context_entry(kind, name.clone());
        Self {
            name,
            kind,
            error_info,
        }
    }
}

/// Error raised when a requirement string cannot be matched in the registry.
#[derive(Debug, Clone, Error)]
#[error("'{requested_by}' requires '{reference}', which has not been registered to the pipeline")]
pub struct UnresolvedReferenceError {
    /// The unresolved reference, as written.
    pub reference: String,
    /// Full name of the step declaring the requirement.
    pub requested_by: String,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl UnresolvedReferenceError {
    /// Creates a new unresolved reference error.
    #[must_use]
    pub fn new(reference: impl Into<String>, requested_by: impl Into<String>) -> Self {
        let reference = reference.into();
        let requested_by = requested_by.into();
        let error_info = ErrorInfo::new(
            "STEPFLOW-UNRESOLVED",
            format!("Requirement '{reference}' not found"),
        )
        .with_context_entry("step", requested_by.clone());
        Self {
            reference,
            requested_by,
            error_info,
        }
    }
}

/// Error raised when a cycle is found in the requirement graph.
#[derive(Debug, Clone, Error)]
#[error("Circular requirement: {}", path.join(" -> "))]
pub struct CircularDependencyError {
    /// Full names of the steps forming the cycle, first node repeated last.
    pub path: Vec<String>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl CircularDependencyError {
    /// Creates a new circular dependency error.
    #[must_use]
    pub fn new(path: Vec<String>) -> Self {
        let error_info = ErrorInfo::new(
            "STEPFLOW-CYCLE",
            format!("Requirement graph contains a cycle: {}", path.join(" -> ")),
        );
        Self { path, error_info }
    }
}

/// Error raised when a step has nothing loadable on disk.
#[derive(Debug, Clone, Error)]
#[error("Cannot load '{step}': {status}")]
pub struct NotFoundError {
    /// Full name of the step.
    pub step: String,
    /// What was found on disk and why it was rejected.
    pub status: String,
}

impl NotFoundError {
    /// Creates a new not-found error.
    #[must_use]
    pub fn new(step: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: status.into(),
        }
    }
}

/// Default fix hints for the structural error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "STEPFLOW-CYCLE" => Some(
                "Check the `requires` lists of the steps in the cycle. \
                 One of them must stop requiring the other.",
            ),
            "STEPFLOW-UNRESOLVED" => Some(
                "Register the required pipe before using the pipeline, \
                 and spell requirements as \"Pipe.step\".",
            ),
            "STEPFLOW-CONFIG" => Some(
                "A pipe needs at least one step, and every step but the first \
                 must require another one so that the pipe forms a chain.",
            ),
            "STEPFLOW-DUPLICATE" => Some("Rename one of the colliding pipes or steps."),
            _ => None,
        }
    }
}
