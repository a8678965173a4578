//! Worker functions wrapped by steps.

use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::session::Session;

/// Output of a worker: any serializable value, `Null` when absent.
pub type OutputData = Value;

/// Extra positional and keyword arguments forwarded to a worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerArgs {
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
}

impl WorkerArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Gets a positional argument.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Gets a keyword argument.
    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

/// The computation a step caches.
pub trait Worker: Send + Sync {
    /// Computes the step's output for `session` and `extra`.
    fn run(&self, session: &Session, args: &WorkerArgs, extra: &str) -> anyhow::Result<OutputData>;
}

/// A closure-based worker.
pub struct FnWorker<F>
where
    F: Fn(&Session, &WorkerArgs, &str) -> anyhow::Result<OutputData> + Send + Sync,
{
    func: F,
}

impl<F> FnWorker<F>
where
    F: Fn(&Session, &WorkerArgs, &str) -> anyhow::Result<OutputData> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnWorker<F>
where
    F: Fn(&Session, &WorkerArgs, &str) -> anyhow::Result<OutputData> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

impl<F> Worker for FnWorker<F>
where
    F: Fn(&Session, &WorkerArgs, &str) -> anyhow::Result<OutputData> + Send + Sync,
{
    fn run(&self, session: &Session, args: &WorkerArgs, extra: &str) -> anyhow::Result<OutputData> {
        (self.func)(session, args, extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_worker_args_accessors() {
        let args = WorkerArgs::new().with_arg(3).with_kwarg("window", "hann");

        assert_eq!(args.arg(0), Some(&json!(3)));
        assert_eq!(args.arg(1), None);
        assert_eq!(args.kwarg("window"), Some(&json!("hann")));
    }

    #[test]
    fn test_fn_worker_forwards_everything() {
        let worker = FnWorker::new(|session: &Session, args: &WorkerArgs, extra: &str| {
            Ok(json!({
                "subject": session.subject,
                "n": args.arg(0).cloned(),
                "extra": extra,
            }))
        });
        let session = Session::new("m1", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), None, "/tmp");

        let output = worker
            .run(&session, &WorkerArgs::new().with_arg(2), "left")
            .unwrap();
        assert_eq!(output, json!({"subject": "m1", "n": 2, "extra": "left"}));
    }
}
