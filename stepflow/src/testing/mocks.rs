//! Mock workers for testing.

use parking_lot::Mutex;
use serde_json::Value;

use crate::session::Session;
use crate::step::{OutputData, Worker, WorkerArgs};

/// One recorded worker call.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCall {
    /// Identity of the session the worker ran for.
    pub session: String,
    /// Extra the worker received.
    pub extra: String,
    /// Arguments the worker received.
    pub args: WorkerArgs,
}

/// A worker that records its calls and returns a configurable output.
#[derive(Debug)]
pub struct RecordingWorker {
    output: Mutex<OutputData>,
    calls: Mutex<Vec<WorkerCall>>,
}

impl RecordingWorker {
    /// Creates a worker returning `output`.
    #[must_use]
    pub fn new(output: OutputData) -> Self {
        Self {
            output: Mutex::new(output),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the output to return from now on.
    pub fn set_output(&self, output: OutputData) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the worker ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<WorkerCall> {
        self.calls.lock().clone()
    }

    /// Returns the extras of every call, oldest first.
    #[must_use]
    pub fn recorded_extras(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.extra.clone()).collect()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl Default for RecordingWorker {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Worker for RecordingWorker {
    fn run(&self, session: &Session, args: &WorkerArgs, extra: &str) -> anyhow::Result<OutputData> {
        self.calls.lock().push(WorkerCall {
            session: session.identity(),
            extra: extra.to_string(),
            args: args.clone(),
        });
        Ok(self.output.lock().clone())
    }
}

/// A worker that always fails.
#[derive(Debug, Clone)]
pub struct FailingWorker {
    message: String,
}

impl FailingWorker {
    /// Creates a worker failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Worker for FailingWorker {
    fn run(&self, _session: &Session, _args: &WorkerArgs, _extra: &str) -> anyhow::Result<OutputData> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}
