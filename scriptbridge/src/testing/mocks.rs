//! Mock bridges and modules for testing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bridge::{HostBridge, SpecificationHandle};
use crate::context::ExecutionContext;
use crate::errors::{Result, ScriptbridgeError};
use crate::runtime::Executable;
use crate::specification::ScriptSpecification;

/// A bridge that reports an interruption once it was polled `after` times.
#[derive(Debug)]
pub struct InterruptAfterBridge {
    after: u64,
    polls: AtomicU64,
    context_path: Option<String>,
    specification: Arc<ScriptSpecification>,
    statuses: Mutex<Vec<String>>,
}

impl InterruptAfterBridge {
    /// Creates a bridge answering `false` to the first `after` polls.
    #[must_use]
    pub fn new(after: u64) -> Self {
        Self {
            after,
            polls: AtomicU64::new(0),
            context_path: None,
            specification: Arc::new(ScriptSpecification::new("mock-executor", "Mock", "mock.lua")),
            statuses: Mutex::new(Vec::new()),
        }
    }

    /// Sets the context path.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = Some(context_path.into());
        self
    }

    /// Returns how many times the bridge was polled.
    #[must_use]
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Returns the recorded status lines.
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }
}

impl HostBridge for InterruptAfterBridge {
    fn is_interrupted(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= self.after
    }

    fn session_id(&self) -> String {
        "mock-session".to_string()
    }

    fn context_path(&self) -> Option<String> {
        self.context_path.clone()
    }

    fn show_status(&self, message: &str) {
        self.statuses.lock().push(message.to_string());
    }

    fn specification(&self) -> Arc<dyn SpecificationHandle> {
        self.specification.clone()
    }

    fn executor_id(&self) -> String {
        self.specification.id.clone()
    }
}

/// A native module that records calls and returns a configurable value.
#[derive(Debug)]
pub struct RecordingModule {
    name: String,
    result: Mutex<Option<serde_json::Value>>,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl RecordingModule {
    /// Creates a module returning nothing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the value to return.
    pub fn set_result(&self, result: serde_json::Value) {
        *self.result.lock() = Some(result);
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the inputs of each call.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<serde_json::Value> {
        self.calls.lock().clone()
    }
}

impl Executable for RecordingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<serde_json::Value>> {
        self.calls.lock().push(ctx.inputs.to_json());
        Ok(self.result.lock().clone())
    }
}

/// A native module that always fails like a script raising an error.
#[derive(Debug)]
pub struct FailingModule {
    name: String,
    message: String,
}

impl FailingModule {
    /// Creates a failing module.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Executable for FailingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _ctx: &mut ExecutionContext) -> Result<Option<serde_json::Value>> {
        Err(ScriptbridgeError::callee(&self.name, &self.message))
    }
}
