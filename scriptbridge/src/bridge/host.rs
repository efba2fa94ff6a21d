//! Traits implemented by the orchestration host.

use std::sync::Arc;

/// The host-provided handle for the currently attached run.
///
/// Implementations must be cheap to query: modules call
/// [`HostBridge::is_interrupted`] once per loop iteration.
#[cfg_attr(test, mockall::automock)]
pub trait HostBridge: Send + Sync {
    /// Returns whether the host asked the current run to stop.
    fn is_interrupted(&self) -> bool;

    /// Returns the host session identifier.
    fn session_id(&self) -> String;

    /// Returns the position of the run inside the host pipeline, if any.
    fn context_path(&self) -> Option<String>;

    /// Reports a human-readable status line to the host.
    fn show_status(&self, message: &str);

    /// Returns the description of the executor being run.
    fn specification(&self) -> Arc<dyn SpecificationHandle>;

    /// Returns the host identifier of the executor being run.
    fn executor_id(&self) -> String;
}

/// Introspection handle for an executor description.
#[cfg_attr(test, mockall::automock)]
pub trait SpecificationHandle: Send + Sync {
    /// Returns the executor's display name.
    fn name(&self) -> String;

    /// Serializes the description to JSON.
    fn json_string(&self) -> String;
}

impl std::fmt::Debug for dyn HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("session_id", &self.session_id())
            .field("executor_id", &self.executor_id())
            .field("context_path", &self.context_path())
            .finish_non_exhaustive()
    }
}
