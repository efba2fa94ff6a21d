//! Host-owned context state.

use crate::bridge::{HostBridge, PlatformDescriptor};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The record describing the run a host currently has attached.
///
/// The host constructs one `ContextState`, shares it as `Arc<ContextState>`
/// with the loader and runner, and updates it before each run. Loaded
/// modules only read it.
///
/// The locks make the type `Send + Sync`; they do not make concurrent runs
/// meaningful. At most one run should be attached at a time.
#[derive(Default)]
pub struct ContextState {
    bridge: RwLock<Option<Arc<dyn HostBridge>>>,
    platform: RwLock<Option<Arc<PlatformDescriptor>>>,
    working_dir: RwLock<Option<PathBuf>>,
    context_path: RwLock<Option<String>>,
}

impl ContextState {
    /// Creates an empty state with no run attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(self, dir: impl Into<PathBuf>) -> Self {
        *self.working_dir.write() = Some(dir.into());
        self
    }

    /// Sets the platform descriptor.
    #[must_use]
    pub fn with_platform(self, platform: PlatformDescriptor) -> Self {
        *self.platform.write() = Some(Arc::new(platform));
        self
    }

    /// Returns the attached bridge, if any.
    #[must_use]
    pub fn bridge(&self) -> Option<Arc<dyn HostBridge>> {
        self.bridge.read().clone()
    }

    /// Returns the platform descriptor, if any.
    #[must_use]
    pub fn platform(&self) -> Option<Arc<PlatformDescriptor>> {
        self.platform.read().clone()
    }

    /// Returns the working directory, if set.
    #[must_use]
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.working_dir.read().clone()
    }

    /// Returns the context path of the attached run, if any.
    #[must_use]
    pub fn context_path(&self) -> Option<String> {
        self.context_path.read().clone()
    }

    /// Returns whether a run is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.bridge.read().is_some()
    }

    /// Returns whether the attached run was interrupted.
    ///
    /// Always false when no run is attached.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.bridge().is_some_and(|bridge| bridge.is_interrupted())
    }

    /// Sets the working directory used to resolve relative module paths.
    pub fn set_working_dir(&self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref().to_path_buf();
        debug!(working_dir = %dir.display(), "Working directory set");
        *self.working_dir.write() = Some(dir);
    }

    /// Clears the working directory.
    pub fn clear_working_dir(&self) {
        *self.working_dir.write() = None;
    }

    /// Sets the platform descriptor.
    pub fn set_platform(&self, platform: PlatformDescriptor) {
        *self.platform.write() = Some(Arc::new(platform));
    }

    /// Attaches a run.
    ///
    /// The context path is copied from the bridge. Attaching while another
    /// run is attached replaces it. Bridge methods are never called with the
    /// state locked.
    pub fn attach_run(&self, bridge: Arc<dyn HostBridge>) {
        let session_id = bridge.session_id();
        let executor_id = bridge.executor_id();
        let context_path = bridge.context_path();
        debug!(
            session_id = %session_id,
            executor_id = %executor_id,
            context_path = ?context_path,
            "Run attached"
        );

        let previous = {
            let mut current = self.bridge.write();
            let previous = current.replace(bridge);
            *self.context_path.write() = context_path;
            previous
        };
        if let Some(previous) = previous {
            warn!(
                previous_session = %previous.session_id(),
                session_id = %session_id,
                "Attaching a run while another run is attached"
            );
        }
    }

    /// Detaches the current run, if any.
    pub fn detach_run(&self) {
        let previous = {
            let mut current = self.bridge.write();
            *self.context_path.write() = None;
            current.take()
        };
        if let Some(bridge) = previous {
            debug!(session_id = %bridge.session_id(), "Run detached");
        }
    }

    /// Attaches a run until the returned guard is dropped.
    #[must_use = "the run is detached when the guard is dropped"]
    pub fn attach_scoped(self: &Arc<Self>, bridge: Arc<dyn HostBridge>) -> RunGuard {
        self.attach_run(bridge);
        RunGuard {
            state: Arc::clone(self),
        }
    }

    /// Captures a serializable view of the state.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        let bridge = self.bridge();
        ContextSnapshot {
            working_dir: self.working_dir(),
            context_path: self.context_path(),
            session_id: bridge.as_ref().map(|b| b.session_id()),
            executor_id: bridge.as_ref().map(|b| b.executor_id()),
            platform_id: self.platform().map(|p| p.id.clone()),
        }
    }
}

impl std::fmt::Debug for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextState")
            .field("attached", &self.is_attached())
            .field("working_dir", &self.working_dir())
            .field("context_path", &self.context_path())
            .field("platform", &self.platform().map(|p| p.id.clone()))
            .finish()
    }
}

/// Detaches the run when dropped.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<ContextState>,
}

impl RunGuard {
    /// Returns the state the run is attached to.
    #[must_use]
    pub fn state(&self) -> &Arc<ContextState> {
        &self.state
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.detach_run();
    }
}

/// Serializable view of a [`ContextState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Context path of the attached run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_path: Option<String>,
    /// Session id of the attached run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Executor id of the attached run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<String>,
    /// Platform id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
}
