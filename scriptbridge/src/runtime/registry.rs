//! Per-session lookup of loaded modules.

use crate::errors::Result;
use crate::loader::LoadedModule;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Identifies the module instance serving one executor in one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerKey {
    /// Host session id.
    pub session_id: String,
    /// Executor id.
    pub executor_id: String,
}

impl WorkerKey {
    /// Creates a key.
    #[must_use]
    pub fn new(session_id: impl Into<String>, executor_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            executor_id: executor_id.into(),
        }
    }
}

impl std::fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.session_id, self.executor_id)
    }
}

/// Loaded modules keyed by session and executor.
///
/// Modules are only added and removed explicitly; nothing is reloaded
/// behind the host's back.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: DashMap<WorkerKey, Arc<LoadedModule>>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a module, returning the one it replaces.
    pub fn register(&self, key: WorkerKey, module: Arc<LoadedModule>) -> Option<Arc<LoadedModule>> {
        debug!(worker = %key, module = %module.name(), "Module registered");
        self.modules.insert(key, module)
    }

    /// Looks a module up.
    #[must_use]
    pub fn get(&self, key: &WorkerKey) -> Option<Arc<LoadedModule>> {
        self.modules.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the registered module or stores the one `load` produces.
    ///
    /// `load` runs without holding any registry lock. If another caller
    /// registers the key meanwhile, its module wins.
    ///
    /// # Errors
    ///
    /// Whatever `load` returns.
    pub fn get_or_load<F>(&self, key: &WorkerKey, load: F) -> Result<Arc<LoadedModule>>
    where
        F: FnOnce() -> Result<LoadedModule>,
    {
        if let Some(module) = self.get(key) {
            return Ok(module);
        }
        let module = Arc::new(load()?);
        let entry = self.modules.entry(key.clone()).or_insert_with(|| {
            debug!(worker = %key, module = %module.name(), "Module registered");
            Arc::clone(&module)
        });
        Ok(Arc::clone(entry.value()))
    }

    /// Removes a module.
    pub fn remove(&self, key: &WorkerKey) -> Option<Arc<LoadedModule>> {
        self.modules.remove(key).map(|(_, module)| module)
    }

    /// Removes every module of a session, returning how many were removed.
    pub fn clear_session(&self, session_id: &str) -> usize {
        let mut removed = 0_usize;
        self.modules.retain(|key, _| {
            let keep = key.session_id != session_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(session_id, removed, "Session modules cleared");
        removed
    }

    /// Returns the number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
