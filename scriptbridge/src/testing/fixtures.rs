//! Test fixtures for module loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::context::ContextState;
use crate::errors::Result;
use crate::loader::ModuleLoader;
use crate::runtime::ModuleRunner;

/// Writes module sources below a root directory.
#[derive(Debug, Clone)]
pub struct ScriptFixture {
    root: PathBuf,
}

impl ScriptFixture {
    /// Creates a fixture rooted at `root` (usually a temporary directory).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `source` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written.
    pub fn write(&self, relative: impl AsRef<Path>, source: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, source)?;
        Ok(path)
    }
}

/// A state, loader and runner wired together the way a host would.
#[derive(Debug, Clone)]
pub struct TestHost {
    /// Shared context state.
    pub state: Arc<ContextState>,
    /// Loader over `state`.
    pub loader: ModuleLoader,
    /// Runner over `state`.
    pub runner: ModuleRunner,
}

impl TestHost {
    /// Creates a host whose working directory is `working_dir`.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(working_dir, LoaderConfig::default())
    }

    /// Creates a host with an explicit loader configuration.
    #[must_use]
    pub fn with_config(working_dir: impl Into<PathBuf>, config: LoaderConfig) -> Self {
        let state = Arc::new(ContextState::new().with_working_dir(working_dir));
        Self {
            loader: ModuleLoader::with_config(Arc::clone(&state), config),
            runner: ModuleRunner::new(Arc::clone(&state)),
            state,
        }
    }
}
