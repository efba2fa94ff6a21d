//! Module loading.
//!
//! [`ModuleLoader`] turns a file reference into a [`LoadedModule`]:
//!
//! 1. resolve the path against the working directory of the [`ContextState`]
//! 2. require an existing regular file
//! 3. enforce the configured roots, if any
//! 4. assign a name
//! 5. run the top-level code once in a fresh VM and locate the entry point
//!
//! Loading never retries and never reloads implicitly.

mod lua_env;
mod module;
mod resolve;

pub use module::{EntryPoint, LoadedModule, ModuleOrigin};
pub use resolve::{check_scope, derive_name, is_valid_name, require_file, resolve_path};

use crate::config::LoaderConfig;
use crate::context::ContextState;
use crate::errors::{Result, ScriptbridgeError};
use crate::specification::ScriptSpecification;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Loads modules in the environment described by a [`ContextState`].
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    state: Arc<ContextState>,
    config: LoaderConfig,
}

impl ModuleLoader {
    /// Creates a loader with the default configuration.
    #[must_use]
    pub fn new(state: Arc<ContextState>) -> Self {
        Self::with_config(state, LoaderConfig::default())
    }

    /// Creates a loader with an explicit configuration.
    #[must_use]
    pub fn with_config(state: Arc<ContextState>, config: LoaderConfig) -> Self {
        Self { state, config }
    }

    /// Returns the shared context state.
    #[must_use]
    pub fn state(&self) -> &Arc<ContextState> {
        &self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Resolves `path` the way a load would, without touching the
    /// filesystem.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for a relative path with no working
    /// directory set.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        resolve_path(path.as_ref(), self.state.working_dir().as_deref())
    }

    /// Loads a module file using the configured default entry function.
    ///
    /// `name` defaults to the file's base name without extension.
    ///
    /// # Errors
    ///
    /// - `Configuration` for a relative path with no working directory set
    /// - `NotFound` if the resolved path is not an existing regular file
    /// - `ScopeViolation` if the path lies outside the configured roots
    /// - `Load` if the module cannot be read, parsed, initialized, or has
    ///   no entry point
    pub fn load_from_file(&self, path: impl AsRef<Path>, name: Option<&str>) -> Result<LoadedModule> {
        let entry = EntryPoint::function(&self.config.entry_function);
        self.load_with_entry(path, name, entry)
    }

    /// Loads a module file with an explicit entry point.
    ///
    /// A caller-supplied `name` must match the module name pattern; a name
    /// derived from the file is accepted as is.
    ///
    /// # Errors
    ///
    /// As [`ModuleLoader::load_from_file`].
    pub fn load_with_entry(
        &self,
        path: impl AsRef<Path>,
        name: Option<&str>,
        entry: EntryPoint,
    ) -> Result<LoadedModule> {
        let resolved = self.locate(path)?;
        let name = match name {
            Some(name) if !is_valid_name(name) => {
                return Err(ScriptbridgeError::load(name, &resolved, "invalid module name"));
            }
            Some(name) => name.to_string(),
            None => derive_name(&resolved).ok_or_else(|| {
                ScriptbridgeError::load("", &resolved, "cannot derive a module name from the path")
            })?,
        };
        self.bind_file(resolved, name, entry)
    }

    /// Loads the module an executor specification describes.
    ///
    /// The `script.module` path is resolved like any other load; the entry
    /// point comes from `script.function` and `script.class`. The module is
    /// named after the file, or after the specification id when the path
    /// has no base name.
    ///
    /// # Errors
    ///
    /// As [`ModuleLoader::load_from_file`].
    pub fn load_specification(&self, spec: &ScriptSpecification) -> Result<LoadedModule> {
        let resolved = self.locate(&spec.script.module)?;
        let name = derive_name(&resolved).unwrap_or_else(|| spec.id.clone());
        self.bind_file(resolved, name, EntryPoint::from_script_conf(&spec.script))
    }

    fn locate(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let resolved = self.resolve(path)?;
        require_file(&resolved)?;
        check_scope(&resolved, &self.config.allowed_roots)?;
        Ok(resolved)
    }

    fn bind_file(&self, resolved: PathBuf, name: String, entry: EntryPoint) -> Result<LoadedModule> {
        let start = Instant::now();
        let source = std::fs::read_to_string(&resolved)
            .map_err(|e| ScriptbridgeError::load(&name, &resolved, e.to_string()))?;
        debug!(module = %name, path = %resolved.display(), bytes = source.len(), "Module source read");

        let module = LoadedModule::bind(
            name,
            ModuleOrigin::File(resolved),
            &source,
            entry,
            Arc::clone(&self.state),
            self.config.stdlib,
        )?;

        info!(
            module = %module.name(),
            path = ?module.path(),
            entry = %module.entry(),
            digest = %module.digest(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Module loaded"
        );
        Ok(module)
    }

    /// Loads a module from source text.
    ///
    /// # Errors
    ///
    /// Returns `Load` for an invalid name, a broken module or a missing
    /// entry point.
    pub fn load_source(&self, name: &str, source: &str) -> Result<LoadedModule> {
        let entry = EntryPoint::function(&self.config.entry_function);
        self.load_source_with_entry(name, source, entry)
    }

    /// Loads a module from source text with an explicit entry point.
    ///
    /// # Errors
    ///
    /// As [`ModuleLoader::load_source`].
    pub fn load_source_with_entry(
        &self,
        name: &str,
        source: &str,
        entry: EntryPoint,
    ) -> Result<LoadedModule> {
        if !is_valid_name(name) {
            return Err(ScriptbridgeError::load(name, Path::new("<inline>"), "invalid module name"));
        }
        let module = LoadedModule::bind(
            name.to_string(),
            ModuleOrigin::Inline(Arc::from(source)),
            source,
            entry,
            Arc::clone(&self.state),
            self.config.stdlib,
        )?;
        info!(module = %name, entry = %module.entry(), "Module loaded from source");
        Ok(module)
    }

    /// Loads a fresh, independent instance of `module` from its origin.
    ///
    /// # Errors
    ///
    /// As [`ModuleLoader::load_from_file`] for file modules.
    pub fn reload(&self, module: &LoadedModule) -> Result<LoadedModule> {
        debug!(module = %module.name(), "Reloading module");
        match module.origin() {
            ModuleOrigin::File(path) => {
                let resolved = self.locate(path)?;
                self.bind_file(resolved, module.name().to_string(), module.entry().clone())
            }
            ModuleOrigin::Inline(source) => {
                self.load_source_with_entry(module.name(), source, module.entry().clone())
            }
        }
    }
}
