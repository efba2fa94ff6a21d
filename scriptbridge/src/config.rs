//! Loader configuration.

use crate::errors::{Result, ScriptbridgeError};
use crate::specification::DEFAULT_FUNCTION;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable listing permitted module roots (path-list syntax).
pub const ENV_ALLOWED_ROOTS: &str = "SCRIPTBRIDGE_ALLOWED_ROOTS";
/// Environment variable overriding the default entry-point function.
pub const ENV_ENTRY_FUNCTION: &str = "SCRIPTBRIDGE_ENTRY_FUNCTION";
/// Environment variable selecting the stdlib profile.
pub const ENV_STDLIB: &str = "SCRIPTBRIDGE_STDLIB";

/// Which Lua standard libraries a loaded module can use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdlibProfile {
    /// `table`, `string`, `math`, `utf8` and `coroutine` only. No file,
    /// process, module-loading or debug access.
    #[default]
    Sandboxed,
    /// Every library `mlua` considers safe, including `io` and `os`.
    Full,
}

impl std::str::FromStr for StdlibProfile {
    type Err = ScriptbridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandboxed" => Ok(Self::Sandboxed),
            "full" => Ok(Self::Full),
            other => Err(ScriptbridgeError::Configuration(format!(
                "unknown stdlib profile \"{other}\" (expected \"sandboxed\" or \"full\")"
            ))),
        }
    }
}

/// Configuration for [`crate::loader::ModuleLoader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// If non-empty, modules must resolve to a path under one of these roots.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,
    /// Entry-point function used when a load does not name one.
    #[serde(default = "default_entry_function")]
    pub entry_function: String,
    /// Standard libraries opened in each module VM.
    #[serde(default)]
    pub stdlib: StdlibProfile,
}

fn default_entry_function() -> String {
    DEFAULT_FUNCTION.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            entry_function: default_entry_function(),
            stdlib: StdlibProfile::default(),
        }
    }
}

impl LoaderConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown stdlib profile.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Reads overrides through `lookup` on top of the defaults.
    ///
    /// `lookup` is called with each of the `ENV_*` keys. Empty root entries
    /// and a blank entry function are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown stdlib profile.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Self::default();
        if let Some(roots) = lookup(ENV_ALLOWED_ROOTS) {
            config.allowed_roots = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(function) = lookup(ENV_ENTRY_FUNCTION).and_then(|f| f.into_string().ok()) {
            if !function.trim().is_empty() {
                config.entry_function = function;
            }
        }
        if let Some(profile) = lookup(ENV_STDLIB) {
            config.stdlib = profile.to_string_lossy().parse()?;
        }
        Ok(config)
    }

    /// Adds a permitted root.
    #[must_use]
    pub fn with_allowed_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.allowed_roots.push(root.into());
        self
    }

    /// Sets the default entry-point function.
    #[must_use]
    pub fn with_entry_function(mut self, function: impl Into<String>) -> Self {
        self.entry_function = function.into();
        self
    }

    /// Sets the stdlib profile.
    #[must_use]
    pub fn with_stdlib(mut self, stdlib: StdlibProfile) -> Self {
        self.stdlib = stdlib;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::new();
        assert!(config.allowed_roots.is_empty());
        assert_eq!(config.entry_function, "execute");
        assert_eq!(config.stdlib, StdlibProfile::Sandboxed);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"allowed_roots": ["/opt/modules"], "stdlib": "full"}"#).unwrap();

        assert_eq!(config.allowed_roots, vec![PathBuf::from("/opt/modules")]);
        assert_eq!(config.entry_function, "execute");
        assert_eq!(config.stdlib, StdlibProfile::Full);
    }

    #[test]
    fn test_stdlib_profile_parse() {
        assert_eq!("Sandboxed".parse::<StdlibProfile>().unwrap(), StdlibProfile::Sandboxed);
        assert_eq!(" full ".parse::<StdlibProfile>().unwrap(), StdlibProfile::Full);
        assert!("unsafe".parse::<StdlibProfile>().is_err());
    }

    #[test]
    fn test_builder() {
        let config = LoaderConfig::new()
            .with_allowed_root("/a")
            .with_allowed_root("/b")
            .with_entry_function("process")
            .with_stdlib(StdlibProfile::Full);

        assert_eq!(config.allowed_roots.len(), 2);
        assert_eq!(config.entry_function, "process");
    }

    #[test]
    fn test_overrides_absent() {
        let config = LoaderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn test_overrides_all_keys() {
        let roots = std::env::join_paths(["/opt/modules", "/srv/shared"]).unwrap();
        let config = LoaderConfig::from_lookup(lookup(&[
            (ENV_ALLOWED_ROOTS, roots.to_str().unwrap()),
            (ENV_ENTRY_FUNCTION, "process"),
            (ENV_STDLIB, "full"),
        ]))
        .unwrap();

        assert_eq!(
            config.allowed_roots,
            vec![PathBuf::from("/opt/modules"), PathBuf::from("/srv/shared")]
        );
        assert_eq!(config.entry_function, "process");
        assert_eq!(config.stdlib, StdlibProfile::Full);
    }

    #[test]
    fn test_overrides_skip_empty_values() {
        let roots = std::env::join_paths(["", "/opt/modules", ""]).unwrap();
        let config = LoaderConfig::from_lookup(lookup(&[
            (ENV_ALLOWED_ROOTS, roots.to_str().unwrap()),
            (ENV_ENTRY_FUNCTION, "   "),
        ]))
        .unwrap();

        assert_eq!(config.allowed_roots, vec![PathBuf::from("/opt/modules")]);
        assert_eq!(config.entry_function, "execute");
    }

    #[test]
    fn test_override_unknown_stdlib_is_configuration_error() {
        let err = LoaderConfig::from_lookup(lookup(&[(ENV_STDLIB, "unsafe")])).unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Configuration(ref m) if m.contains("unsafe")));
    }
}
