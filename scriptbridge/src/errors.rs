//! Error types for the scriptbridge loader and call convention.
//!
//! Loader failures are classified so that hosts can tell configuration
//! problems, missing files and broken modules apart. Errors raised by a
//! module's entry point are carried as [`ScriptbridgeError::Callee`] and are
//! never downgraded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = ScriptbridgeError> = std::result::Result<T, E>;

/// The main error type for scriptbridge operations.
#[derive(Debug, Error)]
pub enum ScriptbridgeError {
    /// The host has not configured something the operation requires.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resolved module path does not reference an existing regular file.
    #[error("Module not found: {}", path.display())]
    NotFound {
        /// The resolved path that was searched.
        path: PathBuf,
    },

    /// The resolved module path lies outside every permitted root.
    #[error("Module path outside permitted roots: {}", path.display())]
    ScopeViolation {
        /// The canonical resolved path.
        path: PathBuf,
    },

    /// The unit could not be bound to an executable form.
    #[error("Cannot load module '{name}' ({}): {message}", path.display())]
    Load {
        /// The assigned module name.
        name: String,
        /// The resolved path (or a pseudo path for in-memory sources).
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An error raised from inside a module's entry point.
    #[error("Module '{module}' failed: {message}")]
    Callee {
        /// The module name.
        module: String,
        /// The error message raised by the callee.
        message: String,
    },

    /// A structured record was accessed with a name it does not declare.
    #[error("{0}")]
    UndeclaredField(#[from] UndeclaredFieldError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`ScriptbridgeError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ScriptbridgeError::Configuration`].
    Configuration,
    /// See [`ScriptbridgeError::NotFound`].
    NotFound,
    /// See [`ScriptbridgeError::ScopeViolation`].
    ScopeViolation,
    /// See [`ScriptbridgeError::Load`].
    Load,
    /// See [`ScriptbridgeError::Callee`].
    Callee,
    /// See [`ScriptbridgeError::UndeclaredField`].
    UndeclaredField,
    /// Serialization, IO and internal failures.
    Other,
}

impl ErrorKind {
    /// Returns whether retrying the same request can succeed without the
    /// host changing anything.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Other)
    }
}

impl ScriptbridgeError {
    /// Creates the "working directory not set" configuration error.
    #[must_use]
    pub fn working_dir_not_set() -> Self {
        Self::Configuration("working directory not set".to_string())
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a load error with module context.
    #[must_use]
    pub fn load(name: impl Into<String>, path: &Path, message: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a callee error with module context.
    #[must_use]
    pub fn callee(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Callee {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ScopeViolation { .. } => ErrorKind::ScopeViolation,
            Self::Load { .. } => ErrorKind::Load,
            Self::Callee { .. } => ErrorKind::Callee,
            Self::UndeclaredField(_) => ErrorKind::UndeclaredField,
            Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => ErrorKind::Other,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        match self {
            Self::NotFound { path } | Self::ScopeViolation { path } => {
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            Self::Load { name, path, .. } => {
                map.insert("module".to_string(), serde_json::json!(name));
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            Self::Callee { module, .. } => {
                map.insert("module".to_string(), serde_json::json!(module));
            }
            Self::UndeclaredField(err) => {
                map.insert("record".to_string(), serde_json::json!(err.record));
                map.insert("field".to_string(), serde_json::json!(err.field));
            }
            _ => {}
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

impl From<serde_json::Error> for ScriptbridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a structured record is used with an undeclared name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Undeclared field: {record} has no field '{field}'")]
pub struct UndeclaredFieldError {
    /// The record kind ("params", "inputs" or "outputs").
    pub record: String,
    /// The offending field name.
    pub field: String,
}

impl UndeclaredFieldError {
    /// Creates a new undeclared field error.
    #[must_use]
    pub fn new(record: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            field: field.into(),
        }
    }
}
