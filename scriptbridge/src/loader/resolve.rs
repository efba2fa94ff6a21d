//! Module path resolution and naming.

use crate::errors::{Result, ScriptbridgeError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static MODULE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"));

/// Resolves a module path.
///
/// Absolute paths are returned unchanged and `working_dir` is ignored.
/// Relative paths are joined onto `working_dir`; with no working directory
/// this fails with `Configuration` without touching the filesystem.
pub fn resolve_path(path: &Path, working_dir: Option<&Path>) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let dir = working_dir.ok_or_else(ScriptbridgeError::working_dir_not_set)?;
    Ok(dir.join(path))
}

/// Fails with `NotFound` unless `path` is an existing regular file.
pub fn require_file(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ScriptbridgeError::not_found(path)),
    }
}

/// Fails with `ScopeViolation` unless `path` lies under one of `roots`.
///
/// An empty root list permits everything. Both sides are canonicalized so
/// `..` segments and symlinks cannot escape a root.
pub fn check_scope(path: &Path, roots: &[PathBuf]) -> Result<()> {
    if roots.is_empty() {
        return Ok(());
    }
    let canonical = path.canonicalize()?;
    let inside = roots
        .iter()
        .filter_map(|root| root.canonicalize().ok())
        .any(|root| canonical.starts_with(root));
    if inside {
        Ok(())
    } else {
        Err(ScriptbridgeError::ScopeViolation { path: canonical })
    }
}

/// Derives a module name from the file's base name without extension.
///
/// Any non-empty UTF-8 stem is used unchanged.
#[must_use]
pub fn derive_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Returns whether `name` is usable as a caller-supplied module name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    MODULE_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_path_joins_working_dir() {
        let resolved = resolve_path(Path::new("mods/a.lua"), Some(Path::new("/work"))).unwrap();
        assert_eq!(resolved, PathBuf::from("/work/mods/a.lua"));
    }

    #[test]
    fn test_absolute_path_ignores_working_dir() {
        let resolved = resolve_path(Path::new("/opt/m.lua"), Some(Path::new("/work"))).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/m.lua"));

        let resolved = resolve_path(Path::new("/opt/m.lua"), None).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/m.lua"));
    }

    #[test]
    fn test_relative_path_without_working_dir() {
        let err = resolve_path(Path::new("a.lua"), None).unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Configuration(_)));
    }

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.lua");
        std::fs::write(&file, "return 1").unwrap();

        assert!(require_file(&file).is_ok());
        assert!(matches!(
            require_file(&dir.path().join("missing.lua")),
            Err(ScriptbridgeError::NotFound { .. })
        ));
        // A directory is not a module file.
        assert!(matches!(
            require_file(dir.path()),
            Err(ScriptbridgeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_scope() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let inside = root.path().join("m.lua");
        let outside = other.path().join("m.lua");
        std::fs::write(&inside, "").unwrap();
        std::fs::write(&outside, "").unwrap();

        let roots = vec![root.path().to_path_buf()];
        assert!(check_scope(&inside, &roots).is_ok());
        assert!(matches!(
            check_scope(&outside, &roots),
            Err(ScriptbridgeError::ScopeViolation { .. })
        ));
        assert!(check_scope(&outside, &[]).is_ok());
    }

    #[test]
    fn test_names() {
        assert_eq!(derive_name(Path::new("/work/mods/contrast.lua")), Some("contrast".to_string()));
        assert_eq!(derive_name(Path::new("plain")), Some("plain".to_string()));
        assert_eq!(derive_name(Path::new("mods/01-contrast.lua")), Some("01-contrast".to_string()));
        assert_eq!(derive_name(Path::new("/")), None);
        assert!(is_valid_name("contrast_v2.fast"));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(""));
    }
}
