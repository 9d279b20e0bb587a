//! Path and filesystem helpers shared by fridge, kitchen and oven.
//!
//! Thin wrappers around `std::fs`/`std::os::unix::fs` that convert IO
//! failures into `ChefError::Io` carrying the failing path, the way the
//! rest of this crate surfaces errors.

use crate::error::{ChefError, Result};
use std::path::{Path, PathBuf};

/// Current working directory, guaranteed to have no trailing separator.
pub fn cwd(component: &'static str) -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| ChefError::io(component, ".", e))
}

/// `mkdir -p`: create a directory and all missing parents. Succeeds if the
/// directory already exists.
pub fn mkdir_p(component: &'static str, path: &Path) -> Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(ChefError::io(component, path, e)),
    }
}

/// Create a symlink `link -> target`, replacing any existing symlink at
/// `link` (but refusing to clobber a real file or directory).
pub fn symlink(component: &'static str, link: &Path, target: &Path) -> Result<()> {
    if let Ok(meta) = std::fs::symlink_metadata(link) {
        if meta.file_type().is_symlink() {
            std::fs::remove_file(link).map_err(|e| ChefError::io(component, link, e))?;
        } else {
            return Err(ChefError::validation(
                component,
                format!("refusing to replace non-symlink at {}", link.display()),
            ));
        }
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).map_err(|e| ChefError::io(component, link, e))
    }
    #[cfg(not(unix))]
    {
        let _ = target;
        Err(ChefError::validation(component, "symlinks require a unix host"))
    }
}

/// Copy a single file, creating the destination's parent directory first.
pub fn copy_file(component: &'static str, from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        mkdir_p(component, parent)?;
    }
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| ChefError::io(component, from, e))
}

/// Recursively remove a directory tree. Succeeds (no-op) if it is already
/// absent.
pub fn rmdir_recursive(component: &'static str, path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ChefError::io(component, path, e)),
    }
}

/// Join two path components, the way `strpathcombine` does in the original
/// toolchain: purely lexical, no filesystem access.
pub fn path_combine(base: &Path, rest: &str) -> PathBuf {
    base.join(rest)
}

/// Glob-style predicate used for install-copy filtering: `true` if `path`
/// (a `/`-separated relative path string) matches `pattern`.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}
