// src/watch/path_utils.rs

//! Utility functions for path handling in the watchers.

use std::path::{Path, PathBuf};

/// Canonical form of a path used as the watch/queue key.
///
/// Canonicalizing makes paths reported by the OS (which are absolute and
/// symlink-resolved, e.g. `/private/var/...` on macOS) compare equal to the
/// paths the registry loaded. Returns `None` if the path does not exist.
pub fn watch_key(path: &Path) -> Option<PathBuf> {
    path.canonicalize().ok()
}

/// Parent directory to register with an event backend for `file`.
///
/// Files are watched through their parent directory so that editors which
/// save by replacing the file (write to temp, rename over) are still seen.
pub fn watch_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
