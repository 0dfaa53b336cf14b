// src/watch/watcher.rs

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::Result;
use crate::types::WatcherKind;
use crate::watch::queue::WatchQueue;

/// Contract shared by every file-change detection strategy.
///
/// A watcher owns at most one background thread. Between [`run`] and
/// [`stop`] that thread pushes the paths of modified watched files into the
/// queue returned by [`modified_files_queue`]; nothing else crosses the
/// thread boundary.
///
/// [`run`]: FileWatcher::run
/// [`stop`]: FileWatcher::stop
/// [`modified_files_queue`]: FileWatcher::modified_files_queue
pub trait FileWatcher: Send + Debug {
    fn kind(&self) -> WatcherKind;

    /// Register paths for watching.
    ///
    /// Idempotent. Paths that do not exist are skipped, not an error.
    fn add_watch(&mut self, paths: &[PathBuf]) -> Result<()>;

    /// Unregister paths. Idempotent; unknown paths are ignored.
    fn remove_watch(&mut self, paths: &[PathBuf]) -> Result<()>;

    /// Start the detection loop on a background thread.
    ///
    /// Fails with `WatcherAlreadyRunning` if the loop is already active.
    fn run(&mut self) -> Result<()>;

    /// Unregister every watched path and join the background thread.
    ///
    /// Once this returns no further queue writes happen. Fails with
    /// `WatcherNotRunning` if the loop is not active.
    fn stop(&mut self) -> Result<()>;

    fn is_watching(&self) -> bool;

    /// Canonical paths currently registered, sorted.
    fn watched_files(&self) -> Vec<PathBuf>;

    fn modified_files_queue(&self) -> Arc<WatchQueue>;
}
