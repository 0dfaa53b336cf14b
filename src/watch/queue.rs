// src/watch/queue.rs

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

/// Thread-safe, order-preserving queue of distinct pending paths.
///
/// This is the single hand-off point between a watcher's background thread
/// and the registry:
/// - the watcher thread calls [`WatchQueue::push`] for every detected change;
/// - the registry calls [`WatchQueue::drain`] before dispatching a sequence.
///
/// A path that is already queued is not queued again until it has been
/// drained, so however many times a file is written between two drains it is
/// reported exactly once.
#[derive(Debug, Default)]
pub struct WatchQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    order: VecDeque<PathBuf>,
    queued: HashSet<PathBuf>,
}

impl WatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a path unless it is already pending.
    ///
    /// Returns `true` if the path was newly queued.
    pub fn push(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut inner = self.inner.lock();

        if !inner.queued.insert(path.clone()) {
            return false;
        }

        debug!(path = %path.display(), "queued modified file");
        inner.order.push_back(path);
        true
    }

    /// Remove and return every pending path as one batch, in arrival order.
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut inner = self.inner.lock();
        inner.queued.clear();
        inner.order.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().queued.contains(path)
    }
}
