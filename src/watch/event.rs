// src/watch/event.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::errors::{Result, SequencerError};
use crate::types::WatcherKind;
use crate::watch::path_utils::{watch_dir, watch_key};
use crate::watch::queue::WatchQueue;
use crate::watch::watcher::FileWatcher;

type WatchedSet = Arc<RwLock<HashSet<PathBuf>>>;

struct Worker {
    backend: RecommendedWatcher,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Watcher driven by OS change notifications (`notify`'s recommended
/// backend, inotify on Linux).
///
/// Each watched file is observed through its parent directory. Directory
/// registrations are reference counted so that two files in one directory
/// share a single OS watch.
pub struct EventWatcher {
    watched: WatchedSet,
    dirs: HashMap<PathBuf, usize>,
    queue: Arc<WatchQueue>,
    worker: Option<Worker>,
}

impl fmt::Debug for EventWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWatcher")
            .field("watched", &self.watched.read().len())
            .field("dirs", &self.dirs.len())
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl EventWatcher {
    pub fn new() -> Self {
        Self {
            watched: Arc::new(RwLock::new(HashSet::new())),
            dirs: HashMap::new(),
            queue: Arc::new(WatchQueue::new()),
            worker: None,
        }
    }

    fn backend_watch(&mut self, dir: &Path) -> Result<()> {
        if let Some(worker) = self.worker.as_mut() {
            worker.backend.watch(dir, RecursiveMode::NonRecursive)?;
            debug!(dir = %dir.display(), "event watch registered");
        }
        Ok(())
    }

    fn backend_unwatch(&mut self, dir: &Path) {
        if let Some(worker) = self.worker.as_mut() {
            if let Err(err) = worker.backend.unwatch(dir) {
                debug!(dir = %dir.display(), "failed to unwatch directory: {err}");
            }
        }
    }
}

impl Default for EventWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher for EventWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Event
    }

    fn add_watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            let Some(key) = watch_key(path) else {
                debug!(path = %path.display(), "skipping watch of missing path");
                continue;
            };
            if !self.watched.write().insert(key.clone()) {
                continue;
            }

            let dir = watch_dir(&key);
            let count = self.dirs.entry(dir.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                if let Err(err) = self.backend_watch(&dir) {
                    self.watched.write().remove(&key);
                    self.dirs.remove(&dir);
                    return Err(err);
                }
            }
            debug!(path = %key.display(), "event watch added");
        }
        Ok(())
    }

    fn remove_watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            let key = watch_key(path).unwrap_or_else(|| path.clone());
            if !self.watched.write().remove(&key) {
                continue;
            }

            let dir = watch_dir(&key);
            let remaining = match self.dirs.get_mut(&dir) {
                Some(count) => {
                    *count = count.saturating_sub(1);
                    *count
                }
                None => continue,
            };
            if remaining == 0 {
                self.dirs.remove(&dir);
                self.backend_unwatch(&dir);
            }
            debug!(path = %key.display(), "event watch removed");
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(SequencerError::WatcherAlreadyRunning);
        }

        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let mut backend = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only after stop(), when events no longer matter.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;
        for dir in self.dirs.keys() {
            backend.watch(dir, RecursiveMode::NonRecursive)?;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let watched = Arc::clone(&self.watched);
        let queue = Arc::clone(&self.queue);

        let handle = thread::Builder::new()
            .name("sequencer-event-watcher".to_string())
            .spawn(move || event_loop(event_rx, stop_rx, watched, queue))?;

        info!(dirs = self.dirs.len(), "event file watcher started");
        self.worker = Some(Worker {
            backend,
            stop_tx,
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(mut worker) = self.worker.take() else {
            return Err(SequencerError::WatcherNotRunning);
        };

        for dir in self.dirs.keys() {
            if let Err(err) = worker.backend.unwatch(dir) {
                debug!(dir = %dir.display(), "failed to unwatch directory: {err}");
            }
        }
        self.dirs.clear();
        self.watched.write().clear();

        let _ = worker.stop_tx.try_send(());
        // Dropping the backend closes the event channel from the sender side.
        drop(worker.backend);
        worker
            .handle
            .join()
            .map_err(|_| anyhow!("event watcher thread panicked"))?;

        info!("event file watcher stopped");
        Ok(())
    }

    fn is_watching(&self) -> bool {
        self.worker.is_some()
    }

    fn watched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.watched.read().iter().cloned().collect();
        files.sort();
        files
    }

    fn modified_files_queue(&self) -> Arc<WatchQueue> {
        Arc::clone(&self.queue)
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.stop() {
                warn!("failed to stop event watcher on drop: {err}");
            }
        }
    }
}

fn event_loop(
    event_rx: Receiver<notify::Result<Event>>,
    stop_rx: Receiver<()>,
    watched: WatchedSet,
    queue: Arc<WatchQueue>,
) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(event_rx) -> msg => match msg {
                Ok(Ok(event)) => handle_event(event, &watched, &queue),
                Ok(Err(err)) => warn!("file watch error: {err}"),
                Err(_) => break,
            },
        }
    }
    debug!("event watcher loop finished");
}

fn handle_event(event: Event, watched: &WatchedSet, queue: &WatchQueue) {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return;
    }

    let watched = watched.read();
    for path in event.paths {
        if watched.contains(&path) {
            queue.push(path);
        } else if let Some(key) = watch_key(&path).filter(|k| watched.contains(k)) {
            queue.push(key);
        }
    }
}
