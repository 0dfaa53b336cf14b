// src/watch/polling.rs

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use anyhow::anyhow;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{Result, SequencerError};
use crate::types::WatcherKind;
use crate::watch::path_utils::watch_key;
use crate::watch::queue::WatchQueue;
use crate::watch::watcher::FileWatcher;

/// Default pause between two polling passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Last observed state of a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok()?,
            len: meta.len(),
        })
    }
}

type StampMap = Arc<Mutex<HashMap<PathBuf, FileStamp>>>;

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Watcher that re-stats every watched path on a timer.
///
/// Works everywhere, at the cost of one `stat` per file per pass. A change of
/// modification time (or size) since the previous pass queues the path.
pub struct PollingWatcher {
    watched: StampMap,
    queue: Arc<WatchQueue>,
    interval: Duration,
    worker: Option<Worker>,
}

impl fmt::Debug for PollingWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingWatcher")
            .field("watched", &self.watched.lock().len())
            .field("interval", &self.interval)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl PollingWatcher {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            watched: Arc::new(Mutex::new(HashMap::new())),
            queue: Arc::new(WatchQueue::new()),
            interval,
            worker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher for PollingWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Polling
    }

    fn add_watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut watched = self.watched.lock();
        for path in paths {
            let Some(key) = watch_key(path) else {
                debug!(path = %path.display(), "skipping watch of missing path");
                continue;
            };
            if watched.contains_key(&key) {
                continue;
            }
            match FileStamp::read(&key) {
                Some(stamp) => {
                    debug!(path = %key.display(), "polling watch added");
                    watched.insert(key, stamp);
                }
                None => debug!(path = %key.display(), "skipping watch of unreadable path"),
            }
        }
        Ok(())
    }

    fn remove_watch(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut watched = self.watched.lock();
        for path in paths {
            let key = watch_key(path).unwrap_or_else(|| path.clone());
            if watched.remove(&key).is_some() {
                debug!(path = %key.display(), "polling watch removed");
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(SequencerError::WatcherAlreadyRunning);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let watched = Arc::clone(&self.watched);
        let queue = Arc::clone(&self.queue);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("sequencer-poll-watcher".to_string())
            .spawn(move || {
                loop {
                    poll_once(&watched, &queue);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("polling watcher loop finished");
            })?;

        info!(interval_ms = interval.as_millis() as u64, "polling file watcher started");
        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(SequencerError::WatcherNotRunning)?;

        self.watched.lock().clear();
        // A full channel means a stop is already pending, which is fine.
        let _ = worker.stop_tx.try_send(());
        worker
            .handle
            .join()
            .map_err(|_| anyhow!("polling watcher thread panicked"))?;

        info!("polling file watcher stopped");
        Ok(())
    }

    fn is_watching(&self) -> bool {
        self.worker.is_some()
    }

    fn watched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.watched.lock().keys().cloned().collect();
        files.sort();
        files
    }

    fn modified_files_queue(&self) -> Arc<WatchQueue> {
        Arc::clone(&self.queue)
    }
}

impl Drop for PollingWatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.stop() {
                warn!("failed to stop polling watcher on drop: {err}");
            }
        }
    }
}

/// One pass over every watched path.
fn poll_once(watched: &StampMap, queue: &WatchQueue) {
    let mut watched = watched.lock();
    for (path, last) in watched.iter_mut() {
        // Files that vanish mid-save are picked up again on a later pass.
        let Some(current) = FileStamp::read(path) else {
            continue;
        };
        if current != *last {
            *last = current;
            queue.push(path.clone());
        }
    }
}
