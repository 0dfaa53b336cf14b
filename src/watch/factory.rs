// src/watch/factory.rs

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::errors::{Result, SequencerError};
use crate::types::WatcherKind;
use crate::watch::event::EventWatcher;
use crate::watch::polling::{PollingWatcher, DEFAULT_POLL_INTERVAL};
use crate::watch::watcher::FileWatcher;

/// Whether this build target has a native change-notification backend.
pub fn event_support_available() -> bool {
    cfg!(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))
}

/// Builds [`FileWatcher`]s by name or by platform capability.
#[derive(Debug, Clone)]
pub struct WatcherFactory {
    event_available: bool,
    poll_interval: Duration,
}

impl Default for WatcherFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherFactory {
    /// Factory whose event support follows the build target.
    pub fn new() -> Self {
        Self {
            event_available: event_support_available(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Factory that behaves as if the event backend were missing.
    pub fn without_event_support() -> Self {
        Self {
            event_available: false,
            ..Self::new()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn event_available(&self) -> bool {
        self.event_available
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The strategy `create(None, ..)` would pick.
    pub fn preferred_kind(&self) -> WatcherKind {
        if self.event_available {
            WatcherKind::Event
        } else {
            WatcherKind::Polling
        }
    }

    /// Create a watcher.
    ///
    /// `name` selects a strategy (`event`/`inotify` or `polling`/`standalone`);
    /// `None` prefers events when available. When `paths` is given the watcher
    /// is seeded with them and started before being returned.
    pub fn create(
        &self,
        name: Option<&str>,
        paths: Option<&[PathBuf]>,
    ) -> Result<Box<dyn FileWatcher>> {
        let kind = match name {
            Some(name) => name
                .parse::<WatcherKind>()
                .map_err(|_| SequencerError::UnknownWatcher(name.to_string()))?,
            None => self.preferred_kind(),
        };
        self.create_kind(kind, paths)
    }

    /// Like [`create`](Self::create) with an already-parsed kind.
    pub fn create_kind(
        &self,
        kind: WatcherKind,
        paths: Option<&[PathBuf]>,
    ) -> Result<Box<dyn FileWatcher>> {
        let mut watcher: Box<dyn FileWatcher> = match kind {
            WatcherKind::Event => {
                if !self.event_available {
                    return Err(SequencerError::EventWatcherUnavailable);
                }
                Box::new(EventWatcher::new())
            }
            WatcherKind::Polling => Box::new(PollingWatcher::with_interval(self.poll_interval)),
        };
        debug!(kind = %kind, "created file watcher");

        if let Some(paths) = paths {
            watcher.add_watch(paths)?;
            watcher.run()?;
        }
        Ok(watcher)
    }
}
