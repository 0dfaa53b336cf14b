// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which file-change detection strategy a watcher uses.
///
/// - `Event`: OS change notifications (inotify, FSEvents, ReadDirectoryChangesW).
/// - `Polling`: periodically re-stat every watched path and compare
///   modification times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherKind {
    Event,
    Polling,
}

impl WatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherKind::Event => "event",
            WatcherKind::Polling => "polling",
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatcherKind {
    type Err = String;

    /// Accepts the historical aliases `inotify` and `standalone` as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" | "inotify" => Ok(WatcherKind::Event),
            "polling" | "standalone" => Ok(WatcherKind::Polling),
            other => Err(format!(
                "invalid watcher: {other} (expected \"event\" or \"polling\")"
            )),
        }
    }
}
