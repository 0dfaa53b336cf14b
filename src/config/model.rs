// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::registry::ParamValue;
use crate::types::WatcherKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// auto_reload = true
/// watcher = "polling"
/// poll_interval_ms = 50
///
/// [sequences]
/// paths = ["sequences", "extra/spi_commands.rhai"]
///
/// [context]
/// device_address = "192.168.0.10"
/// ```
///
/// Every section is optional at parse time; validation requires at least one
/// sequence path.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub sequences: SequencesSection,

    /// Values made available to scripts through `get_context`.
    #[serde(default)]
    pub context: BTreeMap<String, toml::Value>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Enable auto-reload right after loading.
    #[serde(default)]
    pub auto_reload: bool,

    /// `"event"` / `"polling"` (or the aliases `"inotify"` / `"standalone"`).
    /// Probed from the platform when absent.
    #[serde(default)]
    pub watcher: Option<String>,

    /// Pause between two passes of the polling watcher.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            auto_reload: false,
            watcher: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// `[sequences]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SequencesSection {
    /// Files or directories to load, relative to the config file.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Validated `[config]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadSettings {
    pub auto_reload: bool,
    pub watcher: Option<WatcherKind>,
    pub poll_interval: Duration,
}

/// Configuration after validation. Built via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ReloadSettings,
    pub sequence_paths: Vec<PathBuf>,
    pub context: BTreeMap<String, ParamValue>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ReloadSettings,
        sequence_paths: Vec<PathBuf>,
        context: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            config,
            sequence_paths,
            context,
        }
    }

    /// Make relative sequence paths relative to `base` instead of the
    /// working directory.
    pub fn rebase(mut self, base: &Path) -> Self {
        self.sequence_paths = self
            .sequence_paths
            .into_iter()
            .map(|p| if p.is_relative() { base.join(p) } else { p })
            .collect();
        self
    }
}
