// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, ReloadSettings};
use crate::errors::{Result, SequencerError};
use crate::registry::ParamValue;
use crate::types::WatcherKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SequencerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_paths(&raw)?;
        let settings = validate_reload_settings(&raw)?;
        let context = validate_context(&raw)?;
        let paths = raw.sequences.paths.iter().map(PathBuf::from).collect();
        Ok(ConfigFile::new_unchecked(settings, paths, context))
    }
}

fn ensure_has_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.sequences.paths.is_empty() {
        return Err(SequencerError::ConfigError(
            "[sequences].paths must list at least one file or directory".to_string(),
        ));
    }
    if let Some(blank) = cfg.sequences.paths.iter().find(|p| p.trim().is_empty()) {
        return Err(SequencerError::ConfigError(format!(
            "[sequences].paths contains an empty entry ({blank:?})"
        )));
    }
    Ok(())
}

fn validate_reload_settings(cfg: &RawConfigFile) -> Result<ReloadSettings> {
    if cfg.config.poll_interval_ms == 0 {
        return Err(SequencerError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    let watcher = cfg
        .config
        .watcher
        .as_deref()
        .map(|name| {
            name.parse::<WatcherKind>()
                .map_err(|e| SequencerError::ConfigError(format!("[config].watcher: {e}")))
        })
        .transpose()?;

    Ok(ReloadSettings {
        auto_reload: cfg.config.auto_reload,
        watcher,
        poll_interval: Duration::from_millis(cfg.config.poll_interval_ms),
    })
}

fn validate_context(cfg: &RawConfigFile) -> Result<BTreeMap<String, ParamValue>> {
    let mut context = BTreeMap::new();
    for (name, value) in &cfg.context {
        let parsed: ParamValue = value.clone().try_into().map_err(|_| {
            SequencerError::ConfigError(format!(
                "[context].{name} must be an int, float, bool, string or a list of one of those"
            ))
        })?;
        context.insert(name.clone(), parsed);
    }
    Ok(context)
}
