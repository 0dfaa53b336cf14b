// src/logging.rs

//! `tracing` subscriber setup for the `sequencer` binary.
//!
//! The filter comes from the first of:
//! 1. `--log-level`, applied to every target;
//! 2. `SEQUENCER_LOG`, any `EnvFilter` directive string
//!    (e.g. `info,sequencer::watch=debug,sequence=warn`);
//! 3. `info`.
//!
//! Script `print` output is logged under the `sequence` target, so it can be
//! silenced or raised independently of the registry's own logs. Everything
//! goes to STDERR; STDOUT carries sequence results and listings.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable holding `EnvFilter` directives.
pub const LOG_ENV: &str = "SEQUENCER_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(filter(cli_level)?)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))
}

fn filter(cli_level: Option<LogLevel>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| anyhow!("invalid {LOG_ENV} value {directives:?}: {e}")),
        _ => Ok(EnvFilter::new("info")),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
