// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sequencer`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sequencer",
    version,
    about = "Load sequence scripts, resolve their dependencies and run sequences.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sequencer.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Sequencer.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SEQUENCER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print loaded modules, their sequences and parameters, then exit.
    #[arg(long)]
    pub list: bool,

    /// Load and resolve every module, report the result, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running: re-run SEQUENCE whenever a loaded file changes.
    #[arg(long)]
    pub watch: bool,

    /// Sequence to execute.
    #[arg(value_name = "SEQUENCE")]
    pub sequence: Option<String>,

    /// Parameter value for SEQUENCE, converted to the parameter's type.
    /// Lists are comma separated. May be repeated.
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
