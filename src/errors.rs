// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every failure the registry, the watchers or the config layer can detect is
//! a variant here, so callers can match on the exact condition instead of
//! parsing messages.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequencerError {
    // Load-time.
    #[error("Syntax error loading {}: {message}", .path.display())]
    Syntax { path: PathBuf, message: String },

    #[error("Import error loading {}: {message}", .path.display())]
    Import { path: PathBuf, message: String },

    #[error("Sequence module file {} not found", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Execution error loading {}: {message}", .path.display())]
    ModuleExecution { path: PathBuf, message: String },

    #[error("Sequence directory {} not found", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Module {module} is already loaded from {}", .path.display())]
    DuplicateModule { module: String, path: PathBuf },

    #[error("{module} provides {sequence} which is already provided by {existing}")]
    DuplicateSequence {
        module: String,
        sequence: String,
        existing: String,
    },

    #[error("{module} does not implement {sequence} listed in its provided sequences")]
    MissingImplementation { module: String, sequence: String },

    #[error("{module} defines {sequence} more than once")]
    AmbiguousSequence { module: String, sequence: String },

    #[error("Invalid `{field}` declaration in {module}: {reason}")]
    InvalidDeclaration {
        module: String,
        field: &'static str,
        reason: String,
    },

    #[error("Parameter {param} in sequence {sequence} is missing a default value")]
    MissingDefault { sequence: String, param: String },

    #[error("Parameter {param} in sequence {sequence} has an empty list as its default value")]
    EmptyListDefault { sequence: String, param: String },

    #[error("Parameter {param} in sequence {sequence} has a default list containing a nested list")]
    NestedListDefault { sequence: String, param: String },

    #[error(
        "Parameter {param} in sequence {sequence} has a default list with elements of mixed types"
    )]
    MixedListDefault { sequence: String, param: String },

    #[error(
        "Parameter {param} in sequence {sequence} has a default of unsupported type {type_name}"
    )]
    UnsupportedDefault {
        sequence: String,
        param: String,
        type_name: String,
    },

    // Resolve-time.
    #[error(
        "Failed to resolve required command sequence modules (missing: {})",
        .missing.join(",")
    )]
    UnresolvedModules { missing: Vec<String> },

    // Reload-time.
    #[error("Cannot reload file {} as it is not loaded into the manager", .path.display())]
    FileNotLoaded { path: PathBuf },

    #[error("Cannot reload module {module} as it is not loaded into the manager")]
    ModuleNotLoaded { module: String },

    // Dispatch-time.
    #[error("Missing command sequence: {0}")]
    MissingSequence(String),

    #[error("Invalid arguments for sequence {sequence}: {reason}")]
    InvalidArguments { sequence: String, reason: String },

    #[error("Invalid list: {param} - {reason}")]
    InvalidList { param: String, reason: String },

    #[error("Invalid value for parameter {param} of sequence {sequence}: {reason}")]
    InvalidParamValue {
        sequence: String,
        param: String,
        reason: String,
    },

    #[error("Error executing sequence {sequence}: {message}")]
    Execution { sequence: String, message: String },

    // Context-time.
    #[error("Manager context does not contain {0}")]
    MissingContext(String),

    // Auto-reload lifecycle.
    #[error("Cannot enable auto reload as it is already enabled")]
    AutoReloadAlreadyEnabled,

    #[error("Cannot disable auto reload as it is not enabled")]
    AutoReloadNotEnabled,

    // Watcher lifecycle.
    #[error("File watcher has already been started")]
    WatcherAlreadyRunning,

    #[error("Cannot stop file watcher as it has not been started")]
    WatcherNotRunning,

    #[error("The requested file watcher cannot be created because it has not been implemented: {0}")]
    UnknownWatcher(String),

    #[error(
        "The requested file watcher cannot be created because the event notification module could not be found"
    )]
    EventWatcherUnavailable,

    #[error("Failed to initialise file watcher: {0}")]
    WatcherInit(String),

    // Ambient.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<notify::Error> for SequencerError {
    fn from(e: notify::Error) -> Self {
        SequencerError::WatcherInit(e.to_string())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SequencerError>;
