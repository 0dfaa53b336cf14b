// src/script/unit.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rhai::Dynamic;

use crate::errors::{Result, SequencerError};
use crate::script::host::ScriptHost;

/// A parameter as declared by a unit, before validation.
#[derive(Debug, Clone)]
pub struct RawParam {
    pub name: String,
    /// `None` when the unit declares no default for this parameter.
    pub default: Option<Dynamic>,
}

/// One sequence made visible inside a dependent unit by `resolve`.
#[derive(Debug, Clone)]
pub struct Import {
    pub sequence: String,
    pub provider: Arc<dyn ScriptUnit>,
}

/// A loaded script file: its declared metadata and its callables.
///
/// The registry only talks to scripts through this trait, so dependency
/// resolution and watching do not depend on how a unit actually executes.
pub trait ScriptUnit: Send + Sync + Debug {
    /// Module name (the file stem).
    fn name(&self) -> &str;

    /// Canonical source path.
    fn path(&self) -> &Path;

    /// Explicit `provides` list, if the unit declares one.
    fn declared_provides(&self) -> Option<&[String]>;

    /// Explicit `requires` list, empty when undeclared.
    fn declared_requires(&self) -> &[String];

    /// Every public top-level callable, sorted.
    fn callables(&self) -> Vec<String>;

    fn has_callable(&self, name: &str) -> bool {
        self.callables().iter().any(|c| c == name)
    }

    /// Declared parameters of `sequence` in call order.
    fn parameters(&self, sequence: &str) -> Vec<RawParam>;

    /// Invoke `sequence` with a full positional argument list.
    fn invoke(&self, sequence: &str, args: Vec<Dynamic>) -> Result<Dynamic>;

    /// Replace the injected dependency symbols with `imports`.
    ///
    /// Passing an empty slice drops every previously injected symbol.
    fn bind_imports(&self, imports: &[Import]) -> Result<()>;
}

/// Produces [`ScriptUnit`]s from source files.
pub trait ScriptLoader: Send + Sync + Debug {
    /// File extension (without the dot) picked up when a directory is loaded.
    fn extension(&self) -> &str;

    fn load(&self, path: &Path, host: &Arc<ScriptHost>) -> Result<Arc<dyn ScriptUnit>>;
}

/// Module name for a script path.
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expand a list of files and directories into script files.
///
/// Directories expand non-recursively to their `*.<extension>` files in
/// sorted order. Paths with the script extension are passed through unchanged
/// so the loader can report a missing file itself; any other missing path is
/// reported as a missing directory (`seqs`, `seqs.d`, `seqs/`).
pub fn expand_paths<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == extension))
                .collect();
            found.sort();
            files.extend(found);
        } else if !path.exists() && !path.extension().is_some_and(|e| e == extension) {
            // Missing and not named like a script: the caller meant a directory.
            return Err(SequencerError::DirectoryNotFound {
                path: path.to_path_buf(),
            });
        } else {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
