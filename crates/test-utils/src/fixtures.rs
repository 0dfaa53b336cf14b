use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::builders::ScriptBuilder;

/// A temporary directory of sequence modules.
///
/// Paths handed out are canonical, so they compare equal to the paths the
/// registry and the watchers report.
pub struct SequenceDir {
    dir: TempDir,
    root: PathBuf,
}

impl SequenceDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize temp dir");
        Self { dir, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of module `name` (`<root>/<name>.rhai`), whether or not it exists.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.rhai"))
    }

    /// Write module `name` with raw Rhai `source`, replacing any previous content.
    pub fn write(&self, name: &str, source: &str) -> PathBuf {
        let path = self.file(name);
        std::fs::write(&path, source).expect("failed to write script");
        path
    }

    pub fn write_script(&self, name: &str, script: &ScriptBuilder) -> PathBuf {
        self.write(name, &script.build())
    }

    /// Create a subdirectory and return its path.
    pub fn subdir(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        std::fs::create_dir_all(&path).expect("failed to create subdir");
        path
    }

    pub fn temp_dir(&self) -> &TempDir {
        &self.dir
    }
}

impl Default for SequenceDir {
    fn default() -> Self {
        Self::new()
    }
}
