// src/context.rs

//! Host objects reachable from scripts through `get_context(name)`.

use std::collections::HashMap;

use parking_lot::RwLock;
use rhai::Dynamic;
use tracing::debug;

use crate::errors::{Result, SequencerError};

/// Flat name → object map shared by the registry and every loaded unit.
///
/// Entries are inserted or overwritten by [`add`](Self::add) and are never
/// removed automatically. Values are stored as [`Dynamic`], so host objects
/// with interior state should be cheap-to-clone handles (e.g. `Arc<Mutex<_>>`)
/// whose type is registered on the script engines through an engine hook.
#[derive(Debug, Default)]
pub struct ContextStore {
    values: RwLock<HashMap<String, Dynamic>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the object registered under `name`.
    pub fn add<T: Clone + Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        debug!(context = %name, "context object added");
        self.values.write().insert(name, Dynamic::from(value));
    }

    /// Look up `name`, failing with `MissingContext` if it was never added.
    pub fn get(&self, name: &str) -> Result<Dynamic> {
        self.values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SequencerError::MissingContext(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
