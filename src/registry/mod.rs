// src/registry/mod.rs

//! The sequence registry: loading, dependency resolution, reloading and
//! dispatch of script units, plus the optional watcher behind auto-reload.
//!
//! All structural state lives behind one mutex. Every public operation takes
//! it for its whole duration, including the drain-and-reload check that
//! precedes a lookup, so a reload can never interleave with a concurrent
//! lookup of the same module. The lock is released before a sequence runs.

pub mod args;
pub mod descriptor;
pub mod graph;
pub mod handle;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Dynamic, Engine};
use tracing::{debug, info, trace, warn};

use crate::context::ContextStore;
use crate::errors::{Result, SequencerError};
use crate::script::{expand_paths, Import, RhaiLoader, ScriptHost, ScriptLoader, ScriptUnit};
use crate::types::WatcherKind;
use crate::watch::path_utils::watch_key;
use crate::watch::{FileWatcher, WatcherFactory};

pub use args::CallArgs;
pub use descriptor::{ParamDescriptor, ParamType, ParamValue, SequenceDescriptor};
pub use graph::DependencyGraph;
pub use handle::SequenceHandle;

/// Which loaded modules a reload applies to.
///
/// Files and module names are unioned. When both are empty every loaded
/// module is reloaded.
#[derive(Debug, Clone, Default)]
pub struct ReloadTargets {
    pub file_paths: Vec<PathBuf>,
    pub module_names: Vec<String>,
}

impl ReloadTargets {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn files<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::default().and_files(paths)
    }

    pub fn modules<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::default().and_modules(names)
    }

    pub fn and_files<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.file_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn and_modules<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.module_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_all(&self) -> bool {
        self.file_paths.is_empty() && self.module_names.is_empty()
    }
}

#[derive(Default)]
struct RegistryState {
    modules: BTreeMap<String, Arc<dyn ScriptUnit>>,
    provides: BTreeMap<String, Vec<String>>,
    requires: BTreeMap<String, Vec<String>>,
    file_paths: BTreeMap<String, PathBuf>,
    sequences: BTreeMap<String, SequenceDescriptor>,
    watcher: Option<Box<dyn FileWatcher>>,
    auto_reload: bool,
}

impl RegistryState {
    fn module_for_path(&self, path: &Path) -> Option<&str> {
        self.file_paths
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(m, _)| m.as_str())
    }

    fn watch(&mut self, paths: &[PathBuf]) {
        if !self.auto_reload {
            return;
        }
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.add_watch(paths) {
                warn!("failed to watch sequence files: {err}");
            }
        }
    }

    fn unwatch(&mut self, paths: &[PathBuf]) {
        if !self.auto_reload {
            return;
        }
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.remove_watch(paths) {
                warn!("failed to unwatch sequence files: {err}");
            }
        }
    }
}

/// A validated unit, ready to be committed into the registry.
struct StagedModule {
    unit: Arc<dyn ScriptUnit>,
    provides: Vec<String>,
    requires: Vec<String>,
    descriptors: Vec<SequenceDescriptor>,
}

/// Registry of loaded sequence modules.
pub struct SequenceRegistry {
    state: Mutex<RegistryState>,
    host: Arc<ScriptHost>,
    loader: Box<dyn ScriptLoader>,
    factory: WatcherFactory,
    watcher_kind: Option<WatcherKind>,
}

impl fmt::Debug for SequenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SequenceRegistry")
            .field("modules", &state.modules.keys().collect::<Vec<_>>())
            .field("sequences", &state.sequences.keys().collect::<Vec<_>>())
            .field("auto_reload", &state.auto_reload)
            .field("loader", &self.loader)
            .finish()
    }
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceRegistry {
    /// Empty registry loading Rhai units, with a watcher chosen for the platform.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            host: Arc::new(ScriptHost::new()),
            loader: Box::new(RhaiLoader),
            factory: WatcherFactory::new(),
            watcher_kind: None,
        }
    }

    /// Create a registry and load + resolve `paths` into it.
    pub fn with_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let registry = Self::new();
        registry.load(paths, true)?;
        Ok(registry)
    }

    pub fn with_loader(mut self, loader: impl ScriptLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_watcher_factory(mut self, factory: WatcherFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Force a watcher strategy instead of probing the platform.
    pub fn with_watcher_kind(mut self, kind: WatcherKind) -> Self {
        self.watcher_kind = Some(kind);
        self
    }

    // ---------------------------------------------------------------------
    // Load / resolve / reload
    // ---------------------------------------------------------------------

    /// Load script files and directories, optionally resolving afterwards.
    ///
    /// Files load in order. The first file that fails aborts the batch with
    /// its error; files loaded before it stay loaded.
    pub fn load<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>, resolve: bool) -> Result<()> {
        let files = expand_paths(paths, self.loader.extension())?;
        let mut state = self.state.lock();

        for file in &files {
            let unit = self.loader.load(file, &self.host)?;
            let staged = stage(&state, unit, None)?;
            commit(&mut state, staged);
        }

        if resolve {
            resolve_locked(&state)?;
        }
        Ok(())
    }

    /// Inject every module's directly required sequences into it.
    pub fn resolve(&self) -> Result<()> {
        let state = self.state.lock();
        resolve_locked(&state)
    }

    /// Reload modules from disk.
    ///
    /// Each file is compiled and validated before its previous version is
    /// replaced, so a file that fails keeps its last working version. The
    /// first failure stops the batch and is returned; earlier files stay
    /// reloaded. With `resolve` the whole registry is re-resolved at the end,
    /// otherwise dependents keep calling the implementations they were last
    /// resolved against.
    pub fn reload(&self, targets: ReloadTargets, resolve: bool) -> Result<()> {
        let mut state = self.state.lock();
        reload_locked(&mut state, self.loader.as_ref(), &self.host, &targets, resolve)
    }

    pub fn reload_all(&self, resolve: bool) -> Result<()> {
        self.reload(ReloadTargets::all(), resolve)
    }

    pub fn reload_modules<S: Into<String>>(
        &self,
        names: impl IntoIterator<Item = S>,
        resolve: bool,
    ) -> Result<()> {
        self.reload(ReloadTargets::modules(names), resolve)
    }

    pub fn reload_files<P: Into<PathBuf>>(
        &self,
        paths: impl IntoIterator<Item = P>,
        resolve: bool,
    ) -> Result<()> {
        self.reload(ReloadTargets::files(paths), resolve)
    }

    /// Remove a module and every sequence it provides.
    pub fn unload(&self, module: &str) -> Result<()> {
        let mut state = self.state.lock();
        let path = state
            .file_paths
            .get(module)
            .cloned()
            .ok_or_else(|| SequencerError::ModuleNotLoaded {
                module: module.to_string(),
            })?;
        state.unwatch(&[path]);
        unload_locked(&mut state, module);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Look up a sequence after applying any pending file modifications.
    pub fn sequence(&self, name: &str) -> Result<SequenceHandle> {
        let mut state = self.state.lock();
        self.apply_modifications(&mut state)?;

        let descriptor = state
            .sequences
            .get(name)
            .cloned()
            .ok_or_else(|| SequencerError::MissingSequence(name.to_string()))?;
        let unit = state
            .modules
            .get(&descriptor.module)
            .cloned()
            .ok_or_else(|| SequencerError::MissingSequence(name.to_string()))?;

        Ok(SequenceHandle::new(descriptor, unit))
    }

    pub fn execute(&self, name: &str, args: CallArgs) -> Result<Dynamic> {
        self.sequence(name)?.call(args)
    }

    /// Execute with every parameter bound to its current descriptor value.
    pub fn execute_with_current_values(&self, name: &str) -> Result<Dynamic> {
        self.sequence(name)?.call_with_current_values()
    }

    pub fn has_sequence(&self, name: &str) -> bool {
        self.state.lock().sequences.contains_key(name)
    }

    /// Set the current value of a sequence parameter, coercing it to the
    /// parameter's type.
    pub fn set_param_value(&self, sequence: &str, param: &str, value: ParamValue) -> Result<()> {
        let mut state = self.state.lock();
        let descriptor = state
            .sequences
            .get_mut(sequence)
            .ok_or_else(|| SequencerError::MissingSequence(sequence.to_string()))?;
        descriptor.set_value(param, value)
    }

    // ---------------------------------------------------------------------
    // Context and host hooks
    // ---------------------------------------------------------------------

    pub fn add_context<T: Clone + Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        self.host.context().add(name, value);
    }

    pub fn get_context(&self, name: &str) -> Result<Dynamic> {
        self.host.context().get(name)
    }

    pub fn context(&self) -> Arc<ContextStore> {
        Arc::clone(self.host.context())
    }

    /// Receive every line printed by any loaded script.
    pub fn register_external_logger(&self, logger: impl Fn(&str) + Send + Sync + 'static) {
        self.host.add_logger(Arc::new(logger));
    }

    /// Run `hook` on every script engine built from now on.
    ///
    /// Units loaded earlier pick the hook up at the next resolve.
    pub fn register_engine_hook(&self, hook: impl Fn(&mut Engine) + Send + Sync + 'static) {
        self.host.add_engine_hook(Arc::new(hook));
    }

    // ---------------------------------------------------------------------
    // Auto-reload
    // ---------------------------------------------------------------------

    pub fn enable_auto_reload(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.auto_reload {
            return Err(SequencerError::AutoReloadAlreadyEnabled);
        }

        let paths: Vec<PathBuf> = state.file_paths.values().cloned().collect();
        match state.watcher.as_mut() {
            Some(watcher) => {
                watcher.add_watch(&paths)?;
                watcher.run()?;
            }
            None => {
                let watcher = match self.watcher_kind {
                    Some(kind) => self.factory.create_kind(kind, Some(&paths))?,
                    None => self.factory.create(None, Some(&paths))?,
                };
                state.watcher = Some(watcher);
            }
        }

        state.auto_reload = true;
        info!(
            files = paths.len(),
            watcher = ?state.watcher.as_ref().map(|w| w.kind()),
            "auto reload enabled"
        );
        Ok(())
    }

    pub fn disable_auto_reload(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.auto_reload {
            return Err(SequencerError::AutoReloadNotEnabled);
        }

        if let Some(watcher) = state.watcher.as_mut() {
            watcher.stop()?;
            let discarded = watcher.modified_files_queue().drain();
            if !discarded.is_empty() {
                debug!(count = discarded.len(), "discarded pending modifications");
            }
        }

        state.auto_reload = false;
        info!("auto reload disabled");
        Ok(())
    }

    pub fn is_auto_reload_enabled(&self) -> bool {
        self.state.lock().auto_reload
    }

    /// Strategy of the watcher, once one has been created.
    pub fn watcher_kind(&self) -> Option<WatcherKind> {
        self.state.lock().watcher.as_ref().map(|w| w.kind())
    }

    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .watcher
            .as_ref()
            .map(|w| w.watched_files())
            .unwrap_or_default()
    }

    /// Whether modified files are waiting to be reloaded. Does not drain.
    pub fn module_modifications_detected(&self) -> bool {
        let state = self.state.lock();
        state.auto_reload
            && state
                .watcher
                .as_ref()
                .is_some_and(|w| !w.modified_files_queue().is_empty())
    }

    /// Drain the pending modifications and return those of loaded modules.
    ///
    /// For controllers that decide themselves when to reload.
    pub fn modified_module_paths(&self) -> Vec<PathBuf> {
        let state = self.state.lock();
        let Some(watcher) = state.watcher.as_ref() else {
            return Vec::new();
        };
        watcher
            .modified_files_queue()
            .drain()
            .into_iter()
            .filter(|p| state.module_for_path(p).is_some())
            .collect()
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn modules(&self) -> Vec<String> {
        self.state.lock().modules.keys().cloned().collect()
    }

    pub fn sequences(&self) -> Vec<String> {
        self.state.lock().sequences.keys().cloned().collect()
    }

    pub fn provides(&self) -> BTreeMap<String, Vec<String>> {
        self.state.lock().provides.clone()
    }

    pub fn requires(&self) -> BTreeMap<String, Vec<String>> {
        self.state.lock().requires.clone()
    }

    pub fn file_paths(&self) -> BTreeMap<String, PathBuf> {
        self.state.lock().file_paths.clone()
    }

    pub fn descriptor(&self, sequence: &str) -> Option<SequenceDescriptor> {
        self.state.lock().sequences.get(sequence).cloned()
    }

    /// Descriptors grouped by module: module → sequence → descriptor.
    pub fn sequence_modules(&self) -> BTreeMap<String, BTreeMap<String, SequenceDescriptor>> {
        let state = self.state.lock();
        let mut grouped: BTreeMap<String, BTreeMap<String, SequenceDescriptor>> = state
            .modules
            .keys()
            .map(|m| (m.clone(), BTreeMap::new()))
            .collect();
        for (name, descriptor) in &state.sequences {
            grouped
                .entry(descriptor.module.clone())
                .or_default()
                .insert(name.clone(), descriptor.clone());
        }
        grouped
    }

    /// Modules that directly require `module`.
    pub fn dependents_of(&self, module: &str) -> Vec<String> {
        let state = self.state.lock();
        DependencyGraph::build(&state.requires).dependents_of(module)
    }

    fn apply_modifications(&self, state: &mut RegistryState) -> Result<()> {
        if !state.auto_reload {
            return Ok(());
        }
        let Some(watcher) = state.watcher.as_ref() else {
            return Ok(());
        };

        let modified = watcher.modified_files_queue().drain();
        if modified.is_empty() {
            return Ok(());
        }

        let (loaded, stray): (Vec<PathBuf>, Vec<PathBuf>) = modified
            .into_iter()
            .partition(|p| state.module_for_path(p).is_some());
        for path in &stray {
            debug!(path = %path.display(), "ignoring modification of unloaded file");
        }
        if loaded.is_empty() {
            return Ok(());
        }

        info!(count = loaded.len(), "reloading modified sequence modules");
        reload_locked(
            state,
            self.loader.as_ref(),
            &self.host,
            &ReloadTargets::files(loaded),
            true,
        )
    }
}

/// Validate `unit` against the registry without mutating it.
///
/// `replacing` names the module this unit is about to replace, whose own
/// sequences do not count as duplicates.
fn stage(
    state: &RegistryState,
    unit: Arc<dyn ScriptUnit>,
    replacing: Option<&str>,
) -> Result<StagedModule> {
    let module = unit.name().to_string();

    if replacing != Some(module.as_str()) {
        if let Some(existing) = state.file_paths.get(&module) {
            return Err(SequencerError::DuplicateModule {
                module,
                path: existing.clone(),
            });
        }
    }

    let provides = match unit.declared_provides() {
        Some(declared) => declared.to_vec(),
        None => unit.callables(),
    };

    let mut descriptors: Vec<SequenceDescriptor> = Vec::with_capacity(provides.len());
    for sequence in &provides {
        let existing = state
            .sequences
            .get(sequence)
            .map(|d| d.module.as_str())
            .filter(|owner| Some(*owner) != replacing)
            .or_else(|| {
                descriptors
                    .iter()
                    .any(|d| &d.name == sequence)
                    .then_some(module.as_str())
            });
        if let Some(existing) = existing {
            return Err(SequencerError::DuplicateSequence {
                module: module.clone(),
                sequence: sequence.clone(),
                existing: existing.to_string(),
            });
        }

        if !unit.has_callable(sequence) {
            return Err(SequencerError::MissingImplementation {
                module: module.clone(),
                sequence: sequence.clone(),
            });
        }

        let params = unit.parameters(sequence);
        descriptors.push(SequenceDescriptor::build(&module, sequence, &params)?);
    }

    Ok(StagedModule {
        requires: unit.declared_requires().to_vec(),
        unit,
        provides,
        descriptors,
    })
}

/// Install a staged module, replacing any previous version of it.
fn commit(state: &mut RegistryState, staged: StagedModule) {
    let module = staged.unit.name().to_string();
    let path = staged.unit.path().to_path_buf();

    unload_locked(state, &module);

    for descriptor in staged.descriptors {
        state.sequences.insert(descriptor.name.clone(), descriptor);
    }
    info!(
        module = %module,
        sequences = staged.provides.len(),
        requires = ?staged.requires,
        "loaded sequence module"
    );
    state.provides.insert(module.clone(), staged.provides);
    state.requires.insert(module.clone(), staged.requires);
    state.file_paths.insert(module.clone(), path.clone());
    state.modules.insert(module, staged.unit);

    state.watch(&[path]);
}

/// Drop every registry-visible trace of `module`.
fn unload_locked(state: &mut RegistryState, module: &str) -> Option<Arc<dyn ScriptUnit>> {
    let unit = state.modules.remove(module)?;

    for sequence in state.provides.remove(module).unwrap_or_default() {
        if state
            .sequences
            .get(&sequence)
            .is_some_and(|d| d.module == module)
        {
            state.sequences.remove(&sequence);
        }
    }
    state.requires.remove(module);
    state.file_paths.remove(module);

    // Drops the unit's references to its providers. Dependents that still
    // hold this unit keep calling it until they are resolved again.
    if let Err(err) = unit.bind_imports(&[]) {
        debug!(module, "failed to clear imports of unloaded module: {err}");
    }
    debug!(module, "unloaded sequence module");
    Some(unit)
}

fn resolve_locked(state: &RegistryState) -> Result<()> {
    let graph = DependencyGraph::build(&state.requires);
    let missing = graph.missing(|m| state.modules.contains_key(m));
    if !missing.is_empty() {
        return Err(SequencerError::UnresolvedModules { missing });
    }

    // Providers are bound before their dependents; a cycle falls back to name order.
    let order = graph.load_order().unwrap_or_else(|| {
        debug!("sequence modules have circular requirements");
        state.modules.keys().cloned().collect()
    });

    for name in &order {
        let Some(unit) = state.modules.get(name) else {
            continue;
        };
        let mut imports = Vec::new();
        for required in state.requires.get(name).into_iter().flatten() {
            let (Some(provider), Some(provided)) =
                (state.modules.get(required), state.provides.get(required))
            else {
                continue;
            };
            imports.extend(provided.iter().map(|sequence| Import {
                sequence: sequence.clone(),
                provider: Arc::clone(provider),
            }));
        }
        trace!(module = %name, imports = imports.len(), "binding imports");
        unit.bind_imports(&imports)?;
    }

    info!(modules = state.modules.len(), "resolved sequence modules");
    Ok(())
}

/// Map reload targets to `(module, path)` pairs, in request order.
fn reload_targets(state: &RegistryState, targets: &ReloadTargets) -> Result<Vec<(String, PathBuf)>> {
    if targets.is_all() {
        return Ok(state
            .file_paths
            .iter()
            .map(|(m, p)| (m.clone(), p.clone()))
            .collect());
    }

    let mut resolved: Vec<(String, PathBuf)> = Vec::new();
    for path in &targets.file_paths {
        let key = watch_key(path).unwrap_or_else(|| path.clone());
        let module = state
            .module_for_path(&key)
            .ok_or_else(|| SequencerError::FileNotLoaded { path: path.clone() })?;
        if !resolved.iter().any(|(m, _)| m == module) {
            resolved.push((module.to_string(), key));
        }
    }
    for module in &targets.module_names {
        let path = state
            .file_paths
            .get(module)
            .ok_or_else(|| SequencerError::ModuleNotLoaded {
                module: module.clone(),
            })?;
        if !resolved.iter().any(|(m, _)| m == module) {
            resolved.push((module.clone(), path.clone()));
        }
    }
    Ok(resolved)
}

fn reload_locked(
    state: &mut RegistryState,
    loader: &dyn ScriptLoader,
    host: &Arc<ScriptHost>,
    targets: &ReloadTargets,
    resolve: bool,
) -> Result<()> {
    let batch = reload_targets(state, targets)?;
    let paths: Vec<PathBuf> = batch.iter().map(|(_, p)| p.clone()).collect();

    state.unwatch(&paths);
    let result = reload_batch(state, loader, host, &batch);
    // Targets still loaded (including failed ones kept at their old version)
    // go back on the watch list.
    let still_loaded: Vec<PathBuf> = batch
        .iter()
        .filter(|(m, _)| state.modules.contains_key(m))
        .map(|(_, p)| p.clone())
        .collect();
    state.watch(&still_loaded);
    result?;

    info!(modules = batch.len(), "reloaded sequence modules");
    if resolve {
        resolve_locked(state)?;
    }
    Ok(())
}

fn reload_batch(
    state: &mut RegistryState,
    loader: &dyn ScriptLoader,
    host: &Arc<ScriptHost>,
    batch: &[(String, PathBuf)],
) -> Result<()> {
    for (module, path) in batch {
        debug!(module = %module, path = %path.display(), "reloading sequence module");
        let unit = loader.load(path, host).inspect_err(|err| {
            warn!(module = %module, "reload failed, keeping previous version: {err}");
        })?;
        let staged = stage(state, unit, Some(module)).inspect_err(|err| {
            warn!(module = %module, "reload failed, keeping previous version: {err}");
        })?;
        commit(state, staged);
    }
    Ok(())
}
