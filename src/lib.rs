// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod logging;
pub mod registry;
pub mod script;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;

pub use crate::context::ContextStore;
pub use crate::errors::SequencerError;
pub use crate::registry::{
    CallArgs, ParamDescriptor, ParamType, ParamValue, ReloadTargets, SequenceDescriptor,
    SequenceHandle, SequenceRegistry,
};
pub use crate::types::WatcherKind;
pub use crate::watch::{FileWatcher, WatchQueue, WatcherFactory};

/// How often `--watch` checks for pending modifications.
const WATCH_TICK: Duration = Duration::from_millis(100);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - registry construction, context seeding and loading
/// - listing / dry-run output
/// - sequence execution, optionally re-run on file changes until Ctrl-C
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let registry = build_registry(&cfg)?;

    if args.dry_run {
        print_dry_run(&registry);
        return Ok(());
    }
    if args.list {
        print_listing(&registry);
        return Ok(());
    }

    let Some(sequence) = args.sequence.as_deref() else {
        bail!("no sequence given (pass a SEQUENCE name or use --list)");
    };

    if args.watch || cfg.config.auto_reload {
        registry.enable_auto_reload()?;
    }

    if !args.watch {
        return execute_once(&registry, sequence, &args.args);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    info!(sequence, "watching sequence files (Ctrl-C to stop)");
    report(execute_once(&registry, sequence, &args.args));

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(WATCH_TICK);
        if registry.module_modifications_detected() {
            report(execute_once(&registry, sequence, &args.args));
        }
    }

    registry.disable_auto_reload()?;
    info!("stopped watching");
    Ok(())
}

/// Build a registry from a validated config and load its sequence paths.
pub fn build_registry(cfg: &ConfigFile) -> Result<SequenceRegistry> {
    let factory = WatcherFactory::new().with_poll_interval(cfg.config.poll_interval);
    let mut registry = SequenceRegistry::new().with_watcher_factory(factory);
    if let Some(kind) = cfg.config.watcher {
        registry = registry.with_watcher_kind(kind);
    }

    for (name, value) in &cfg.context {
        registry.add_context(name.clone(), value.to_dynamic());
    }
    registry.register_external_logger(|line| println!("{line}"));

    registry.load(&cfg.sequence_paths, true)?;
    Ok(registry)
}

/// Apply `KEY=VALUE` arguments and run `sequence` once.
///
/// Arguments are re-applied on every call because a reload resets
/// descriptors to their declared defaults.
fn execute_once(
    registry: &SequenceRegistry,
    sequence: &str,
    args: &[(String, String)],
) -> Result<()> {
    // Triggers the pending-reload check before the values are applied.
    let handle = registry.sequence(sequence)?;
    for (param, value) in args {
        registry.set_param_value(handle.name(), param, ParamValue::Str(value.clone()))?;
    }

    let result = registry.sequence(sequence)?.call_with_current_values()?;
    if !result.is_unit() {
        println!("{result}");
    }
    debug!(sequence, "sequence finished");
    Ok(())
}

fn report(result: Result<()>) {
    if let Err(err) = result {
        error!("{err:#}");
    }
}

fn print_dry_run(registry: &SequenceRegistry) {
    println!("sequencer dry-run");
    let files = registry.file_paths();
    println!("modules ({}):", files.len());
    for (module, path) in &files {
        println!("  - {module}: {}", path.display());
    }
    println!("sequences ({}):", registry.sequences().len());
    debug!("dry-run complete (no execution)");
}

fn print_listing(registry: &SequenceRegistry) {
    let requires = registry.requires();
    for (module, sequences) in registry.sequence_modules() {
        println!("{module}");
        if let Some(deps) = requires.get(&module).filter(|d| !d.is_empty()) {
            println!("  requires: {}", deps.join(", "));
        }
        for (name, descriptor) in sequences {
            let params: Vec<String> = descriptor
                .params
                .iter()
                .map(|p| format!("{}: {} = {}", p.name, p.kind, p.default))
                .collect();
            println!("  - {name}({})", params.join(", "));
        }
    }
}
