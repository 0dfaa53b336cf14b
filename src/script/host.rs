// src/script/host.rs

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rhai::Engine;
use tracing::info;

use crate::context::ContextStore;

/// Receives every line a script prints.
pub type ExternalLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs on every script engine right after it is built.
pub type EngineHook = Arc<dyn Fn(&mut Engine) + Send + Sync>;

/// Host services shared by every unit of one registry.
///
/// Loggers are looked up at print time, so they apply to already loaded
/// units. Engine hooks apply to engines built after registration, i.e. to
/// units loaded or re-resolved afterwards.
#[derive(Default)]
pub struct ScriptHost {
    context: Arc<ContextStore>,
    loggers: RwLock<Vec<ExternalLogger>>,
    hooks: RwLock<Vec<EngineHook>>,
}

impl fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHost")
            .field("context", &self.context.names())
            .field("loggers", &self.loggers.read().len())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    pub fn add_logger(&self, logger: ExternalLogger) {
        self.loggers.write().push(logger);
    }

    pub fn add_engine_hook(&self, hook: EngineHook) {
        self.hooks.write().push(hook);
    }

    /// Forward one line of script output to tracing and every logger.
    pub fn log_line(&self, module: &str, line: &str) {
        info!(target: "sequence", module, "{line}");
        let loggers = self.loggers.read().clone();
        for logger in &loggers {
            logger(line);
        }
    }

    pub(crate) fn apply_hooks(&self, engine: &mut Engine) {
        for hook in self.hooks.read().iter() {
            hook(engine);
        }
    }
}
