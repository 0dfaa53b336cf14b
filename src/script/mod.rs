// src/script/mod.rs

//! Script units: the boundary between the registry and script execution.
//!
//! The registry never touches an interpreter directly. It loads units
//! through a [`ScriptLoader`], reads their declared metadata and invokes them
//! through the [`ScriptUnit`] trait.

pub mod host;
pub mod rhai_unit;
pub mod unit;

pub use host::{EngineHook, ExternalLogger, ScriptHost};
pub use rhai_unit::{RhaiLoader, RhaiUnit};
pub use unit::{expand_paths, module_name, Import, RawParam, ScriptLoader, ScriptUnit};
