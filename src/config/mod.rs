// src/config/mod.rs

//! `Sequencer.toml` loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_dir, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, ReloadSettings};
