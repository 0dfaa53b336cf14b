// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Turning writes to loaded script files into queued paths.
//! - Two interchangeable detection strategies (`notify` events, stat polling)
//!   behind the [`FileWatcher`] trait, each on its own background thread.
//! - Picking a strategy by name or by platform capability.
//!
//! It does **not** know about modules or dependencies; the registry drains the
//! queue and decides what to reload.

pub mod event;
pub mod factory;
pub mod path_utils;
pub mod polling;
pub mod queue;
pub mod watcher;

pub use event::EventWatcher;
pub use factory::{event_support_available, WatcherFactory};
pub use polling::{PollingWatcher, DEFAULT_POLL_INTERVAL};
pub use queue::WatchQueue;
pub use watcher::FileWatcher;
