// src/watch/mod.rs

//! File watching and change-driven re-runs.
//!
//! - [`bindings`] maps a changed path to the tasks that own it.
//! - [`debounce`] is the pure Idle/Debouncing/Running state machine.
//! - [`watcher`] wires up the cross-platform `notify` watcher.
//! - [`scheduler`] is the async loop tying them to the task graph.

pub mod bindings;
pub mod debounce;
pub mod scheduler;
pub mod watcher;

pub use bindings::{WatchBinding, WatchBindings};
pub use debounce::{DebounceState, Debouncer};
pub use scheduler::{WatchScheduler, WatchSummary};
pub use watcher::{spawn_watcher, WatcherHandle};
