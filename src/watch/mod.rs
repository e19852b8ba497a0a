// src/watch/mod.rs

//! Filesystem watching for `FileWatch` resources.
//!
//! Each `FileWatch` is compiled into a glob profile. Changed paths are matched
//! against every profile and the watcher stamps `last_event_time` on the
//! ones that match. It knows nothing about `Cmd`s; the trigger index takes it
//! from there.

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{FileWatchProfile, build_profiles, matching_watches};
pub use watcher::{WatcherHandle, spawn_watcher};
