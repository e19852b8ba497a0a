// src/config/mod.rs

//! `Cmdctl.toml`: the raw serde model, its validation into store resources,
//! and duration parsing shared by both.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_and_validate};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, Settings};
