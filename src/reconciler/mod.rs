// src/reconciler/mod.rs

//! The `Cmd` reconciler.
//!
//! - [`decide`] is the pure state machine.
//! - [`triggers`] reads trigger source timestamps out of the store.
//! - [`inputs`] renders button inputs as environment variables.
//! - [`controller`] is the async shell: it owns process instances and writes
//!   status.

pub mod controller;
pub mod decide;
pub mod inputs;
pub mod triggers;

pub use controller::CmdController;
pub use decide::{DecideInput, Decision, WatermarkUpdate, decide};
pub use triggers::{SourceTime, TriggerReading, TriggerRole, read_triggers};
