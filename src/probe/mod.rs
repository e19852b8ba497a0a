// src/probe/mod.rs

//! Readiness probing.
//!
//! - [`validate`] checks a declared probe and builds the concrete action.
//! - [`runner`] runs single attempts (`exec`, HTTP GET, TCP connect) behind
//!   the [`ProbeRunner`] trait so tests can script outcomes.
//! - [`worker`] drives attempts for one process instance: initial delay,
//!   bounded attempts every period, sticky success.

pub mod runner;
pub mod validate;
pub mod worker;

pub use runner::{ProbeOutcome, ProbeRunner, RealProbeRunner};
pub use validate::{ProbeAction, ProbeError, ValidProbe, validate};
pub use worker::spawn_probe_worker;
