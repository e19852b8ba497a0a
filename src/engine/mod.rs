// src/engine/mod.rs

//! Orchestration engine for cmdctl.
//!
//! This module ties together:
//! - the per-key work queue ([`queue`]),
//! - the runtime loop ([`runtime`]) that reacts to:
//!   - store changes (spec edits, button clicks, file events, config maps,
//!     builds),
//!   - process events (natural exits, readiness),
//!   - shutdown requests,
//!
//!   and feeds reconcile workers.

pub mod queue;
pub mod runtime;

pub use queue::WorkQueue;
pub use runtime::Runtime;
