// src/exec/mod.rs

//! Process supervision.
//!
//! - [`execer`] defines the [`Execer`] trait the reconciler drives, the
//!   [`ProcessHandle`] it gets back and the start request.
//! - [`local`] is the production implementation on `tokio::process`:
//!   output lines go to the instance's log span, natural exits are pushed as
//!   [`ProcessEvent`]s.
//! - [`signal`] holds the SIGTERM, grace period, SIGKILL escalation.

pub mod execer;
pub mod local;
pub mod signal;

use crate::model::Name;

pub use execer::{
    ExecError, Execer, ProcessHandle, ProcessState, SPAWN_FAILURE_EXIT_CODE, StartRequest,
};
pub use local::LocalExecer;

/// Something happened to a process instance that its `Cmd` should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub cmd: Name,
    pub instance: u64,
    pub kind: ProcessEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEventKind {
    Exited { code: i32 },
    Ready,
}
