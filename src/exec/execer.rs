// src/exec/execer.rs

//! Supervisor abstraction.
//!
//! The reconciler only talks to an [`Execer`]. Production code uses
//! [`crate::exec::LocalExecer`]; tests swap in a fake that never spawns an OS
//! process but hands out the same [`ProcessHandle`]s.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::logs::SpanLogger;
use crate::model::Name;

/// Exit code recorded when a process could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty argument list")]
    EmptyArgs,

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything needed to start one process instance.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub cmd: Name,
    /// Monotonic per-controller id; events carry it back so that events of a
    /// disposed instance can be told apart from the current one.
    pub instance: u64,
    pub args: Vec<String>,
    pub dir: PathBuf,
    /// `NAME=value` pairs layered over the inherited environment.
    pub env: Vec<String>,
    pub logger: SpanLogger,
}

/// Lifecycle of one process instance as seen by its supervisor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited on its own.
    Exited { code: i32 },
    /// Stopped on request.
    Stopped { code: i32 },
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::Running => None,
            ProcessState::Exited { code } | ProcessState::Stopped { code } => Some(*code),
        }
    }
}

/// Ownership-exclusive handle to a running instance.
///
/// Dropping the handle does not stop the process; call [`ProcessHandle::stop`]
/// or [`ProcessHandle::terminate`].
#[derive(Debug)]
pub struct ProcessHandle {
    instance: u64,
    pid: Option<u32>,
    state: watch::Receiver<ProcessState>,
    /// Cancelled to request a stop, and by the supervisor once the process
    /// has ended for any reason.
    lifetime: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    pub fn new(
        instance: u64,
        pid: Option<u32>,
        state: watch::Receiver<ProcessState>,
        lifetime: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            instance,
            pid,
            state,
            lifetime,
            task,
        }
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking view of the current state.
    pub fn poll(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Token that fires once the instance is done or asked to stop.
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Ask the supervisor to stop the process and return immediately.
    pub fn stop(&self) {
        self.lifetime.cancel();
    }

    /// Stop the process and wait until it is gone.
    ///
    /// The wait is bounded by the supervisor's grace period plus the force
    /// kill.
    pub async fn terminate(&mut self) -> ProcessState {
        self.stop();
        let mut rx = self.state.clone();
        let finished = rx.wait_for(|s| !s.is_running()).await.map(|s| *s);
        let state = match finished {
            Ok(s) => s,
            Err(_) => *rx.borrow(),
        };
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        state
    }
}

/// Starts OS processes.
pub trait Execer: Send + Sync {
    /// Spawn the process described by `req`.
    ///
    /// Must be called from within a tokio runtime. On natural exit the
    /// implementation pushes a [`crate::exec::ProcessEvent`]; on a requested
    /// stop it does not.
    fn start(&self, req: StartRequest) -> Result<ProcessHandle, ExecError>;
}
