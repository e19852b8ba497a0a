use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use cmdctl::exec::{
    ExecError, Execer, ProcessEvent, ProcessEventKind, ProcessHandle, ProcessState, StartRequest,
};
use cmdctl::logs::SpanLogger;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Exit code a fake process reports when it is stopped.
pub const FAKE_STOP_CODE: i32 = -1;

/// What the fake knows about one started process.
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub cmd: String,
    pub instance: u64,
    pub pid: u32,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub env: Vec<String>,
    pub logger: SpanLogger,
    state: Arc<watch::Sender<ProcessState>>,
    lifetime: CancellationToken,
}

impl FakeProcess {
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Write a line of output into the instance's log span.
    pub fn print(&self, line: &str) {
        self.logger.info(line);
    }
}

/// An [`Execer`] that never spawns anything.
///
/// - every start is recorded with its args, dir and env
/// - [`FakeExecer::exit`] simulates a natural exit and pushes the event
/// - a stop request moves the process to `Stopped` without an event
pub struct FakeExecer {
    events: mpsc::UnboundedSender<ProcessEvent>,
    processes: Mutex<Vec<FakeProcess>>,
    failing: Mutex<HashSet<String>>,
    /// Cmds that got a new process while an older one was still running.
    overlaps: Mutex<Vec<String>>,
    next_pid: AtomicU32,
}

impl FakeExecer {
    pub fn new(events: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            events,
            processes: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            overlaps: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Every process ever started, oldest first.
    pub fn processes(&self) -> Vec<FakeProcess> {
        self.processes.lock().clone()
    }

    pub fn started(&self, cmd: &str) -> Vec<FakeProcess> {
        self.processes
            .lock()
            .iter()
            .filter(|p| p.cmd == cmd)
            .cloned()
            .collect()
    }

    pub fn start_count(&self, cmd: &str) -> usize {
        self.started(cmd).len()
    }

    /// The most recent process for `cmd`, whatever its state.
    pub fn latest(&self, cmd: &str) -> Option<FakeProcess> {
        self.started(cmd).pop()
    }

    pub fn running(&self, cmd: &str) -> Option<FakeProcess> {
        self.started(cmd).into_iter().rev().find(FakeProcess::is_running)
    }

    pub fn running_count(&self) -> usize {
        self.processes.lock().iter().filter(|p| p.is_running()).count()
    }

    /// Make every later start of `cmd` fail like a missing binary.
    /// Every start that happened while the same cmd still had a live process.
    pub fn overlapping_starts(&self) -> Vec<String> {
        self.overlaps.lock().clone()
    }

    pub fn fail_spawns(&self, cmd: &str) {
        self.failing.lock().insert(cmd.to_string());
    }

    /// Let the running process of `cmd` exit on its own with `code`.
    ///
    /// Returns false when nothing was running.
    pub fn exit(&self, cmd: &str, code: i32) -> bool {
        let Some(proc) = self.running(cmd) else {
            return false;
        };
        let changed = proc.state.send_if_modified(|s| {
            if s.is_running() {
                *s = ProcessState::Exited { code };
                true
            } else {
                false
            }
        });
        proc.lifetime.cancel();
        if changed {
            let _ = self.events.send(ProcessEvent {
                cmd: proc.cmd.clone(),
                instance: proc.instance,
                kind: ProcessEventKind::Exited { code },
            });
        }
        changed
    }
}

impl Execer for FakeExecer {
    fn start(&self, req: StartRequest) -> Result<ProcessHandle, ExecError> {
        if req.args.is_empty() {
            return Err(ExecError::EmptyArgs);
        }
        if self.failing.lock().contains(&req.cmd) {
            return Err(ExecError::Spawn {
                program: req.args[0].clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }

        if self.running(&req.cmd).is_some() {
            self.overlaps.lock().push(req.cmd.clone());
        }

        let (tx, rx) = watch::channel(ProcessState::Running);
        let state = Arc::new(tx);
        let lifetime = CancellationToken::new();
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);

        let task = {
            let state = state.clone();
            let lifetime = lifetime.clone();
            tokio::spawn(async move {
                lifetime.cancelled().await;
                state.send_if_modified(|s| {
                    if s.is_running() {
                        *s = ProcessState::Stopped {
                            code: FAKE_STOP_CODE,
                        };
                        true
                    } else {
                        false
                    }
                });
            })
        };

        self.processes.lock().push(FakeProcess {
            cmd: req.cmd,
            instance: req.instance,
            pid,
            args: req.args,
            dir: req.dir,
            env: req.env,
            logger: req.logger,
            state,
            lifetime: lifetime.clone(),
        });

        Ok(ProcessHandle::new(
            req.instance,
            Some(pid),
            rx,
            lifetime,
            Some(task),
        ))
    }
}
