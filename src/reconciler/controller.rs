// src/reconciler/controller.rs

//! Async shell around [`decide`]: owns process instances, drives the
//! supervisor and prober, and writes `Cmd` status back to the store.
//!
//! Each call to [`CmdController::reconcile`] handles exactly one `Cmd`. The
//! work queue guarantees that no two calls for the same name overlap, so a
//! process record can be taken out of the map for the duration of a pass.
//!
//! Disabling or deleting a `Cmd` signals its process without waiting. The
//! handle is parked in `draining` until the process is gone, and the next
//! start for that name waits for it first.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::disable;
use crate::errors::Result;
use crate::exec::{
    Execer, ProcessEvent, ProcessEventKind, ProcessHandle, ProcessState, SPAWN_FAILURE_EXIT_CODE,
    StartRequest,
};
use crate::index::TriggerIndex;
use crate::logs::{SharedLogSink, SpanId, SpanLogger};
use crate::model::{Cmd, CmdState, ExecSpec, Name, Timestamp, TriggerSource};
use crate::probe::{self, ProbeRunner};
use crate::store::{Action, Store};

use super::decide::{DISABLED_REASON, DecideInput, Decision, decide};
use super::inputs::button_env;
use super::triggers::read_triggers;

/// Exit code recorded for a process stopped because its `Cmd` was disabled.
pub const DISABLED_EXIT_CODE: i32 = -1;

pub const REASON_COMPLETED: &str = "Completed";
pub const REASON_ERROR: &str = "Error";
pub const REASON_DISABLED: &str = "Disabled";
pub const REASON_SPAWN_FAILED: &str = "SpawnFailed";
pub const REASON_INVALID_PROBE: &str = "InvalidReadinessProbe";

/// Everything the controller knows about the current instance of one `Cmd`.
struct ProcRecord {
    /// `None` when the instance never got a process (spawn failure or an
    /// invalid probe).
    handle: Option<ProcessHandle>,
    /// Spec the instance was started with, before input env was added.
    exec: ExecSpec,
    logger: SpanLogger,
    started_at: Timestamp,
    ready: Arc<AtomicBool>,
    /// Set once the exit has been observed and logged.
    finished: Option<(i32, Timestamp)>,
    failure_reason: Option<&'static str>,
}

impl ProcRecord {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.poll().is_running())
    }

    fn state(&self) -> CmdState {
        let pid = self.handle.as_ref().and_then(ProcessHandle::pid);
        if let Some((code, finished_at)) = self.finished {
            let reason = match self.failure_reason {
                Some(r) => r,
                None if code == 0 => REASON_COMPLETED,
                None => REASON_ERROR,
            };
            return CmdState::Terminated {
                pid,
                exit_code: code,
                reason: reason.to_string(),
                started_at: Some(self.started_at),
                finished_at,
            };
        }
        CmdState::Running {
            pid,
            started_at: self.started_at,
            ready: self.ready.load(Ordering::SeqCst),
        }
    }
}

pub struct CmdController {
    store: Store,
    execer: Arc<dyn Execer>,
    prober: Arc<dyn ProbeRunner>,
    logs: SharedLogSink,
    clock: SharedClock,
    events: mpsc::UnboundedSender<ProcessEvent>,
    index: Mutex<TriggerIndex>,
    procs: Mutex<HashMap<Name, ProcRecord>>,
    /// Processes asked to stop whose `Cmd` no longer owns them.
    draining: Mutex<HashMap<Name, ProcessHandle>>,
    next_instance: AtomicU64,
}

impl std::fmt::Debug for CmdController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdController")
            .field("procs", &self.procs.lock().len())
            .finish_non_exhaustive()
    }
}

impl CmdController {
    pub fn new(
        store: Store,
        execer: Arc<dyn Execer>,
        prober: Arc<dyn ProbeRunner>,
        logs: SharedLogSink,
        clock: SharedClock,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) -> Self {
        Self {
            store,
            execer,
            prober,
            logs,
            clock,
            events,
            index: Mutex::new(TriggerIndex::new()),
            procs: Mutex::new(HashMap::new()),
            draining: Mutex::new(HashMap::new()),
            next_instance: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Commands that must be reconciled when `source` changes.
    pub fn affected_commands(&self, source: &TriggerSource) -> Vec<Name> {
        self.index.lock().affected(source)
    }

    /// Whether the controller currently owns an instance for `name`.
    pub fn has_instance(&self, name: &str) -> bool {
        self.procs.lock().contains_key(name)
    }

    /// Number of owned instances whose process is still running.
    pub fn running_count(&self) -> usize {
        self.procs.lock().values().filter(|r| r.is_running()).count()
    }

    /// Bring one `Cmd` in line with its spec.
    pub async fn reconcile(&self, name: &str) -> Result<()> {
        let Some(cmd) = self.store.cmd(name) else {
            // Deleted out from under us.
            if let Some(record) = self.take_record(name) {
                self.dispose(name, record, false).await;
            }
            self.index.lock().remove(name);
            return Ok(());
        };

        self.index.lock().update(&cmd);

        if cmd.deleting {
            if let Some(record) = self.take_record(name) {
                self.dispose(name, record, false).await;
            }
            self.index.lock().remove(name);
            self.store.dispatch(Action::RemoveCmd(name.to_string()));
            debug!(cmd = %name, "cmd finalized after deletion");
            return Ok(());
        }

        let (disable, triggers, build_in_progress) = self.store.read(|st| {
            let disable = disable::resolve(cmd.spec.disable_source.as_ref(), st);
            let triggers = read_triggers(&cmd, st);
            let build = cmd
                .owner
                .as_ref()
                .is_some_and(|o| st.build_in_progress(&o.manifest));
            (disable, triggers, build)
        });

        let mut record = self.take_record(name);
        if let Some(rec) = record.as_mut() {
            self.observe_exit(rec);
        }

        let decision = decide(&DecideInput {
            cmd: &cmd,
            disable: &disable,
            triggers: &triggers,
            instance: record.as_ref().map(|r| &r.exec),
            build_in_progress,
        });
        debug!(cmd = %name, ?decision, "reconcile decision");

        let mut status = cmd.status.clone();
        status.disable_status = Some(disable);

        match decision {
            Decision::Disable => {
                status.state = match record {
                    Some(rec) => {
                        let pid = rec.handle.as_ref().and_then(ProcessHandle::pid);
                        let started_at = rec.started_at;
                        let (code, finished_at) = self.dispose(name, rec, false).await;
                        CmdState::Terminated {
                            pid,
                            exit_code: code,
                            reason: REASON_DISABLED.to_string(),
                            started_at: Some(started_at),
                            finished_at,
                        }
                    }
                    None if cmd.status.is_terminated() => cmd.status.state.clone(),
                    None => CmdState::Waiting {
                        reason: DISABLED_REASON.to_string(),
                    },
                };
            }
            Decision::Keep {
                watermark,
                deferred,
            } => {
                watermark.apply(&mut status.watermark);
                if let Some(source) = deferred {
                    info!(cmd = %name, %source, "restart held back while build is in progress");
                }
                match record {
                    Some(rec) => {
                        status.state = rec.state();
                        self.put_record(name, rec);
                    }
                    None => warn!(cmd = %name, "keep decision without an instance"),
                }
            }
            Decision::Wait { reason, supersede } => {
                if supersede {
                    if let Some(rec) = record {
                        self.dispose(name, rec, true).await;
                    }
                }
                status.state = CmdState::Waiting { reason };
            }
            Decision::Start {
                supersede,
                cause,
                watermark,
            } => {
                if supersede {
                    if let Some(rec) = record {
                        self.dispose(name, rec, true).await;
                    }
                }
                watermark.apply(&mut status.watermark);
                self.await_drained(name).await;
                let rec = self.start(&cmd, cause.as_ref());
                status.state = rec.state();
                self.put_record(name, rec);
            }
        }

        if status != cmd.status {
            self.store.dispatch(Action::UpdateCmdStatus {
                name: name.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Stop every owned process and wait for all of them.
    pub async fn tear_down(&self) {
        let mut handles: Vec<(Name, ProcessHandle)> = self
            .procs
            .lock()
            .drain()
            .filter_map(|(name, rec)| rec.handle.map(|h| (name, h)))
            .collect();
        handles.extend(self.draining.lock().drain());
        info!(count = handles.len(), "tearing down cmd processes");

        for (_, handle) in &handles {
            handle.stop();
        }
        for (name, mut handle) in handles {
            let state = handle.terminate().await;
            debug!(cmd = %name, ?state, "process stopped during tear down");
        }
    }

    /// Wait for a process of `name` that is still shutting down.
    async fn await_drained(&self, name: &str) {
        let Some(mut handle) = self.draining.lock().remove(name) else {
            return;
        };
        if handle.poll().is_running() {
            debug!(cmd = %name, "waiting for previous process to stop");
        }
        handle.terminate().await;
    }

    fn park(&self, name: &str, handle: ProcessHandle) {
        let mut draining = self.draining.lock();
        draining.retain(|_, h| h.poll().is_running());
        draining.insert(name.to_string(), handle);
    }

    fn take_record(&self, name: &str) -> Option<ProcRecord> {
        self.procs.lock().remove(name)
    }

    fn put_record(&self, name: &str, rec: ProcRecord) {
        self.procs.lock().insert(name.to_string(), rec);
    }

    /// Record and log a natural exit the first time it is seen.
    fn observe_exit(&self, rec: &mut ProcRecord) {
        if rec.finished.is_some() {
            return;
        }
        let Some(handle) = &rec.handle else {
            return;
        };
        if let ProcessState::Exited { code } = handle.poll() {
            rec.logger.info(format!(
                "cmd {} exited with code {code}",
                rec.exec.display()
            ));
            rec.finished = Some((code, self.clock.now()));
        }
    }

    /// Stop the instance. With `wait`, block until the process is gone,
    /// otherwise park it in `draining`.
    ///
    /// Returns the exit code and finish time to record.
    async fn dispose(&self, name: &str, mut rec: ProcRecord, wait: bool) -> (i32, Timestamp) {
        if let Some(done) = rec.finished {
            if let Some(handle) = &rec.handle {
                handle.stop();
            }
            return done;
        }
        let Some(handle) = rec.handle.as_mut() else {
            return (SPAWN_FAILURE_EXIT_CODE, self.clock.now());
        };

        match handle.poll() {
            ProcessState::Running => {
                rec.logger.info(format!("cmd {} canceled", rec.exec.display()));
                if wait {
                    let state = handle.terminate().await;
                    (
                        state.exit_code().unwrap_or(DISABLED_EXIT_CODE),
                        self.clock.now(),
                    )
                } else {
                    handle.stop();
                    if let Some(handle) = rec.handle.take() {
                        self.park(name, handle);
                    }
                    (DISABLED_EXIT_CODE, self.clock.now())
                }
            }
            state => (
                state.exit_code().unwrap_or(DISABLED_EXIT_CODE),
                self.clock.now(),
            ),
        }
    }

    fn start(&self, cmd: &Cmd, cause: Option<&TriggerSource>) -> ProcRecord {
        let exec = cmd.spec.exec.clone();
        let instance = self.next_instance.fetch_add(1, Ordering::SeqCst);
        let logger = SpanLogger::new(
            self.logs.clone(),
            cmd.name.clone(),
            SpanId::for_cmd(&cmd.name),
        );
        let started_at = self.clock.now();
        let ready = Arc::new(AtomicBool::new(exec.readiness_probe.is_none()));

        let failed = |reason: &'static str| ProcRecord {
            handle: None,
            exec: exec.clone(),
            logger: logger.clone(),
            started_at,
            ready: ready.clone(),
            finished: Some((SPAWN_FAILURE_EXIT_CODE, started_at)),
            failure_reason: Some(reason),
        };

        let probe = match exec.readiness_probe.as_ref().map(probe::validate) {
            None => None,
            Some(Ok(p)) => Some(p),
            Some(Err(e)) => {
                logger.error(format!("Invalid readiness probe: {e}"));
                warn!(cmd = %cmd.name, error = %e, "invalid readiness probe");
                return failed(REASON_INVALID_PROBE);
            }
        };

        let mut env = exec.env.clone();
        if let Some(TriggerSource::UiButton(button)) = cause {
            let extra = self
                .store
                .read(|st| st.buttons.get(button).map(button_env))
                .unwrap_or_default();
            env.extend(extra);
        }

        logger.info(format!("Starting cmd {}", exec.display()));
        info!(cmd = %cmd.name, instance, span = %logger.span(), "starting cmd");

        let handle = match self.execer.start(StartRequest {
            cmd: cmd.name.clone(),
            instance,
            args: exec.args.clone(),
            dir: exec.dir.clone(),
            env,
            logger: logger.clone(),
        }) {
            Ok(h) => h,
            Err(e) => {
                logger.error(format!("failed to start cmd {}: {e}", exec.display()));
                warn!(cmd = %cmd.name, error = %e, "spawn failed");
                return failed(REASON_SPAWN_FAILED);
            }
        };

        if let Some(probe) = probe {
            let ready_flag = ready.clone();
            let events = self.events.clone();
            let cmd_name = cmd.name.clone();
            probe::spawn_probe_worker(
                probe,
                self.prober.clone(),
                logger.clone(),
                handle.lifetime(),
                move || {
                    ready_flag.store(true, Ordering::SeqCst);
                    let _ = events.send(ProcessEvent {
                        cmd: cmd_name,
                        instance,
                        kind: ProcessEventKind::Ready,
                    });
                },
            );
        }

        ProcRecord {
            handle: Some(handle),
            exec,
            logger,
            started_at,
            ready,
            finished: None,
            failure_reason: None,
        }
    }
}
