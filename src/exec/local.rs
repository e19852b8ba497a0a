// src/exec/local.rs

//! Real process supervisor built on `tokio::process`.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::logs::SpanLogger;

use super::execer::{ExecError, Execer, ProcessHandle, ProcessState, StartRequest};
use super::signal::{SIGNALED_EXIT_CODE, stop_child};
use super::{ProcessEvent, ProcessEventKind};

/// How long to wait for output readers to drain after the process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct LocalExecer {
    events: mpsc::UnboundedSender<ProcessEvent>,
    grace_period: Duration,
}

impl LocalExecer {
    pub fn new(events: mpsc::UnboundedSender<ProcessEvent>, grace_period: Duration) -> Self {
        Self {
            events,
            grace_period,
        }
    }
}

impl Execer for LocalExecer {
    fn start(&self, req: StartRequest) -> Result<ProcessHandle, ExecError> {
        let Some((program, args)) = req.args.split_first() else {
            return Err(ExecError::EmptyArgs);
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&req.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for pair in &req.env {
            match pair.split_once('=') {
                Some((k, v)) => {
                    cmd.env(k, v);
                }
                None => warn!(cmd = %req.cmd, entry = %pair, "ignoring env entry without '='"),
            }
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();

        info!(
            cmd = %req.cmd,
            instance = req.instance,
            pid = ?pid,
            "process started"
        );

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, req.logger.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, req.logger.clone(), true));
        }

        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let lifetime = CancellationToken::new();

        let task = tokio::spawn(supervise(
            child,
            req.cmd.clone(),
            req.instance,
            readers,
            state_tx,
            lifetime.clone(),
            self.grace_period,
            self.events.clone(),
        ));

        Ok(ProcessHandle::new(
            req.instance,
            pid,
            state_rx,
            lifetime,
            Some(task),
        ))
    }
}

fn spawn_reader<R>(stream: R, logger: SpanLogger, is_stderr: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if is_stderr => logger.warn(line),
                Ok(Some(line)) => logger.info(line),
                Ok(None) => break,
                Err(e) => {
                    debug!(cmd = %logger.owner(), error = %e, "output stream closed");
                    break;
                }
            }
        }
    })
}

/// Wait for the process to exit or for a stop request, whichever is first.
///
/// Only a natural exit is reported on `events`.
#[allow(clippy::too_many_arguments)]
async fn supervise(
    mut child: Child,
    cmd: String,
    instance: u64,
    readers: Vec<JoinHandle<()>>,
    state_tx: watch::Sender<ProcessState>,
    lifetime: CancellationToken,
    grace: Duration,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code().unwrap_or(SIGNALED_EXIT_CODE),
                Err(e) => {
                    warn!(cmd = %cmd, instance, error = %e, "waiting for process failed");
                    SIGNALED_EXIT_CODE
                }
            };
            drain(readers).await;

            debug!(cmd = %cmd, instance, exit_code = code, "process exited");
            state_tx.send_replace(ProcessState::Exited { code });
            let _ = events.send(ProcessEvent {
                cmd: cmd.clone(),
                instance,
                kind: ProcessEventKind::Exited { code },
            });
        }

        _ = lifetime.cancelled() => {
            debug!(cmd = %cmd, instance, "stop requested; terminating process");
            let code = stop_child(&mut child, grace).await;
            drain(readers).await;
            state_tx.send_replace(ProcessState::Stopped { code });
        }
    }

    lifetime.cancel();
}

async fn drain(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        if timeout(OUTPUT_DRAIN_TIMEOUT, reader).await.is_err() {
            debug!("output reader still busy after exit; detaching");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logs::{MemoryLogSink, SpanId};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn request(
        sink: &Arc<MemoryLogSink>,
        args: &[&str],
        env: Vec<String>,
    ) -> StartRequest {
        StartRequest {
            cmd: "test".into(),
            instance: 1,
            args: args.iter().map(|s| s.to_string()).collect(),
            dir: PathBuf::from("."),
            env,
            logger: SpanLogger::new(sink.clone(), "test", SpanId::for_cmd("test")),
        }
    }

    #[tokio::test]
    async fn natural_exit_is_reported_with_output() {
        let sink = Arc::new(MemoryLogSink::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let execer = LocalExecer::new(tx, Duration::from_secs(1));

        let handle = execer
            .start(request(
                &sink,
                &["sh", "-c", "echo $GREETING; exit 5"],
                vec!["GREETING=hello".into()],
            ))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ProcessEventKind::Exited { code: 5 });
        assert_eq!(handle.poll(), ProcessState::Exited { code: 5 });
        assert!(sink.contains("hello"));
    }

    #[tokio::test]
    async fn stop_terminates_without_event() {
        let sink = Arc::new(MemoryLogSink::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let execer = LocalExecer::new(tx, Duration::from_secs(1));

        let mut handle = execer
            .start(request(&sink, &["sleep", "60"], Vec::new()))
            .unwrap();
        assert!(handle.poll().is_running());

        let state = handle.terminate().await;
        assert!(matches!(state, ProcessState::Stopped { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let sink = Arc::new(MemoryLogSink::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let execer = LocalExecer::new(tx, Duration::from_secs(1));

        let err = execer
            .start(request(&sink, &["definitely-not-a-real-binary-xyz"], Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
