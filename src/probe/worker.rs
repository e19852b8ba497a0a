// src/probe/worker.rs

//! Background task that probes one process instance until it is ready.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::logs::SpanLogger;

use super::runner::{ProbeOutcome, ProbeRunner};
use super::validate::ValidProbe;

/// Probe until the first success, then call `on_ready` once and stop.
///
/// Stops silently when `stop` is cancelled, which happens when the process
/// exits or the instance is disposed.
pub fn spawn_probe_worker<F>(
    probe: ValidProbe,
    runner: Arc<dyn ProbeRunner>,
    logger: SpanLogger,
    stop: CancellationToken,
    on_ready: F,
) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        if !probe.initial_delay.is_zero() {
            tokio::select! {
                _ = stop.cancelled() => return,
                _ = sleep(probe.initial_delay) => {}
            }
        }

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                _ = stop.cancelled() => return,
                res = timeout(probe.timeout, runner.run(&probe.action)) => match res {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::Failure(format!("timed out after {:?}", probe.timeout)),
                },
            };

            match outcome {
                ProbeOutcome::Success(output) => {
                    logger.info(format!("[readiness probe: success] {output}"));
                    debug!(cmd = %logger.owner(), attempt, "readiness probe succeeded");
                    on_ready();
                    return;
                }
                ProbeOutcome::Failure(output) => {
                    logger.warn(format!("[readiness probe: failure] {output}"));
                }
            }

            tokio::select! {
                _ = stop.cancelled() => return,
                _ = sleep(probe.period) => {}
            }
        }
    })
}
