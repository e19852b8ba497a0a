// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ProcessEvent;
use crate::model::TriggerSource;
use crate::reconciler::CmdController;
use crate::serve::ServeController;
use crate::store::{ObjectRef, Store};

use super::queue::WorkQueue;

/// Routes store changes and process events into the work queue and runs the
/// reconcile workers.
///
/// Pure IO shell: all `Cmd` semantics live in [`CmdController`], all serve
/// semantics in [`ServeController`].
pub struct Runtime {
    store: Store,
    cmds: Arc<CmdController>,
    serve: ServeController,
    queue: Arc<WorkQueue>,
    workers: usize,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("workers", &self.workers)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        store: Store,
        cmds: Arc<CmdController>,
        serve: ServeController,
        workers: usize,
    ) -> Self {
        Self {
            store,
            cmds,
            serve,
            queue: Arc::new(WorkQueue::new()),
            workers: workers.max(1),
        }
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// Enqueue whatever `change` affects.
    pub fn route(&self, change: &ObjectRef) {
        match change {
            ObjectRef::Cmd(name) => self.queue.add(name),
            ObjectRef::Manifest(name) => self.serve.reconcile(name),
            ObjectRef::Source(source) => {
                for name in self.cmds.affected_commands(source) {
                    self.queue.add(&name);
                }
                if let TriggerSource::ConfigMap(cm) = source {
                    for manifest in self.serve.manifests_using_config_map(cm) {
                        self.serve.reconcile(&manifest);
                    }
                }
            }
        }
    }

    /// Main loop.
    ///
    /// - Reconciles every manifest and enqueues every `Cmd` once.
    /// - Routes `changes` from the store and `events` from processes.
    /// - On `shutdown`: stops the workers and tears down all processes.
    pub async fn run(
        self,
        mut changes: mpsc::UnboundedReceiver<ObjectRef>,
        mut events: mpsc::UnboundedReceiver<ProcessEvent>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(workers = self.workers, "cmdctl runtime started");

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let queue = self.queue.clone();
            let cmds = self.cmds.clone();
            workers.spawn(async move {
                while let Some(name) = queue.get().await {
                    if let Err(err) = cmds.reconcile(&name).await {
                        warn!(worker = id, cmd = %name, error = %err, "reconcile failed");
                    }
                    queue.done(&name);
                }
                debug!(worker = id, "worker exiting");
            });
        }

        self.serve.reconcile_all();
        for name in self.store.read(|st| st.cmds.keys().cloned().collect::<Vec<_>>()) {
            self.queue.add(&name);
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                change = changes.recv() => match change {
                    Some(change) => {
                        debug!(?change, "store change");
                        self.route(&change);
                    }
                    None => {
                        info!("store change channel closed; exiting");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Some(event) => {
                        debug!(cmd = %event.cmd, instance = event.instance, kind = ?event.kind, "process event");
                        self.queue.add(&event.cmd);
                    }
                    None => {
                        info!("process event channel closed; exiting");
                        break;
                    }
                },
            }
        }

        self.queue.shutdown();
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "reconcile worker panicked");
            }
        }
        self.cmds.tear_down().await;

        info!("runtime exiting");
        Ok(())
    }
}
