//! One controller wired to fakes, driven by hand.
//!
//! Nothing reconciles on its own: tests mutate the store, then call
//! [`Harness::reconcile`] for the commands they care about.

use std::sync::Arc;

use cmdctl::clock::Clock;
use cmdctl::exec::ProcessEvent;
use cmdctl::logs::MemoryLogSink;
use cmdctl::model::{Cmd, CmdState, ConfigMap, FileWatch, UiButton, UiInputStatus};
use cmdctl::reconciler::CmdController;
use cmdctl::store::{Action, Store};
use tokio::sync::mpsc;

use crate::clock::FakeClock;
use crate::fake_execer::FakeExecer;
use crate::fake_prober::FakeProbeRunner;

pub struct Harness {
    pub store: Store,
    pub controller: Arc<CmdController>,
    pub execer: Arc<FakeExecer>,
    pub prober: Arc<FakeProbeRunner>,
    pub logs: Arc<MemoryLogSink>,
    pub clock: Arc<FakeClock>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prober(FakeProbeRunner::new())
    }

    pub fn with_prober(prober: FakeProbeRunner) -> Self {
        crate::init_tracing();
        let store = Store::default();
        let (events_tx, events) = mpsc::unbounded_channel();
        let execer = Arc::new(FakeExecer::new(events_tx.clone()));
        let prober = Arc::new(prober);
        let logs = Arc::new(MemoryLogSink::new());
        let clock = FakeClock::new();
        let controller = Arc::new(CmdController::new(
            store.clone(),
            execer.clone(),
            prober.clone(),
            logs.clone(),
            clock.shared(),
            events_tx,
        ));
        Self {
            store,
            controller,
            execer,
            prober,
            logs,
            clock,
            events,
        }
    }

    /// Create or update a cmd. New cmds are created at the current time.
    pub fn upsert(&self, mut cmd: Cmd) {
        cmd.created_at = self.clock.now();
        self.store.dispatch(Action::UpsertCmd(cmd));
    }

    pub fn delete(&self, name: &str) {
        self.store.dispatch(Action::DeleteCmd(name.to_string()));
    }

    pub async fn reconcile(&self, name: &str) {
        self.controller
            .reconcile(name)
            .await
            .expect("reconcile failed");
    }

    /// Upsert and reconcile in one go.
    pub async fn create(&self, cmd: Cmd) {
        let name = cmd.name.clone();
        self.upsert(cmd);
        self.reconcile(&name).await;
    }

    pub fn cmd(&self, name: &str) -> Cmd {
        self.store
            .cmd(name)
            .unwrap_or_else(|| panic!("cmd {name} does not exist"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.store.cmd(name).is_some()
    }

    pub fn state(&self, name: &str) -> CmdState {
        self.cmd(name).status.state
    }

    pub fn add_file_watch(&self, name: &str) {
        self.store
            .dispatch(Action::UpsertFileWatch(FileWatch::new(name)));
    }

    /// Record a file event one tick after the previous one.
    pub fn touch(&self, file_watch: &str) {
        let at = self.clock.tick();
        self.store.dispatch(Action::RecordFileEvent {
            name: file_watch.to_string(),
            at,
        });
    }

    pub fn add_button(&self, button: UiButton) {
        self.store.dispatch(Action::UpsertButton(button));
    }

    /// Click one tick after the previous event.
    pub fn click(&self, button: &str, inputs: Vec<UiInputStatus>) {
        let at = self.clock.tick();
        self.store.dispatch(Action::ClickButton {
            name: button.to_string(),
            at,
            inputs,
        });
    }

    pub fn add_config_map(&self, cm: ConfigMap) {
        self.store.dispatch(Action::UpsertConfigMap(cm));
    }

    pub fn set_config(&self, config_map: &str, key: &str, value: &str) {
        self.store.dispatch(Action::SetConfigMapKey {
            name: config_map.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Next process event, or panic after 5 seconds.
    pub async fn next_event(&mut self) -> ProcessEvent {
        tokio::time::timeout(crate::TEST_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for a process event")
            .expect("process event channel closed")
    }

    /// Drop every event received so far.
    pub fn drain_events(&mut self) -> Vec<ProcessEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
