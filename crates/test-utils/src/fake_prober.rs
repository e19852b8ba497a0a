use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use cmdctl::probe::{ProbeAction, ProbeOutcome, ProbeRunner};
use parking_lot::Mutex;

/// A [`ProbeRunner`] that plays back scripted outcomes, then repeats a
/// default one.
pub struct FakeProbeRunner {
    script: Mutex<VecDeque<ProbeOutcome>>,
    default: Mutex<ProbeOutcome>,
    attempts: AtomicUsize,
    actions: Mutex<Vec<ProbeAction>>,
}

impl FakeProbeRunner {
    /// Succeeds on every attempt.
    pub fn new() -> Self {
        Self::with_default(ProbeOutcome::Success("fake probe ok".to_string()))
    }

    pub fn with_default(default: ProbeOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            attempts: AtomicUsize::new(0),
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: ProbeOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn set_default(&self, outcome: ProbeOutcome) {
        *self.default.lock() = outcome;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<ProbeAction> {
        self.actions.lock().clone()
    }
}

impl Default for FakeProbeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeRunner for FakeProbeRunner {
    fn run<'a>(
        &'a self,
        action: &'a ProbeAction,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.actions.lock().push(action.clone());
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| self.default.lock().clone())
        })
    }
}
