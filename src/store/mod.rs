// src/store/mod.rs

//! Shared, in-memory engine state.
//!
//! Reads take a shared lock for the duration of a closure. Every write goes
//! through [`Store::dispatch`], which runs the reducer under the write lock
//! and then tells subscribers which objects changed. The lock is never held
//! while notifying, and never across an `.await`.

pub mod actions;
pub mod state;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::model::Cmd;

pub use actions::{Action, ObjectRef, reduce};
pub use state::EngineState;

#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    state: RwLock<EngineState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ObjectRef>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(state: EngineState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Run `f` against a consistent view of the state.
    pub fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.inner.state.read())
    }

    pub fn cmd(&self, name: &str) -> Option<Cmd> {
        self.read(|st| st.cmds.get(name).cloned())
    }

    pub fn snapshot(&self) -> EngineState {
        self.read(EngineState::clone)
    }

    /// Apply one action and notify subscribers of the resulting changes.
    pub fn dispatch(&self, action: Action) -> Vec<ObjectRef> {
        let changes = {
            let mut state = self.inner.state.write();
            reduce(&mut state, action)
        };

        if !changes.is_empty() {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|tx| changes.iter().all(|c| tx.send(c.clone()).is_ok()));
        }
        changes
    }

    /// Receive every future change reference.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ObjectRef> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileWatch, TriggerSource};

    #[tokio::test]
    async fn subscribers_see_changes_in_order() {
        let store = Store::default();
        let mut rx = store.subscribe();

        store.dispatch(Action::UpsertFileWatch(FileWatch::new("a")));
        store.dispatch(Action::UpsertFileWatch(FileWatch::new("b")));

        assert_eq!(
            rx.recv().await,
            Some(ObjectRef::Source(TriggerSource::FileWatch("a".into())))
        );
        assert_eq!(
            rx.recv().await,
            Some(ObjectRef::Source(TriggerSource::FileWatch("b".into())))
        );
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let store = Store::default();
        drop(store.subscribe());
        store.dispatch(Action::UpsertFileWatch(FileWatch::new("a")));
        assert!(store.inner.subscribers.lock().is_empty());
    }
}
