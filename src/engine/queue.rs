// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::model::Name;

/// Deduplicating work queue with per-key exclusivity.
///
/// Semantics:
/// - A key that is already pending is not added twice.
/// - A key handed to a worker is "in flight" until [`WorkQueue::done`]. Adding
///   it again meanwhile marks it dirty instead of queueing it, and `done`
///   re-queues it, so two workers never hold the same key.
/// - After [`WorkQueue::shutdown`], `get` drains nothing and returns `None`.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Name>,
    queued: HashSet<Name>,
    in_flight: HashSet<Name>,
    dirty: HashSet<Name>,
    shutdown: bool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str) {
        let mut st = self.state.lock();
        if st.shutdown {
            return;
        }
        if st.in_flight.contains(name) {
            trace!(key = %name, "key in flight; marking dirty");
            st.dirty.insert(name.to_string());
            return;
        }
        if st.queued.insert(name.to_string()) {
            st.pending.push_back(name.to_string());
            drop(st);
            self.notify.notify_one();
        }
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<Name> {
        loop {
            let notified = self.notify.notified();
            {
                let mut st = self.state.lock();
                if st.shutdown {
                    return None;
                }
                if let Some(name) = st.pending.pop_front() {
                    st.queued.remove(&name);
                    st.in_flight.insert(name.clone());
                    let more = !st.pending.is_empty();
                    drop(st);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(name);
                }
            }
            notified.await;
        }
    }

    /// Mark `name` finished; re-queue it if it was added while in flight.
    pub fn done(&self, name: &str) {
        let mut st = self.state.lock();
        st.in_flight.remove(name);
        if st.dirty.remove(name) && !st.shutdown && st.queued.insert(name.to_string()) {
            st.pending.push_back(name.to_string());
            drop(st);
            self.notify.notify_one();
        }
    }

    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nothing pending and nothing in flight.
    pub fn is_idle(&self) -> bool {
        let st = self.state.lock();
        st.pending.is_empty() && st.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_keys_are_deduplicated() {
        let q = WorkQueue::new();
        q.add("a");
        q.add("b");
        q.add("a");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert_eq!(q.get().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn in_flight_key_is_requeued_on_done() {
        let q = WorkQueue::new();
        q.add("a");
        let a = q.get().await.unwrap();

        q.add("a");
        assert!(q.is_empty(), "in-flight key must not be handed out twice");

        q.done(&a);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get().await.as_deref(), Some("a"));
        q.done("a");
        assert!(q.is_idle());
    }

    #[tokio::test]
    async fn shutdown_wakes_waiters() {
        let q = std::sync::Arc::new(WorkQueue::new());
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::task::yield_now().await;
        q.shutdown();
        assert_eq!(waiter.await.unwrap(), None);
    }
}
