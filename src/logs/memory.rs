// src/logs/memory.rs

use std::collections::BTreeSet;

use parking_lot::Mutex;

use super::{LogEntry, LogSink, SpanId};

/// Keeps every entry in memory so callers can assert on what a command
/// printed.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// All messages concatenated, one per line.
    pub fn text(&self) -> String {
        let entries = self.entries.lock();
        let mut out = String::new();
        for e in entries.iter() {
            out.push_str(&e.message);
            out.push('\n');
        }
        out
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }

    /// Distinct spans seen for one owner.
    pub fn spans_for(&self, owner: &str) -> BTreeSet<SpanId> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.owner == owner)
            .map(|e| e.span.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn emit(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}
