// src/logs/mod.rs

//! Per-invocation log spans.
//!
//! Every process instance gets its own [`SpanId`]; everything the controller
//! and the process say about that instance is tagged with it, so two runs of
//! the same `Cmd` never share a span.
//!
//! - [`TracingLogSink`] forwards entries to `tracing` (used by the binary).
//! - [`MemoryLogSink`] keeps them in memory for inspection.

pub mod memory;
pub mod tracing_sink;

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::Level;
use uuid::Uuid;

use crate::model::{Name, Timestamp};

pub use memory::MemoryLogSink;
pub use tracing_sink::TracingLogSink;

/// Identifier of a single process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(String);

impl SpanId {
    /// Fresh span for a new invocation of `cmd`.
    pub fn for_cmd(cmd: &str) -> Self {
        Self(format!("cmd:{cmd}:{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub owner: Name,
    pub span: SpanId,
    pub level: Level,
    pub message: String,
    pub at: Timestamp,
}

pub trait LogSink: Send + Sync {
    fn emit(&self, entry: LogEntry);
}

pub type SharedLogSink = Arc<dyn LogSink>;

/// A sink bound to one owner and span.
#[derive(Clone)]
pub struct SpanLogger {
    sink: SharedLogSink,
    owner: Name,
    span: SpanId,
}

impl fmt::Debug for SpanLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanLogger")
            .field("owner", &self.owner)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

impl SpanLogger {
    pub fn new(sink: SharedLogSink, owner: impl Into<Name>, span: SpanId) -> Self {
        Self {
            sink,
            owner: owner.into(),
            span,
        }
    }

    pub fn span(&self) -> &SpanId {
        &self.span
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.sink.emit(LogEntry {
            owner: self.owner.clone(),
            span: self.span.clone(),
            level,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::ERROR, message);
    }
}
