// src/logs/tracing_sink.rs

use tracing::{Level, error, info, warn};

use super::{LogEntry, LogSink};

/// Forwards entries to the global `tracing` subscriber under the
/// `cmdctl::cmd` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn emit(&self, entry: LogEntry) {
        let LogEntry {
            owner,
            span,
            level,
            message,
            ..
        } = entry;

        if level == Level::ERROR {
            error!(target: "cmdctl::cmd", cmd = %owner, span = %span, "{}", message);
        } else if level == Level::WARN {
            warn!(target: "cmdctl::cmd", cmd = %owner, span = %span, "{}", message);
        } else {
            info!(target: "cmdctl::cmd", cmd = %owner, span = %span, "{}", message);
        }
    }
}
