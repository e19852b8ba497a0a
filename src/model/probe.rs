// src/model/probe.rs

//! Readiness probe declarations. Validation lives in `crate::probe`.

use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default interval between attempts.
pub const DEFAULT_PROBE_PERIOD: Duration = Duration::from_secs(10);

/// What a probe attempt does.
///
/// Ports are kept as `i64` so that out-of-range values survive until
/// validation and can be reported back on the `Cmd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeHandler {
    Exec {
        command: Vec<String>,
    },
    HttpGet {
        scheme: String,
        host: String,
        port: i64,
        path: String,
    },
    TcpSocket {
        host: String,
        port: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub handler: ProbeHandler,
    pub initial_delay: Duration,
    pub timeout: Duration,
    pub period: Duration,
}

impl ProbeSpec {
    pub fn new(handler: ProbeHandler) -> Self {
        Self {
            handler,
            initial_delay: Duration::ZERO,
            timeout: DEFAULT_PROBE_TIMEOUT,
            period: DEFAULT_PROBE_PERIOD,
        }
    }

    pub fn exec<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ProbeHandler::Exec {
            command: command.into_iter().map(Into::into).collect(),
        })
    }

    pub fn http_get(port: i64, path: impl Into<String>) -> Self {
        Self::new(ProbeHandler::HttpGet {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port,
            path: path.into(),
        })
    }

    pub fn tcp_socket(port: i64) -> Self {
        Self::new(ProbeHandler::TcpSocket {
            host: "localhost".to_string(),
            port,
        })
    }
}
