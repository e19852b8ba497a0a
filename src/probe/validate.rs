// src/probe/validate.rs

//! Turns a declared [`ProbeSpec`] into something a runner can execute.

use std::time::Duration;

use thiserror::Error;

use crate::model::{ProbeHandler, ProbeSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("port number out of range: {0}")]
    PortOutOfRange(i64),

    #[error("exec probe command is empty")]
    EmptyCommand,

    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    #[error("unsupported scheme: {0:?}")]
    UnsupportedScheme(String),
}

/// A probe attempt, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeAction {
    Exec { command: Vec<String> },
    HttpGet { url: String },
    TcpSocket { addr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProbe {
    pub action: ProbeAction,
    pub initial_delay: Duration,
    pub timeout: Duration,
    pub period: Duration,
}

pub fn validate(spec: &ProbeSpec) -> Result<ValidProbe, ProbeError> {
    let action = match &spec.handler {
        ProbeHandler::Exec { command } => {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(ProbeError::EmptyCommand);
            }
            ProbeAction::Exec {
                command: command.clone(),
            }
        }
        ProbeHandler::HttpGet {
            scheme,
            host,
            port,
            path,
        } => {
            let port = check_port(*port)?;
            let host = check_host(host)?;
            let scheme = match scheme.to_ascii_lowercase().as_str() {
                "" | "http" => "http",
                "https" => "https",
                _ => return Err(ProbeError::UnsupportedScheme(scheme.clone())),
            };
            let path = if path.starts_with('/') {
                path.clone()
            } else {
                format!("/{path}")
            };
            ProbeAction::HttpGet {
                url: format!("{scheme}://{host}:{port}{path}"),
            }
        }
        ProbeHandler::TcpSocket { host, port } => {
            let port = check_port(*port)?;
            let host = check_host(host)?;
            ProbeAction::TcpSocket {
                addr: format!("{host}:{port}"),
            }
        }
    };

    Ok(ValidProbe {
        action,
        initial_delay: spec.initial_delay,
        timeout: spec.timeout,
        period: spec.period,
    })
}

fn check_port(port: i64) -> Result<u16, ProbeError> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ProbeError::PortOutOfRange(port)),
    }
}

/// Empty hosts mean localhost.
fn check_host(host: &str) -> Result<&str, ProbeError> {
    if host.is_empty() {
        return Ok("localhost");
    }
    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ProbeError::InvalidHost(host.to_string()));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_port_out_of_range_is_rejected() {
        let err = validate(&ProbeSpec::http_get(70000, "/")).unwrap_err();
        assert_eq!(err, ProbeError::PortOutOfRange(70000));
        assert_eq!(err.to_string(), "port number out of range: 70000");

        assert_eq!(
            validate(&ProbeSpec::tcp_socket(0)).unwrap_err(),
            ProbeError::PortOutOfRange(0)
        );
    }

    #[test]
    fn http_url_is_assembled() {
        let probe = validate(&ProbeSpec::http_get(8080, "healthz")).unwrap();
        assert_eq!(
            probe.action,
            ProbeAction::HttpGet {
                url: "http://localhost:8080/healthz".into()
            }
        );
    }

    #[test]
    fn empty_exec_command_is_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(
            validate(&ProbeSpec::exec(empty)).unwrap_err(),
            ProbeError::EmptyCommand
        );
    }

    #[test]
    fn tcp_host_defaults_to_localhost() {
        let mut spec = ProbeSpec::tcp_socket(6379);
        spec.handler = ProbeHandler::TcpSocket {
            host: String::new(),
            port: 6379,
        };
        assert_eq!(
            validate(&spec).unwrap().action,
            ProbeAction::TcpSocket {
                addr: "localhost:6379".into()
            }
        );
    }
}
