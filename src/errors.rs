// src/errors.rs

//! Errors surfaced at the crate's edges: config loading and the control
//! channel. Process and probe failures never escape the reconciler; they are
//! recorded on `Cmd` status instead (see `exec::ExecError`,
//! `probe::ProbeError`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmdctlError {
    /// The config parsed but describes something that cannot run.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A control command named a button, file watch, resource or cmd that
    /// is not in the store.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Invalid control command: {0}")]
    InvalidControlCommand(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CmdctlError>;
