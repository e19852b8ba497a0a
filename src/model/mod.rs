// src/model/mod.rs

//! Declarative resource model.
//!
//! Every resource the controller deals with lives here, split the usual way
//! into a desired `spec` and an observed `status`:
//!
//! - [`cmd`]: the `Cmd` resource the reconciler turns into a process.
//! - [`probe`]: readiness probe declarations attached to a `Cmd`.
//! - [`source`]: trigger sources a `Cmd` can depend on (file watches,
//!   buttons, config maps) and their identities.
//! - [`manifest`]: serve resources that own generation-numbered `Cmd`s.

pub mod cmd;
pub mod manifest;
pub mod probe;
pub mod source;

use chrono::{DateTime, Utc};

/// Wall-clock instant used for every trigger and lifecycle timestamp.
pub type Timestamp = DateTime<Utc>;

/// Canonical resource name type.
pub type Name = String;

pub use cmd::{
    Cmd, CmdOwner, CmdSpec, CmdState, CmdStatus, DisableSource, DisableState, DisableStatus,
    ExecSpec, RestartOnSpec, StartOnSpec, TriggerWatermark,
};
pub use manifest::{Manifest, ServeTarget};
pub use probe::{ProbeHandler, ProbeSpec};
pub use source::{
    ConfigMap, FileWatch, TriggerSource, UiButton, UiInputKind, UiInputSpec, UiInputStatus,
    UiInputValue,
};
