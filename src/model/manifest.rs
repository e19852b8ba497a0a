// src/model/manifest.rs

//! Serve resources: long-running commands that are redeployed after every
//! build and materialised as generation-numbered `Cmd`s.

use crate::model::cmd::{DisableSource, ExecSpec};
use crate::model::{Name, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeTarget {
    pub exec: ExecSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub name: Name,
    pub serve: Option<ServeTarget>,
    pub disable_source: Option<DisableSource>,
    pub build_in_progress: bool,
    /// Completion time of the latest deploy. Every new value asks for a new
    /// serve generation.
    pub last_deploy_at: Option<Timestamp>,
}

impl Manifest {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_serve(mut self, exec: ExecSpec) -> Self {
        self.serve = Some(ServeTarget { exec });
        self
    }

    /// Name of the `n`th serve generation.
    pub fn serve_cmd_name(&self, generation: u64) -> Name {
        format!("{}-serve-{}", self.name, generation)
    }
}
