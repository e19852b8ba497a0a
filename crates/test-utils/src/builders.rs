#![allow(dead_code)]

use std::path::PathBuf;

use cmdctl::model::{
    Cmd, CmdOwner, CmdSpec, DisableSource, ExecSpec, ProbeSpec, RestartOnSpec, StartOnSpec,
    Timestamp, UiButton, UiInputKind, UiInputSpec,
};

use crate::clock::FakeClock;

/// Builder for `Cmd` to simplify test setup.
pub struct CmdBuilder {
    cmd: Cmd,
}

impl CmdBuilder {
    pub fn new(name: &str, args: &[&str]) -> Self {
        let spec = CmdSpec::new(ExecSpec::new(args.iter().copied()));
        Self {
            cmd: Cmd::new(name, spec, FakeClock::start()),
        }
    }

    /// `sh -c <script>`.
    pub fn shell(name: &str, script: &str) -> Self {
        Self {
            cmd: Cmd::new(name, CmdSpec::new(ExecSpec::shell(script)), FakeClock::start()),
        }
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cmd.spec.exec.dir = dir.into();
        self
    }

    pub fn env(mut self, pair: &str) -> Self {
        self.cmd.spec.exec.env.push(pair.to_string());
        self
    }

    pub fn restart_on_file_watch(mut self, name: &str) -> Self {
        self.restart_on()
            .file_watches
            .push(name.to_string());
        self
    }

    pub fn restart_on_button(mut self, name: &str) -> Self {
        self.restart_on().buttons.push(name.to_string());
        self
    }

    pub fn start_on_button(mut self, name: &str) -> Self {
        self.cmd
            .spec
            .start_on
            .get_or_insert_with(StartOnSpec::default)
            .buttons
            .push(name.to_string());
        self
    }

    pub fn start_after(mut self, at: Timestamp) -> Self {
        self.cmd
            .spec
            .start_on
            .get_or_insert_with(StartOnSpec::default)
            .start_after = Some(at);
        self
    }

    pub fn disable_source(mut self, config_map: &str, key: &str) -> Self {
        self.cmd.spec.disable_source = Some(DisableSource {
            config_map: config_map.to_string(),
            key: key.to_string(),
        });
        self
    }

    pub fn readiness_probe(mut self, probe: ProbeSpec) -> Self {
        self.cmd.spec.exec.readiness_probe = Some(probe);
        self
    }

    pub fn owner(mut self, manifest: &str, generation: u64) -> Self {
        self.cmd.owner = Some(CmdOwner {
            manifest: manifest.to_string(),
            generation,
            deployed_at: None,
        });
        self
    }

    pub fn build(self) -> Cmd {
        self.cmd
    }

    fn restart_on(&mut self) -> &mut RestartOnSpec {
        self.cmd
            .spec
            .restart_on
            .get_or_insert_with(RestartOnSpec::default)
    }
}

pub fn button(name: &str, inputs: Vec<UiInputSpec>) -> UiButton {
    UiButton {
        inputs,
        ..UiButton::new(name)
    }
}

pub fn text_input(name: &str, default: Option<&str>) -> UiInputSpec {
    UiInputSpec {
        name: name.to_string(),
        kind: UiInputKind::Text {
            default: default.map(str::to_string),
        },
    }
}

pub fn bool_input(
    name: &str,
    default: bool,
    true_string: Option<&str>,
    false_string: Option<&str>,
) -> UiInputSpec {
    UiInputSpec {
        name: name.to_string(),
        kind: UiInputKind::Bool {
            default,
            true_string: true_string.map(str::to_string),
            false_string: false_string.map(str::to_string),
        },
    }
}

pub fn hidden_input(name: &str, value: &str) -> UiInputSpec {
    UiInputSpec {
        name: name.to_string(),
        kind: UiInputKind::Hidden {
            value: value.to_string(),
        },
    }
}

pub fn choice_input(name: &str, choices: &[&str]) -> UiInputSpec {
    UiInputSpec {
        name: name.to_string(),
        kind: UiInputKind::Choice {
            choices: choices.iter().map(|c| c.to_string()).collect(),
        },
    }
}
