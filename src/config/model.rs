// src/config/model.rs

//! TOML-backed configuration model.
//!
//! [`RawConfigFile`] mirrors the file as written. [`ConfigFile`] is the
//! validated form, produced through `TryFrom` in `validate.rs`, holding
//! ready-to-use resource objects.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::model::{Cmd, ConfigMap, FileWatch, Manifest, Timestamp, UiButton};
use crate::store::EngineState;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// workers = 4
/// grace_period = "5s"
///
/// [cmd.web]
/// args = ["python3", "-m", "http.server", "8000"]
/// restart_on = { file_watches = ["web-src"] }
///
/// [file_watch.web-src]
/// paths = ["web/**/*.html"]
/// ```
///
/// All sections are optional; validation requires at least one `cmd` or
/// `resource`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub cmd: BTreeMap<String, RawCmdConfig>,

    #[serde(default)]
    pub file_watch: BTreeMap<String, RawFileWatchConfig>,

    #[serde(default)]
    pub button: BTreeMap<String, RawButtonConfig>,

    /// `[config_map.<name>]` tables are plain string key/value data.
    #[serde(default)]
    pub config_map: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    pub resource: BTreeMap<String, RawResourceConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Number of reconcile workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long a process gets between SIGTERM and SIGKILL.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
}

fn default_workers() -> usize {
    4
}

fn default_grace_period() -> String {
    "5s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grace_period: default_grace_period(),
        }
    }
}

/// `[cmd.<name>]` section. Exactly one of `args` and `script` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCmdConfig {
    #[serde(default)]
    pub args: Option<Vec<String>>,

    /// Shorthand for `args = ["sh", "-c", script]`.
    #[serde(default)]
    pub script: Option<String>,

    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub env: Vec<String>,

    #[serde(default)]
    pub start_on: Option<RawStartOn>,

    #[serde(default)]
    pub restart_on: Option<RawRestartOn>,

    #[serde(default)]
    pub disable_source: Option<RawDisableSource>,

    #[serde(default)]
    pub readiness_probe: Option<RawProbe>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStartOn {
    #[serde(default)]
    pub buttons: Vec<String>,

    /// RFC 3339 timestamp; clicks before it are ignored.
    #[serde(default)]
    pub start_after: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRestartOn {
    #[serde(default)]
    pub buttons: Vec<String>,

    #[serde(default)]
    pub file_watches: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDisableSource {
    pub config_map: String,

    #[serde(default = "default_disable_key")]
    pub key: String,
}

fn default_disable_key() -> String {
    "isDisabled".to_string()
}

/// Readiness probe. Exactly one handler table must be present.
///
/// Ports are read as plain integers; range checks happen when the probe is
/// attached so that a bad port shows up on the command's status.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProbe {
    #[serde(default)]
    pub exec: Option<RawExecProbe>,

    #[serde(default)]
    pub http_get: Option<RawHttpGetProbe>,

    #[serde(default)]
    pub tcp_socket: Option<RawTcpSocketProbe>,

    #[serde(default)]
    pub initial_delay: Option<String>,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExecProbe {
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHttpGetProbe {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    pub port: i64,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTcpSocketProbe {
    #[serde(default)]
    pub host: Option<String>,
    pub port: i64,
}

/// `[file_watch.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFileWatchConfig {
    pub paths: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,
}

/// `[button.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawButtonConfig {
    #[serde(default)]
    pub inputs: Vec<RawInput>,
}

/// One button input. Exactly one of the kind tables must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawInput {
    pub name: String,

    #[serde(default)]
    pub text: Option<RawTextInput>,

    #[serde(default)]
    pub bool: Option<RawBoolInput>,

    #[serde(default)]
    pub hidden: Option<RawHiddenInput>,

    #[serde(default)]
    pub choice: Option<RawChoiceInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTextInput {
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBoolInput {
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub true_string: Option<String>,
    #[serde(default)]
    pub false_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHiddenInput {
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawChoiceInput {
    pub choices: Vec<String>,
}

/// `[resource.<name>]` section: a serve command redeployed after each build.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawResourceConfig {
    pub serve_cmd: String,

    #[serde(default)]
    pub serve_dir: Option<PathBuf>,

    #[serde(default)]
    pub serve_env: Vec<String>,

    #[serde(default)]
    pub readiness_probe: Option<RawProbe>,

    #[serde(default)]
    pub disable_source: Option<RawDisableSource>,
}

/// Validated runtime settings from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub workers: usize,
    pub grace_period: Duration,
}

/// Validated configuration.
///
/// `cmds` carry a placeholder `created_at`; [`ConfigFile::initial_state`]
/// stamps the real one.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: Settings,
    pub cmds: Vec<Cmd>,
    pub file_watches: Vec<FileWatch>,
    pub buttons: Vec<UiButton>,
    pub config_maps: Vec<ConfigMap>,
    pub manifests: Vec<Manifest>,
}

impl ConfigFile {
    /// Store contents for a fresh start at `now`.
    ///
    /// Every resource starts with a completed deploy at `now`, so serve
    /// commands run right away.
    pub fn initial_state(&self, now: Timestamp) -> EngineState {
        let mut st = EngineState::default();
        for cmd in &self.cmds {
            let mut cmd = cmd.clone();
            cmd.created_at = now;
            st.cmds.insert(cmd.name.clone(), cmd);
        }
        for fw in &self.file_watches {
            st.file_watches.insert(fw.name.clone(), fw.clone());
        }
        for b in &self.buttons {
            st.buttons.insert(b.name.clone(), b.clone());
        }
        for cm in &self.config_maps {
            st.config_maps.insert(cm.name.clone(), cm.clone());
        }
        for m in &self.manifests {
            let mut m = m.clone();
            m.last_deploy_at = Some(now);
            st.manifests.insert(m.name.clone(), m);
        }
        st
    }
}
