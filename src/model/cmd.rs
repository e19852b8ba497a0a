// src/model/cmd.rs

//! The `Cmd` resource: a local command the controller keeps running.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::model::probe::ProbeSpec;
use crate::model::source::TriggerSource;
use crate::model::{Name, Timestamp};

/// Execution-relevant part of a `Cmd` spec.
///
/// Any change here supersedes a running instance. Everything outside this
/// struct (`start_on`, `restart_on`, `disable_source`) is declarative and
/// never restarts a process by itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecSpec {
    pub args: Vec<String>,
    pub dir: PathBuf,
    /// `NAME=value` pairs added on top of the inherited environment.
    pub env: Vec<String>,
    pub readiness_probe: Option<ProbeSpec>,
}

impl ExecSpec {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            dir: PathBuf::from("."),
            env: Vec::new(),
            readiness_probe: None,
        }
    }

    /// Wrap a shell script as `sh -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new(["sh", "-c", script])
    }

    /// How the command is named in log lines.
    ///
    /// `sh -c <script>` is shown as the script itself; anything else is the
    /// argument vector joined by spaces.
    pub fn display(&self) -> String {
        match self.args.as_slice() {
            [sh, flag, script] if sh == "sh" && flag == "-c" => script.clone(),
            args => args.join(" "),
        }
    }
}

/// Buttons that gate the first start of a command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartOnSpec {
    pub buttons: Vec<Name>,
    /// Clicks before this instant are ignored.
    pub start_after: Option<Timestamp>,
}

impl StartOnSpec {
    /// An empty button list does not gate anything.
    pub fn is_gating(&self) -> bool {
        !self.buttons.is_empty()
    }
}

/// Sources whose events restart the command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestartOnSpec {
    pub buttons: Vec<Name>,
    pub file_watches: Vec<Name>,
}

/// A config map key whose boolean value disables the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableSource {
    pub config_map: Name,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CmdSpec {
    pub exec: ExecSpec,
    pub start_on: Option<StartOnSpec>,
    pub restart_on: Option<RestartOnSpec>,
    pub disable_source: Option<DisableSource>,
}

impl CmdSpec {
    pub fn new(exec: ExecSpec) -> Self {
        Self {
            exec,
            ..Self::default()
        }
    }

    /// True when `start_on` declares at least one button.
    pub fn waits_on_start_on(&self) -> bool {
        self.start_on.as_ref().is_some_and(StartOnSpec::is_gating)
    }

    pub fn start_buttons(&self) -> &[Name] {
        self.start_on
            .as_ref()
            .map(|s| s.buttons.as_slice())
            .unwrap_or_default()
    }

    /// Every source declared in `start_on` and `restart_on`, deduplicated,
    /// in declaration order.
    pub fn trigger_sources(&self) -> Vec<TriggerSource> {
        let mut out: Vec<TriggerSource> = Vec::new();
        let mut push = |src: TriggerSource| {
            if !out.contains(&src) {
                out.push(src);
            }
        };

        for b in self.start_buttons() {
            push(TriggerSource::UiButton(b.clone()));
        }
        if let Some(restart_on) = &self.restart_on {
            for b in &restart_on.buttons {
                push(TriggerSource::UiButton(b.clone()));
            }
            for fw in &restart_on.file_watches {
                push(TriggerSource::FileWatch(fw.clone()));
            }
        }
        out
    }
}

/// Back-reference from a generated `Cmd` to the serve resource that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOwner {
    pub manifest: Name,
    pub generation: u64,
    /// Deploy the command was generated for.
    pub deployed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub name: Name,
    pub spec: CmdSpec,
    pub status: CmdStatus,
    pub owner: Option<CmdOwner>,
    pub created_at: Timestamp,
    /// Deletion requested; the reconciler removes the object once its process
    /// has been disposed.
    pub deleting: bool,
}

impl Cmd {
    pub fn new(name: impl Into<Name>, spec: CmdSpec, created_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            spec,
            status: CmdStatus::default(),
            owner: None,
            created_at,
            deleting: false,
        }
    }
}

/// Reason used before the first reconciliation pass.
pub const WAITING_INITIAL_REASON: &str = "not yet reconciled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdState {
    Waiting {
        reason: String,
    },
    Running {
        pid: Option<u32>,
        started_at: Timestamp,
        ready: bool,
    },
    Terminated {
        pid: Option<u32>,
        exit_code: i32,
        reason: String,
        started_at: Option<Timestamp>,
        finished_at: Timestamp,
    },
}

impl Default for CmdState {
    fn default() -> Self {
        CmdState::Waiting {
            reason: WAITING_INITIAL_REASON.to_string(),
        }
    }
}

impl fmt::Display for CmdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdState::Waiting { reason } => write!(f, "waiting ({reason})"),
            CmdState::Running {
                pid,
                started_at,
                ready,
            } => {
                write!(f, "running since {}", started_at.format("%H:%M:%S"))?;
                if let Some(pid) = pid {
                    write!(f, " pid={pid}")?;
                }
                if *ready {
                    write!(f, " ready")?;
                }
                Ok(())
            }
            CmdState::Terminated {
                exit_code, reason, ..
            } => write!(f, "terminated ({reason}, exit code {exit_code})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableState {
    Enabled,
    Disabled,
    /// Source declared but not observed yet.
    Pending,
    /// Source observed but its value is unusable.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableStatus {
    pub state: DisableState,
    pub reason: String,
}

impl DisableStatus {
    pub fn new(state: DisableState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.state == DisableState::Disabled
    }
}

/// Latest trigger timestamps a command has already seen, per source.
///
/// An event only counts as new when it is strictly later than what is
/// recorded here, so delivering the same event twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerWatermark {
    observed: BTreeMap<TriggerSource, Timestamp>,
    /// Highest timestamp that actually caused a start.
    consumed: Option<Timestamp>,
}

impl TriggerWatermark {
    pub fn observed(&self, source: &TriggerSource) -> Option<Timestamp> {
        self.observed.get(source).copied()
    }

    pub fn consumed(&self) -> Option<Timestamp> {
        self.consumed
    }

    pub fn is_tracking(&self, source: &TriggerSource) -> bool {
        self.observed.contains_key(source)
    }

    /// Whether `at` is newer than anything recorded for `source`.
    pub fn is_new(&self, source: &TriggerSource, at: Timestamp) -> bool {
        match self.observed.get(source) {
            Some(seen) => at > *seen,
            None => true,
        }
    }

    /// Record `at` for `source` without treating it as a trigger.
    ///
    /// Never moves a recorded timestamp backwards.
    pub fn observe(&mut self, source: TriggerSource, at: Timestamp) {
        let entry = self.observed.entry(source).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// Record `at` for `source` and raise the consumed high-water mark.
    pub fn consume(&mut self, source: TriggerSource, at: Timestamp) {
        self.observe(source, at);
        if self.consumed.is_none_or(|c| at > c) {
            self.consumed = Some(at);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CmdStatus {
    pub state: CmdState,
    pub disable_status: Option<DisableStatus>,
    pub watermark: TriggerWatermark,
}

impl CmdStatus {
    pub fn is_running(&self) -> bool {
        matches!(self.state, CmdState::Running { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, CmdState::Terminated { .. })
    }

    pub fn ready(&self) -> bool {
        matches!(self.state, CmdState::Running { ready: true, .. })
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        match &self.state {
            CmdState::Running { started_at, .. } => Some(*started_at),
            CmdState::Terminated { started_at, .. } => *started_at,
            CmdState::Waiting { .. } => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &self.state {
            CmdState::Terminated { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn waiting_reason(&self) -> Option<&str> {
        match &self.state {
            CmdState::Waiting { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn disable_state(&self) -> Option<DisableState> {
        self.disable_status.as_ref().map(|d| d.state)
    }
}
