// src/reconciler/triggers.rs

//! Reads the current timestamps of every trigger source a `Cmd` declares.

use chrono::{DateTime, Utc};

use crate::model::{Cmd, Timestamp, TriggerSource};
use crate::store::EngineState;

/// Stand-in timestamp for a source that exists but has never fired.
pub const NEVER: Timestamp = DateTime::<Utc>::MIN_UTC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRole {
    StartOn,
    RestartOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTime {
    /// The source object does not exist.
    Missing,
    NeverFired,
    At(Timestamp),
}

impl SourceTime {
    /// Timestamp to record in a watermark; `None` for missing sources.
    pub fn watermark_value(self) -> Option<Timestamp> {
        match self {
            SourceTime::Missing => None,
            SourceTime::NeverFired => Some(NEVER),
            SourceTime::At(t) => Some(t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReading {
    pub source: TriggerSource,
    pub role: TriggerRole,
    pub at: SourceTime,
}

/// One reading per declared source, in declaration order. A button declared
/// under both `start_on` and `restart_on` is read once, as `StartOn`.
pub fn read_triggers(cmd: &Cmd, state: &EngineState) -> Vec<TriggerReading> {
    let start_buttons = cmd.spec.start_buttons();

    cmd.spec
        .trigger_sources()
        .into_iter()
        .map(|source| {
            let role = match &source {
                TriggerSource::UiButton(b) if start_buttons.contains(b) => TriggerRole::StartOn,
                _ => TriggerRole::RestartOn,
            };
            let at = source_time(&source, state);
            TriggerReading { source, role, at }
        })
        .collect()
}

fn source_time(source: &TriggerSource, state: &EngineState) -> SourceTime {
    let last = match source {
        TriggerSource::FileWatch(n) => state.file_watches.get(n).map(|fw| fw.last_event_time),
        TriggerSource::UiButton(n) => state.buttons.get(n).map(|b| b.last_clicked_at),
        // Config maps and builds gate and re-enqueue, they never trigger.
        TriggerSource::ConfigMap(_) | TriggerSource::Build(_) => None,
    };
    match last {
        None => SourceTime::Missing,
        Some(None) => SourceTime::NeverFired,
        Some(Some(t)) => SourceTime::At(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CmdSpec, ExecSpec, FileWatch, RestartOnSpec, StartOnSpec, UiButton};
    use chrono::TimeZone;

    #[test]
    fn readings_follow_declaration_and_store_state() {
        let t = Utc.timestamp_opt(42, 0).unwrap();
        let spec = CmdSpec {
            start_on: Some(StartOnSpec {
                buttons: vec!["b-1".into()],
                start_after: None,
            }),
            restart_on: Some(RestartOnSpec {
                buttons: vec!["b-1".into()],
                file_watches: vec!["fw-1".into(), "fw-2".into()],
            }),
            ..CmdSpec::new(ExecSpec::new(["true"]))
        };
        let cmd = Cmd::new("c", spec, t);

        let mut st = EngineState::default();
        let mut b = UiButton::new("b-1");
        b.last_clicked_at = Some(t);
        st.buttons.insert("b-1".into(), b);
        st.file_watches.insert("fw-1".into(), FileWatch::new("fw-1"));

        let readings = read_triggers(&cmd, &st);
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].role, TriggerRole::StartOn);
        assert_eq!(readings[0].at, SourceTime::At(t));
        assert_eq!(readings[1].at, SourceTime::NeverFired);
        assert_eq!(readings[2].at, SourceTime::Missing);
        assert_eq!(readings[2].role, TriggerRole::RestartOn);
    }
}
