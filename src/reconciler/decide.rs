// src/reconciler/decide.rs

//! Pure decision core of the `Cmd` reconciler.
//!
//! Given a `Cmd`, its resolved disable state, the current trigger readings
//! and the exec spec of the instance the controller owns (if any), decide
//! what should happen to the process. No IO happens here; the controller
//! applies the decision.
//!
//! Precedence, first match wins:
//!
//! 1. disabled: dispose whatever exists;
//! 2. exec spec changed: the instance is superseded and the command is
//!    treated as fresh;
//! 3. an instance exists: restart on any declared source newer than the
//!    watermark, unless a build holds it back. A source the watermark has
//!    not seen yet counts when it fired after the instance started;
//! 4. no instance: wait for missing sources, then for a `start_on` click if
//!    one is required, otherwise start.

use crate::model::{
    Cmd, DisableStatus, ExecSpec, Timestamp, TriggerSource, TriggerWatermark,
};

use super::triggers::{SourceTime, TriggerReading, TriggerRole};

pub const DISABLED_REASON: &str = "disabled";
pub const START_ON_REASON: &str = "cmd StartOn has not been triggered";

#[derive(Debug, Clone, Copy)]
pub struct DecideInput<'a> {
    pub cmd: &'a Cmd,
    pub disable: &'a DisableStatus,
    pub triggers: &'a [TriggerReading],
    /// Exec spec the current instance was started with.
    pub instance: Option<&'a ExecSpec>,
    pub build_in_progress: bool,
}

/// Watermark changes that come with a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkUpdate {
    /// Recorded without counting as a trigger.
    pub observe: Vec<(TriggerSource, Timestamp)>,
    /// Recorded as having caused a start.
    pub consume: Vec<(TriggerSource, Timestamp)>,
}

impl WatermarkUpdate {
    pub fn is_empty(&self) -> bool {
        self.observe.is_empty() && self.consume.is_empty()
    }

    pub fn apply(&self, wm: &mut TriggerWatermark) {
        for (src, at) in &self.observe {
            wm.observe(src.clone(), *at);
        }
        for (src, at) in &self.consume {
            wm.consume(src.clone(), *at);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Dispose any instance and report the command as disabled.
    Disable,
    /// Leave the current instance alone.
    Keep {
        watermark: WatermarkUpdate,
        /// A restart that is held back by a build in progress.
        deferred: Option<TriggerSource>,
    },
    /// No instance should run yet.
    Wait { reason: String, supersede: bool },
    /// Start a new instance, disposing the current one first if `supersede`.
    Start {
        supersede: bool,
        /// The button or file watch that caused this start, if any.
        cause: Option<TriggerSource>,
        watermark: WatermarkUpdate,
    },
}

pub fn decide(input: &DecideInput<'_>) -> Decision {
    if input.disable.is_disabled() {
        return Decision::Disable;
    }

    let wm = &input.cmd.status.watermark;

    match input.instance {
        Some(exec) if *exec == input.cmd.spec.exec => decide_running(input, wm),
        Some(_) => decide_fresh(input, wm, true),
        None => decide_fresh(input, wm, false),
    }
}

fn decide_running(input: &DecideInput<'_>, wm: &TriggerWatermark) -> Decision {
    let mut seeds = Vec::new();
    let mut cause: Option<(&TriggerReading, Timestamp)> = None;
    // Anything after this happened while the current instance was up.
    let baseline = wm.consumed().max(input.cmd.status.started_at());

    for reading in input.triggers {
        let Some(at) = reading.at.watermark_value() else {
            continue;
        };
        if !wm.is_tracking(&reading.source) {
            let fired_since_start =
                reading.at != SourceTime::NeverFired && baseline.is_some_and(|b| at > b);
            if fired_since_start {
                cause = pick_cause(cause, reading, at);
            } else {
                seeds.push((reading.source.clone(), at));
            }
            continue;
        }
        if reading.at != SourceTime::NeverFired && wm.is_new(&reading.source, at) {
            cause = pick_cause(cause, reading, at);
        }
    }

    let Some((cause, _)) = cause else {
        return Decision::Keep {
            watermark: WatermarkUpdate {
                observe: seeds,
                consume: Vec::new(),
            },
            deferred: None,
        };
    };

    if input.build_in_progress {
        return Decision::Keep {
            watermark: WatermarkUpdate {
                observe: seeds,
                consume: Vec::new(),
            },
            deferred: Some(cause.source.clone()),
        };
    }

    Decision::Start {
        supersede: true,
        cause: Some(cause.source.clone()),
        watermark: consume_all(input.triggers),
    }
}

fn decide_fresh(input: &DecideInput<'_>, wm: &TriggerWatermark, supersede: bool) -> Decision {
    if let Some(missing) = input
        .triggers
        .iter()
        .find(|r| r.at == SourceTime::Missing)
    {
        return Decision::Wait {
            reason: format!("{} not found", missing.source),
            supersede,
        };
    }

    let start_on = input.cmd.spec.start_on.as_ref().filter(|s| s.is_gating());
    let Some(start_on) = start_on else {
        return Decision::Start {
            supersede,
            cause: None,
            watermark: consume_all(input.triggers),
        };
    };

    let mut cause: Option<(&TriggerReading, Timestamp)> = None;
    for reading in input
        .triggers
        .iter()
        .filter(|r| r.role == TriggerRole::StartOn)
    {
        let SourceTime::At(at) = reading.at else {
            continue;
        };
        let after_threshold = match start_on.start_after {
            Some(threshold) => at >= threshold,
            None => at > input.cmd.created_at,
        };
        if after_threshold && wm.is_new(&reading.source, at) {
            cause = pick_cause(cause, reading, at);
        }
    }

    match cause {
        Some((reading, _)) => Decision::Start {
            supersede,
            cause: Some(reading.source.clone()),
            watermark: consume_all(input.triggers),
        },
        None => Decision::Wait {
            reason: START_ON_REASON.to_string(),
            supersede,
        },
    }
}

/// Latest wins; on a tie `StartOn` beats `RestartOn`, then declaration order.
fn pick_cause<'a>(
    current: Option<(&'a TriggerReading, Timestamp)>,
    candidate: &'a TriggerReading,
    at: Timestamp,
) -> Option<(&'a TriggerReading, Timestamp)> {
    match current {
        None => Some((candidate, at)),
        Some((cur, cur_at)) => {
            let better = at > cur_at
                || (at == cur_at
                    && candidate.role == TriggerRole::StartOn
                    && cur.role == TriggerRole::RestartOn);
            if better {
                Some((candidate, at))
            } else {
                Some((cur, cur_at))
            }
        }
    }
}

fn consume_all(triggers: &[TriggerReading]) -> WatermarkUpdate {
    let mut update = WatermarkUpdate::default();
    for reading in triggers {
        match reading.at {
            SourceTime::At(at) => update.consume.push((reading.source.clone(), at)),
            SourceTime::NeverFired => update
                .observe
                .push((reading.source.clone(), super::triggers::NEVER)),
            SourceTime::Missing => {}
        }
    }
    update
}
