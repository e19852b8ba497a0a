// src/control.rs

//! Line-oriented control channel.
//!
//! Stands in for a UI: records button clicks, flips config map keys, reports
//! builds and prints status. Commands:
//!
//! ```text
//! click <button> [name=value ...]
//! set <configmap> <key> <value>
//! disable <cmd|resource>
//! enable <cmd|resource>
//! touch <filewatch>
//! build-start <resource>
//! build-done <resource>
//! status
//! quit
//! ```

use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::errors::{CmdctlError, Result};
use crate::model::{Cmd, DisableSource, Name, UiInputKind, UiInputStatus, UiInputValue};
use crate::store::{Action, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Click {
        button: Name,
        inputs: Vec<(String, String)>,
    },
    Set {
        config_map: Name,
        key: String,
        value: String,
    },
    Disable(Name),
    Enable(Name),
    Touch(Name),
    BuildStart(Name),
    BuildDone(Name),
    Status,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = CmdctlError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CmdctlError::InvalidControlCommand("empty line".to_string()));
        };
        let rest: Vec<&str> = words.collect();

        let one = |what: &str| -> std::result::Result<Name, CmdctlError> {
            match rest.as_slice() {
                [name] => Ok(name.to_string()),
                _ => Err(CmdctlError::InvalidControlCommand(format!(
                    "usage: {verb} <{what}>"
                ))),
            }
        };

        match verb {
            "click" => {
                let Some((button, pairs)) = rest.split_first() else {
                    return Err(CmdctlError::InvalidControlCommand(
                        "usage: click <button> [name=value ...]".to_string(),
                    ));
                };
                let inputs = pairs
                    .iter()
                    .map(|pair| {
                        pair.split_once('=')
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .ok_or_else(|| {
                                CmdctlError::InvalidControlCommand(format!(
                                    "input '{pair}' is not name=value"
                                ))
                            })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ControlCommand::Click {
                    button: button.to_string(),
                    inputs,
                })
            }
            "set" => match rest.as_slice() {
                [cm, key, value] => Ok(ControlCommand::Set {
                    config_map: cm.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                }),
                _ => Err(CmdctlError::InvalidControlCommand(
                    "usage: set <configmap> <key> <value>".to_string(),
                )),
            },
            "disable" => one("cmd").map(ControlCommand::Disable),
            "enable" => one("cmd").map(ControlCommand::Enable),
            "touch" => one("filewatch").map(ControlCommand::Touch),
            "build-start" => one("resource").map(ControlCommand::BuildStart),
            "build-done" => one("resource").map(ControlCommand::BuildDone),
            "status" => Ok(ControlCommand::Status),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(CmdctlError::InvalidControlCommand(format!(
                "unknown command '{other}'"
            ))),
        }
    }
}

/// What the caller should do after a command was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Continue(Option<String>),
    Quit,
}

/// Apply a parsed command to the store.
pub fn apply(cmd: ControlCommand, store: &Store, clock: &SharedClock) -> Result<ControlOutcome> {
    match cmd {
        ControlCommand::Click { button, inputs } => {
            let values = store.read(|st| {
                let b = st
                    .buttons
                    .get(&button)
                    .ok_or_else(|| CmdctlError::UnknownResource(format!("button '{button}'")))?;
                Ok::<_, CmdctlError>(input_values(b.inputs.as_slice(), &inputs))
            })?;
            store.dispatch(Action::ClickButton {
                name: button,
                at: clock.now(),
                inputs: values,
            });
        }
        ControlCommand::Set {
            config_map,
            key,
            value,
        } => {
            store.dispatch(Action::SetConfigMapKey {
                name: config_map,
                key,
                value,
            });
        }
        ControlCommand::Disable(name) => set_disabled(store, &name, true)?,
        ControlCommand::Enable(name) => set_disabled(store, &name, false)?,
        ControlCommand::Touch(name) => {
            if !store.read(|st| st.file_watches.contains_key(&name)) {
                return Err(CmdctlError::UnknownResource(format!("file watch '{name}'")));
            }
            store.dispatch(Action::RecordFileEvent {
                name,
                at: clock.now(),
            });
        }
        ControlCommand::BuildStart(name) => {
            ensure_manifest(store, &name)?;
            store.dispatch(Action::BuildStarted { manifest: name });
        }
        ControlCommand::BuildDone(name) => {
            ensure_manifest(store, &name)?;
            store.dispatch(Action::BuildCompleted {
                manifest: name,
                at: clock.now(),
            });
        }
        ControlCommand::Status => {
            let report = store.read(|st| {
                st.cmds
                    .values()
                    .map(describe)
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            return Ok(ControlOutcome::Continue(Some(report)));
        }
        ControlCommand::Quit => return Ok(ControlOutcome::Quit),
    }
    Ok(ControlOutcome::Continue(None))
}

/// One status line per `Cmd`.
pub fn describe(cmd: &Cmd) -> String {
    let disable = cmd
        .status
        .disable_status
        .as_ref()
        .map(|d| format!(" [{:?}: {}]", d.state, d.reason))
        .unwrap_or_default();
    let deleting = if cmd.deleting { " (deleting)" } else { "" };
    format!("{}: {}{}{}", cmd.name, cmd.status.state, deleting, disable)
}

fn ensure_manifest(store: &Store, name: &str) -> Result<()> {
    if store.read(|st| st.manifests.contains_key(name)) {
        Ok(())
    } else {
        Err(CmdctlError::UnknownResource(format!("resource '{name}'")))
    }
}

/// Flip the disable key of a cmd, or of a resource with that name.
fn set_disabled(store: &Store, name: &str, disabled: bool) -> Result<()> {
    let source: Option<DisableSource> = store.read(|st| {
        st.cmds
            .get(name)
            .and_then(|c| c.spec.disable_source.clone())
            .or_else(|| st.manifests.get(name).and_then(|m| m.disable_source.clone()))
    });
    let Some(source) = source else {
        return Err(CmdctlError::UnknownResource(format!(
            "'{name}' is not a cmd or resource with a disable_source"
        )));
    };
    store.dispatch(Action::SetConfigMapKey {
        name: source.config_map,
        key: source.key,
        value: disabled.to_string(),
    });
    Ok(())
}

/// Typed input values for a click, following the button's declarations.
fn input_values(
    specs: &[crate::model::UiInputSpec],
    given: &[(String, String)],
) -> Vec<UiInputStatus> {
    given
        .iter()
        .filter_map(|(name, raw)| {
            let Some(spec) = specs.iter().find(|s| &s.name == name) else {
                warn!(input = %name, "ignoring value for undeclared input");
                return None;
            };
            let value = match &spec.kind {
                UiInputKind::Text { .. } => UiInputValue::Text(raw.clone()),
                UiInputKind::Bool { .. } => {
                    UiInputValue::Bool(crate::disable::parse_bool(raw).unwrap_or(false))
                }
                UiInputKind::Hidden { .. } => UiInputValue::Hidden(raw.clone()),
                UiInputKind::Choice { .. } => UiInputValue::Choice(raw.clone()),
            };
            Some(UiInputStatus {
                name: name.clone(),
                value,
            })
        })
        .collect()
}

/// Read commands from stdin until EOF, `quit`, or `shutdown`.
pub async fn run_control_loop(store: Store, clock: SharedClock, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("control channel ready; type `status` or `quit`");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed; control channel stopped");
                break;
            }
            Err(e) => {
                warn!(error = %e, "reading control channel failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let outcome = line
            .parse::<ControlCommand>()
            .and_then(|cmd| apply(cmd, &store, &clock));
        match outcome {
            Ok(ControlOutcome::Continue(Some(out))) => println!("{out}"),
            Ok(ControlOutcome::Continue(None)) => {}
            Ok(ControlOutcome::Quit) => {
                shutdown.cancel();
                break;
            }
            Err(e) => warn!(error = %e, "control command rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::model::{ConfigMap, UiButton, UiInputSpec};

    #[test]
    fn parses_commands() {
        assert_eq!(
            "click b-1 foo=bar dry_run=true".parse::<ControlCommand>().unwrap(),
            ControlCommand::Click {
                button: "b-1".into(),
                inputs: vec![
                    ("foo".into(), "bar".into()),
                    ("dry_run".into(), "true".into())
                ],
            }
        );
        assert_eq!(
            "set toggle isDisabled true".parse::<ControlCommand>().unwrap(),
            ControlCommand::Set {
                config_map: "toggle".into(),
                key: "isDisabled".into(),
                value: "true".into(),
            }
        );
        assert_eq!(
            "  touch  src ".parse::<ControlCommand>().unwrap(),
            ControlCommand::Touch("src".into())
        );
        assert_eq!("quit".parse::<ControlCommand>().unwrap(), ControlCommand::Quit);
    }

    #[test]
    fn rejects_malformed_commands() {
        for line in ["", "click", "set a b", "touch", "click b nope", "dance"] {
            assert!(
                matches!(
                    line.parse::<ControlCommand>(),
                    Err(CmdctlError::InvalidControlCommand(_))
                ),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn click_records_typed_inputs() {
        let store = Store::default();
        let mut b = UiButton::new("b-1");
        b.inputs.push(UiInputSpec {
            name: "dry_run".into(),
            kind: UiInputKind::Bool {
                default: false,
                true_string: None,
                false_string: None,
            },
        });
        store.dispatch(Action::UpsertButton(b));

        let clock = clock::system();
        let cmd = "click b-1 dry_run=true undeclared=1".parse().unwrap();
        apply(cmd, &store, &clock).unwrap();

        let b = store.read(|st| st.buttons["b-1"].clone());
        assert!(b.last_clicked_at.is_some());
        assert_eq!(b.input_values.len(), 1);
        assert_eq!(b.input_value("dry_run"), Some(&UiInputValue::Bool(true)));
    }

    #[test]
    fn unknown_targets_are_errors() {
        let store = Store::default();
        let clock = clock::system();
        assert!(matches!(
            apply(ControlCommand::Touch("nope".into()), &store, &clock),
            Err(CmdctlError::UnknownResource(_))
        ));
        assert!(matches!(
            apply(ControlCommand::Disable("nope".into()), &store, &clock),
            Err(CmdctlError::UnknownResource(_))
        ));
    }

    #[test]
    fn set_creates_missing_config_map() {
        let store = Store::default();
        store.dispatch(Action::UpsertConfigMap(ConfigMap::new("other")));
        apply(
            ControlCommand::Set {
                config_map: "toggle".into(),
                key: "isDisabled".into(),
                value: "true".into(),
            },
            &store,
            &clock::system(),
        )
        .unwrap();
        assert_eq!(
            store.read(|st| st.config_maps["toggle"].data["isDisabled"].clone()),
            "true"
        );
    }
}
