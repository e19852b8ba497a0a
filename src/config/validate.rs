// src/config/validate.rs

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, RawCmdConfig, RawConfigFile, RawDisableSource, RawInput, RawProbe,
    RawResourceConfig, Settings,
};
use crate::errors::{CmdctlError, Result};
use crate::model::{
    Cmd, CmdSpec, ConfigMap, DisableSource, ExecSpec, FileWatch, Manifest, ProbeHandler,
    ProbeSpec, RestartOnSpec, StartOnSpec, UiButton, UiInputKind, UiInputSpec,
};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("name regex is valid")
});

const MAX_NAME_LEN: usize = 63;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CmdctlError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        warn_unknown_references(&raw);

        let settings = Settings {
            workers: raw.config.workers,
            grace_period: duration_field("[config].grace_period", &raw.config.grace_period)?,
        };

        let cmds = raw
            .cmd
            .iter()
            .map(|(name, cfg)| build_cmd(name, cfg))
            .collect::<Result<Vec<_>>>()?;

        let file_watches = raw
            .file_watch
            .iter()
            .map(|(name, cfg)| FileWatch {
                name: name.clone(),
                paths: cfg.paths.clone(),
                ignore: cfg.ignore.clone(),
                last_event_time: None,
            })
            .collect();

        let buttons = raw
            .button
            .iter()
            .map(|(name, cfg)| {
                let inputs = cfg
                    .inputs
                    .iter()
                    .map(|i| build_input(name, i))
                    .collect::<Result<Vec<_>>>()?;
                Ok(UiButton {
                    inputs,
                    ..UiButton::new(name.clone())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let config_maps = raw
            .config_map
            .iter()
            .map(|(name, data)| ConfigMap {
                name: name.clone(),
                data: data.clone(),
            })
            .collect();

        let manifests = raw
            .resource
            .iter()
            .map(|(name, cfg)| build_manifest(name, cfg))
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigFile {
            settings,
            cmds,
            file_watches,
            buttons,
            config_maps,
            manifests,
        })
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_cmds(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    Ok(())
}

fn ensure_has_cmds(cfg: &RawConfigFile) -> Result<()> {
    if cfg.cmd.is_empty() && cfg.resource.is_empty() {
        return Err(CmdctlError::ConfigError(
            "config must contain at least one [cmd.<name>] or [resource.<name>] section"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(CmdctlError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    let sections = [
        ("cmd", cfg.cmd.keys().collect::<Vec<_>>()),
        ("file_watch", cfg.file_watch.keys().collect()),
        ("button", cfg.button.keys().collect()),
        ("config_map", cfg.config_map.keys().collect()),
        ("resource", cfg.resource.keys().collect()),
    ];
    for (section, names) in sections {
        for name in names {
            if !is_valid_name(name) {
                return Err(CmdctlError::ConfigError(format!(
                    "[{section}.{name}]: names must be lowercase alphanumerics or '-', \
                     start and end with an alphanumeric, and be at most {MAX_NAME_LEN} characters"
                )));
            }
        }
    }
    Ok(())
}

pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && NAME_RE.is_match(name)
}

/// References to undeclared objects are not fatal: the reconciler reports
/// the missing source on the command's status.
fn warn_unknown_references(cfg: &RawConfigFile) {
    for (name, cmd) in &cfg.cmd {
        let start_buttons = cmd.start_on.iter().flat_map(|s| s.buttons.iter());
        let restart_buttons = cmd.restart_on.iter().flat_map(|r| r.buttons.iter());
        for button in start_buttons.chain(restart_buttons) {
            if !cfg.button.contains_key(button) {
                warn!(cmd = %name, button = %button, "cmd references undeclared button");
            }
        }
        for fw in cmd.restart_on.iter().flat_map(|r| r.file_watches.iter()) {
            if !cfg.file_watch.contains_key(fw) {
                warn!(cmd = %name, file_watch = %fw, "cmd references undeclared file watch");
            }
        }
        if let Some(ds) = &cmd.disable_source {
            if !cfg.config_map.contains_key(&ds.config_map) {
                warn!(cmd = %name, config_map = %ds.config_map, "cmd references undeclared config map");
            }
        }
    }
}

fn build_cmd(name: &str, cfg: &RawCmdConfig) -> Result<Cmd> {
    let args = match (&cfg.args, &cfg.script) {
        (Some(_), Some(_)) => {
            return Err(CmdctlError::ConfigError(format!(
                "cmd '{name}' sets both `args` and `script`"
            )));
        }
        (None, None) => {
            return Err(CmdctlError::ConfigError(format!(
                "cmd '{name}' needs `args` or `script`"
            )));
        }
        (Some(args), None) => args.clone(),
        (None, Some(script)) => vec!["sh".to_string(), "-c".to_string(), script.clone()],
    };
    if args.is_empty() || args[0].trim().is_empty() {
        return Err(CmdctlError::ConfigError(format!(
            "cmd '{name}' has an empty `args` list"
        )));
    }

    let readiness_probe = cfg
        .readiness_probe
        .as_ref()
        .map(|p| build_probe(&format!("cmd '{name}'"), p))
        .transpose()?;

    let start_on = cfg
        .start_on
        .as_ref()
        .map(|s| {
            let start_after = s
                .start_after
                .as_deref()
                .map(|raw| parse_timestamp(name, raw))
                .transpose()?;
            Ok::<_, CmdctlError>(StartOnSpec {
                buttons: s.buttons.clone(),
                start_after,
            })
        })
        .transpose()?;

    let spec = CmdSpec {
        exec: ExecSpec {
            args,
            dir: cfg.dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            env: cfg.env.clone(),
            readiness_probe,
        },
        start_on,
        restart_on: cfg.restart_on.as_ref().map(|r| RestartOnSpec {
            buttons: r.buttons.clone(),
            file_watches: r.file_watches.clone(),
        }),
        disable_source: cfg.disable_source.as_ref().map(disable_source),
    };

    Ok(Cmd::new(name, spec, DateTime::<Utc>::UNIX_EPOCH))
}

fn build_manifest(name: &str, cfg: &RawResourceConfig) -> Result<Manifest> {
    if cfg.serve_cmd.trim().is_empty() {
        return Err(CmdctlError::ConfigError(format!(
            "resource '{name}' has an empty `serve_cmd`"
        )));
    }

    let readiness_probe = cfg
        .readiness_probe
        .as_ref()
        .map(|p| build_probe(&format!("resource '{name}'"), p))
        .transpose()?;

    let exec = ExecSpec {
        dir: cfg.serve_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        env: cfg.serve_env.clone(),
        readiness_probe,
        ..ExecSpec::shell(&cfg.serve_cmd)
    };

    Ok(Manifest {
        disable_source: cfg.disable_source.as_ref().map(disable_source),
        ..Manifest::new(name).with_serve(exec)
    })
}

fn disable_source(raw: &RawDisableSource) -> DisableSource {
    DisableSource {
        config_map: raw.config_map.clone(),
        key: raw.key.clone(),
    }
}

fn build_probe(owner: &str, raw: &RawProbe) -> Result<ProbeSpec> {
    let handler = match (&raw.exec, &raw.http_get, &raw.tcp_socket) {
        (Some(exec), None, None) => ProbeHandler::Exec {
            command: exec.command.clone(),
        },
        (None, Some(http), None) => ProbeHandler::HttpGet {
            scheme: http.scheme.clone().unwrap_or_else(|| "http".to_string()),
            host: http.host.clone().unwrap_or_default(),
            port: http.port,
            path: http.path.clone().unwrap_or_else(|| "/".to_string()),
        },
        (None, None, Some(tcp)) => ProbeHandler::TcpSocket {
            host: tcp.host.clone().unwrap_or_default(),
            port: tcp.port,
        },
        (exec, http, tcp) => {
            let count = [exec.is_some(), http.is_some(), tcp.is_some()]
                .iter()
                .filter(|h| **h)
                .count();
            return Err(CmdctlError::ConfigError(format!(
                "{owner}: readiness_probe must declare exactly one of `exec`, `http_get`, \
                 `tcp_socket` (found {count})"
            )));
        }
    };

    let mut spec = ProbeSpec::new(handler);
    if let Some(d) = &raw.initial_delay {
        spec.initial_delay = duration_field(&format!("{owner}: initial_delay"), d)?;
    }
    if let Some(d) = &raw.timeout {
        spec.timeout = nonzero_duration_field(&format!("{owner}: timeout"), d)?;
    }
    if let Some(d) = &raw.period {
        spec.period = nonzero_duration_field(&format!("{owner}: period"), d)?;
    }
    Ok(spec)
}

fn build_input(button: &str, raw: &RawInput) -> Result<UiInputSpec> {
    if raw.name.trim().is_empty() {
        return Err(CmdctlError::ConfigError(format!(
            "button '{button}' has an input without a name"
        )));
    }

    let kind = match (&raw.text, &raw.bool, &raw.hidden, &raw.choice) {
        (Some(text), None, None, None) => UiInputKind::Text {
            default: text.default.clone(),
        },
        (None, Some(b), None, None) => UiInputKind::Bool {
            default: b.default,
            true_string: b.true_string.clone(),
            false_string: b.false_string.clone(),
        },
        (None, None, Some(hidden), None) => UiInputKind::Hidden {
            value: hidden.value.clone(),
        },
        (None, None, None, Some(choice)) => {
            if choice.choices.is_empty() {
                return Err(CmdctlError::ConfigError(format!(
                    "button '{button}' input '{}' declares no choices",
                    raw.name
                )));
            }
            UiInputKind::Choice {
                choices: choice.choices.clone(),
            }
        }
        (text, b, hidden, choice) => {
            let count = [
                text.is_some(),
                b.is_some(),
                hidden.is_some(),
                choice.is_some(),
            ]
            .iter()
            .filter(|k| **k)
            .count();
            return Err(CmdctlError::ConfigError(format!(
                "button '{button}' input '{}' must declare exactly one of `text`, `bool`, \
                 `hidden`, `choice` (found {count})",
                raw.name
            )));
        }
    };

    Ok(UiInputSpec {
        name: raw.name.clone(),
        kind,
    })
}

fn duration_field(field: &str, raw: &str) -> Result<std::time::Duration> {
    parse_duration(raw).map_err(|e| CmdctlError::ConfigError(format!("{field}: {e}")))
}

fn nonzero_duration_field(field: &str, raw: &str) -> Result<std::time::Duration> {
    let d = duration_field(field, raw)?;
    if d.is_zero() {
        return Err(CmdctlError::ConfigError(format!(
            "{field}: must be greater than zero"
        )));
    }
    Ok(d)
}

fn parse_timestamp(cmd: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            CmdctlError::ConfigError(format!(
                "cmd '{cmd}': start_on.start_after '{raw}' is not an RFC 3339 timestamp: {e}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules_follow_dns_labels() {
        assert!(is_valid_name("web"));
        assert!(is_valid_name("foo-serve-1"));
        assert!(!is_valid_name("Web"));
        assert!(!is_valid_name("-web"));
        assert!(!is_valid_name("web_1"));
        assert!(!is_valid_name(&"a".repeat(64)));
    }
}
