// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use cmdctl::config::{load_and_validate, parse_and_validate};
use cmdctl::errors::CmdctlError;
use cmdctl::model::{ProbeHandler, UiInputKind};

fn config_error(toml: &str) -> String {
    match parse_and_validate(toml) {
        Err(CmdctlError::ConfigError(msg)) => msg,
        Err(other) => panic!("expected ConfigError, got {other:?}"),
        Ok(_) => panic!("expected config to be rejected"),
    }
}

#[test]
fn full_example_loads() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[config]
workers = 2
grace_period = "500ms"

[cmd.web]
args = ["python3", "-m", "http.server", "8000"]
env = ["PORT=8000"]
start_on = {{ buttons = ["start-web"], start_after = "2024-01-01T00:00:00Z" }}
restart_on = {{ buttons = ["restart-web"], file_watches = ["web-src"] }}
disable_source = {{ config_map = "web-toggle" }}
readiness_probe = {{ http_get = {{ port = 8000, path = "/" }}, period = "1s" }}

[cmd.lint]
script = "cargo clippy"

[file_watch.web-src]
paths = ["web/**/*.html"]
ignore = ["web/**/*.tmp"]

[button.start-web]
inputs = [{{ name = "MODE", choice = {{ choices = ["dev", "prod"] }} }}]

[button.restart-web]

[config_map.web-toggle]
isDisabled = "false"

[resource.api]
serve_cmd = "sleep 60"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).expect("config should load");

    assert_eq!(cfg.settings.workers, 2);
    assert_eq!(cfg.settings.grace_period, Duration::from_millis(500));
    assert_eq!(cfg.cmds.len(), 2);

    let web = cfg.cmds.iter().find(|c| c.name == "web").unwrap();
    assert_eq!(web.spec.exec.env, vec!["PORT=8000"]);
    assert!(web.spec.waits_on_start_on());
    assert!(web.spec.start_on.as_ref().unwrap().start_after.is_some());
    let ds = web.spec.disable_source.as_ref().unwrap();
    assert_eq!((ds.config_map.as_str(), ds.key.as_str()), ("web-toggle", "isDisabled"));
    let probe = web.spec.exec.readiness_probe.as_ref().unwrap();
    assert_eq!(probe.period, Duration::from_secs(1));
    assert_eq!(probe.timeout, Duration::from_secs(1));
    assert!(matches!(probe.handler, ProbeHandler::HttpGet { port: 8000, .. }));

    let lint = cfg.cmds.iter().find(|c| c.name == "lint").unwrap();
    assert_eq!(lint.spec.exec.args, vec!["sh", "-c", "cargo clippy"]);

    let start = cfg.buttons.iter().find(|b| b.name == "start-web").unwrap();
    assert!(matches!(start.inputs[0].kind, UiInputKind::Choice { .. }));

    assert_eq!(cfg.manifests[0].serve_cmd_name(1), "api-serve-1");
    assert_eq!(cfg.manifests[0].serve.as_ref().unwrap().exec.display(), "sleep 60");
}

#[test]
fn initial_state_stamps_creation_and_deploy_times() {
    let cfg = parse_and_validate(
        r#"
[cmd.a]
args = ["true"]

[resource.api]
serve_cmd = "sleep 60"
"#,
    )
    .unwrap();

    let now = chrono::Utc::now();
    let st = cfg.initial_state(now);
    assert_eq!(st.cmds["a"].created_at, now);
    assert_eq!(st.manifests["api"].last_deploy_at, Some(now));
}

#[test]
fn empty_config_is_rejected() {
    assert!(config_error("").contains("at least one"));
}

#[test]
fn zero_workers_is_rejected() {
    let msg = config_error(
        r#"
[config]
workers = 0

[cmd.a]
args = ["true"]
"#,
    );
    assert!(msg.contains("workers"));
}

#[test]
fn bad_names_are_rejected() {
    let msg = config_error(
        r#"
[cmd.Web_Server]
args = ["true"]
"#,
    );
    assert!(msg.contains("[cmd.Web_Server]"));
}

#[test]
fn args_and_script_are_exclusive() {
    assert!(
        config_error(
            r#"
[cmd.a]
args = ["true"]
script = "true"
"#
        )
        .contains("both")
    );
    assert!(config_error("[cmd.a]\n").contains("needs `args` or `script`"));
    assert!(config_error("[cmd.a]\nargs = []\n").contains("empty"));
}

#[test]
fn probe_needs_exactly_one_handler() {
    let msg = config_error(
        r#"
[cmd.a]
args = ["true"]
readiness_probe = { exec = { command = ["true"] }, tcp_socket = { port = 80 } }
"#,
    );
    assert!(msg.contains("exactly one"));
    assert!(msg.contains("found 2"));
}

#[test]
fn out_of_range_probe_port_loads_and_fails_later() {
    // Port ranges are checked when the probe starts, so the command can
    // report the problem on its own status.
    let cfg = parse_and_validate(
        r#"
[cmd.a]
args = ["true"]
readiness_probe = { http_get = { port = 70000 } }
"#,
    )
    .unwrap();
    let probe = cfg.cmds[0].spec.exec.readiness_probe.as_ref().unwrap();
    assert!(matches!(probe.handler, ProbeHandler::HttpGet { port: 70000, .. }));
}

#[test]
fn bad_durations_name_the_field() {
    let msg = config_error(
        r#"
[config]
grace_period = "soon"

[cmd.a]
args = ["true"]
"#,
    );
    assert!(msg.contains("grace_period"));
}

#[test]
fn zero_probe_period_or_timeout_is_rejected() {
    for (field, probe) in [
        ("period", r#"{ exec = { command = ["true"] }, period = "0s" }"#),
        ("timeout", r#"{ exec = { command = ["true"] }, timeout = "0ms" }"#),
    ] {
        let msg = config_error(&format!(
            "[cmd.a]\nargs = [\"true\"]\nreadiness_probe = {probe}\n"
        ));
        assert!(msg.contains(field), "{field}: {msg}");
        assert!(msg.contains("greater than zero"), "{field}: {msg}");
    }
}

#[test]
fn huge_durations_are_rejected_not_wrapped() {
    let msg = config_error(&format!(
        "[cmd.a]\nargs = [\"true\"]\nreadiness_probe = {{ exec = {{ command = [\"true\"] }}, period = \"{}h\" }}\n",
        u64::MAX / 60
    ));
    assert!(msg.contains("too large"), "{msg}");
}

#[test]
fn bad_start_after_is_rejected() {
    let msg = config_error(
        r#"
[cmd.a]
args = ["true"]
start_on = { buttons = ["b"], start_after = "yesterday" }
"#,
    );
    assert!(msg.contains("RFC 3339"));
}

#[test]
fn inputs_declare_exactly_one_kind() {
    let msg = config_error(
        r#"
[cmd.a]
args = ["true"]

[button.b]
inputs = [{ name = "x", text = {}, bool = {} }]
"#,
    );
    assert!(msg.contains("exactly one of"));

    let msg = config_error(
        r#"
[cmd.a]
args = ["true"]

[button.b]
inputs = [{ name = "x", choice = { choices = [] } }]
"#,
    );
    assert!(msg.contains("no choices"));
}

#[test]
fn unknown_references_only_warn() {
    cmdctl_test_utils::init_tracing();
    let cfg = parse_and_validate(
        r#"
[cmd.a]
args = ["true"]
restart_on = { file_watches = ["nowhere"], buttons = ["nobody"] }
"#,
    )
    .unwrap();
    assert_eq!(cfg.cmds.len(), 1);
}

#[test]
fn unknown_fields_are_toml_errors() {
    let res = parse_and_validate(
        r#"
[cmd.a]
args = ["true"]
restart_when = "always"
"#,
    );
    assert!(matches!(res, Err(CmdctlError::TomlError(_))));
}

#[test]
fn missing_file_is_io_error() {
    let res = load_and_validate("/definitely/not/here/Cmdctl.toml");
    assert!(matches!(res, Err(CmdctlError::IoError(_))));
}
