// tests/cmd_disable.rs

mod common;
use crate::common::{CmdBuilder, Harness, TestResult, wait_for};

use cmdctl::model::{CmdState, ConfigMap, DisableState, TriggerSource};

fn toggled(name: &str) -> CmdBuilder {
    CmdBuilder::new(name, &["sleep", "60"]).disable_source("toggle", "isDisabled")
}

#[tokio::test]
async fn disable_stops_and_enable_restarts() -> TestResult {
    let h = Harness::new();
    h.add_config_map(ConfigMap::new("toggle").with("isDisabled", "false"));

    h.create(toggled("foo").build()).await;
    assert!(h.cmd("foo").status.is_running());
    assert_eq!(h.cmd("foo").status.disable_state(), Some(DisableState::Enabled));
    let first = h.execer.running("foo").unwrap();

    h.set_config("toggle", "isDisabled", "true");
    assert_eq!(
        h.controller
            .affected_commands(&TriggerSource::ConfigMap("toggle".into())),
        vec!["foo".to_string()]
    );
    h.reconcile("foo").await;

    let status = h.cmd("foo").status;
    assert_eq!(status.disable_state(), Some(DisableState::Disabled));
    match status.state {
        CmdState::Terminated {
            exit_code, reason, ..
        } => {
            assert_eq!(exit_code, -1);
            assert_eq!(reason, "Disabled");
        }
        other => panic!("expected Terminated, got {other:?}"),
    }
    assert!(h.logs.contains("cmd sleep 60 canceled"));
    wait_for("disabled process to stop", || !first.is_running()).await;

    // Staying disabled is stable.
    h.reconcile("foo").await;
    assert_eq!(h.execer.start_count("foo"), 1);

    h.set_config("toggle", "isDisabled", "false");
    h.reconcile("foo").await;
    assert!(h.cmd("foo").status.is_running());
    assert_eq!(h.cmd("foo").status.disable_state(), Some(DisableState::Enabled));
    assert_eq!(h.execer.start_count("foo"), 2);
    Ok(())
}

#[tokio::test]
async fn disabled_from_the_start_never_runs() -> TestResult {
    let h = Harness::new();
    h.add_config_map(ConfigMap::new("toggle").with("isDisabled", "true"));

    h.create(toggled("foo").build()).await;

    assert_eq!(h.cmd("foo").status.waiting_reason(), Some("disabled"));
    assert_eq!(h.execer.start_count("foo"), 0);
    Ok(())
}

#[tokio::test]
async fn disable_beats_a_pending_trigger() -> TestResult {
    let h = Harness::new();
    h.add_config_map(ConfigMap::new("toggle").with("isDisabled", "false"));
    h.add_file_watch("src");
    h.create(toggled("foo").restart_on_file_watch("src").build()).await;

    h.touch("src");
    h.set_config("toggle", "isDisabled", "true");
    h.reconcile("foo").await;

    assert!(h.cmd("foo").status.is_terminated());
    assert_eq!(h.execer.start_count("foo"), 1);
    // Disabling signals without waiting; the process goes away shortly after.
    wait_for("disabled process to stop", || h.execer.running_count() == 0).await;
    Ok(())
}

#[tokio::test]
async fn quick_re_enable_waits_for_the_disabled_process() -> TestResult {
    let h = Harness::new();
    h.add_config_map(ConfigMap::new("toggle").with("isDisabled", "false"));
    h.create(toggled("foo").build()).await;
    let first = h.execer.running("foo").unwrap();

    h.set_config("toggle", "isDisabled", "true");
    h.reconcile("foo").await;
    h.set_config("toggle", "isDisabled", "false");
    h.reconcile("foo").await;

    assert!(!first.is_running());
    assert_eq!(h.execer.start_count("foo"), 2);
    assert_eq!(h.execer.running_count(), 1);
    assert!(h.execer.overlapping_starts().is_empty());
    Ok(())
}

#[tokio::test]
async fn recreating_a_deleted_cmd_waits_for_the_old_process() -> TestResult {
    let h = Harness::new();
    h.create(CmdBuilder::new("foo", &["sleep", "60"]).build()).await;
    let first = h.execer.running("foo").unwrap();

    h.delete("foo");
    h.reconcile("foo").await;
    assert!(!h.exists("foo"));

    h.create(CmdBuilder::new("foo", &["sleep", "60"]).build()).await;
    assert!(!first.is_running());
    assert_eq!(h.execer.running_count(), 1);
    assert!(h.execer.overlapping_starts().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_config_map_is_pending_and_permissive() -> TestResult {
    let h = Harness::new();
    h.create(toggled("foo").build()).await;

    let status = h.cmd("foo").status;
    assert_eq!(status.disable_state(), Some(DisableState::Pending));
    assert!(status.is_running());
    Ok(())
}

#[tokio::test]
async fn unparsable_value_is_an_error_and_permissive() -> TestResult {
    let h = Harness::new();
    h.add_config_map(ConfigMap::new("toggle").with("isDisabled", "maybe"));
    h.create(toggled("foo").build()).await;

    let status = h.cmd("foo").status;
    assert_eq!(status.disable_state(), Some(DisableState::Error));
    assert!(status.is_running());
    Ok(())
}

#[tokio::test]
async fn short_and_capitalised_bool_spellings_disable() -> TestResult {
    for value in ["1", "t", "TRUE", "True"] {
        let h = Harness::new();
        h.add_config_map(ConfigMap::new("toggle").with("isDisabled", value));
        h.create(toggled("foo").build()).await;
        assert_eq!(
            h.cmd("foo").status.disable_state(),
            Some(DisableState::Disabled),
            "{value:?} should disable"
        );
    }
    Ok(())
}
