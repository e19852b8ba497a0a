// src/store/actions.rs

//! Store actions and the single reducer that applies them.

use std::collections::btree_map::Entry;

use tracing::{debug, warn};

use crate::model::{
    Cmd, CmdStatus, ConfigMap, FileWatch, Manifest, Name, Timestamp, TriggerSource, UiButton,
    UiInputStatus,
};

use super::state::EngineState;

/// Reference to an object whose spec or trigger data changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Cmd(Name),
    Source(TriggerSource),
    Manifest(Name),
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Create a `Cmd`, or replace the spec and owner of an existing one.
    /// Status, `created_at` and the deletion marker of an existing object
    /// are kept.
    UpsertCmd(Cmd),
    /// Ask for deletion; the reconciler disposes the process and then
    /// dispatches [`Action::RemoveCmd`], which notifies the owning manifest.
    DeleteCmd(Name),
    RemoveCmd(Name),
    UpdateCmdStatus {
        name: Name,
        status: CmdStatus,
    },
    UpsertFileWatch(FileWatch),
    RecordFileEvent {
        name: Name,
        at: Timestamp,
    },
    UpsertButton(UiButton),
    ClickButton {
        name: Name,
        at: Timestamp,
        inputs: Vec<UiInputStatus>,
    },
    UpsertConfigMap(ConfigMap),
    SetConfigMapKey {
        name: Name,
        key: String,
        value: String,
    },
    DeleteSource(TriggerSource),
    UpsertManifest(Manifest),
    BuildStarted {
        manifest: Name,
    },
    BuildCompleted {
        manifest: Name,
        at: Timestamp,
    },
}

/// Apply `action` to `state`, returning the objects whose spec or trigger
/// data changed. Status updates never produce a change.
pub fn reduce(state: &mut EngineState, action: Action) -> Vec<ObjectRef> {
    match action {
        Action::UpsertCmd(cmd) => upsert_cmd(state, cmd),
        Action::DeleteCmd(name) => match state.cmds.get_mut(&name) {
            Some(cmd) if !cmd.deleting => {
                cmd.deleting = true;
                vec![ObjectRef::Cmd(name)]
            }
            Some(_) => Vec::new(),
            None => {
                debug!(cmd = %name, "delete requested for unknown cmd");
                Vec::new()
            }
        },
        Action::RemoveCmd(name) => match state.cmds.remove(&name) {
            Some(cmd) => {
                debug!(cmd = %name, "cmd removed from store");
                // The owner may be waiting for this generation to go away.
                cmd.owner
                    .map(|o| vec![ObjectRef::Manifest(o.manifest)])
                    .unwrap_or_default()
            }
            None => Vec::new(),
        },
        Action::UpdateCmdStatus { name, status } => {
            if let Some(cmd) = state.cmds.get_mut(&name) {
                cmd.status = status;
            }
            Vec::new()
        }
        Action::UpsertFileWatch(mut fw) => {
            let source = TriggerSource::FileWatch(fw.name.clone());
            match state.file_watches.entry(fw.name.clone()) {
                Entry::Occupied(mut e) => {
                    fw.last_event_time = e.get().last_event_time;
                    if *e.get() == fw {
                        return Vec::new();
                    }
                    e.insert(fw);
                }
                Entry::Vacant(e) => {
                    e.insert(fw);
                }
            }
            vec![ObjectRef::Source(source)]
        }
        Action::RecordFileEvent { name, at } => match state.file_watches.get_mut(&name) {
            Some(fw) if fw.last_event_time.is_none_or(|prev| at > prev) => {
                fw.last_event_time = Some(at);
                vec![ObjectRef::Source(TriggerSource::FileWatch(name))]
            }
            Some(_) => Vec::new(),
            None => {
                warn!(file_watch = %name, "file event for unknown file watch");
                Vec::new()
            }
        },
        Action::UpsertButton(mut button) => {
            let source = TriggerSource::UiButton(button.name.clone());
            match state.buttons.entry(button.name.clone()) {
                Entry::Occupied(mut e) => {
                    button.last_clicked_at = e.get().last_clicked_at;
                    button.input_values = e.get().input_values.clone();
                    if *e.get() == button {
                        return Vec::new();
                    }
                    e.insert(button);
                }
                Entry::Vacant(e) => {
                    e.insert(button);
                }
            }
            vec![ObjectRef::Source(source)]
        }
        Action::ClickButton { name, at, inputs } => match state.buttons.get_mut(&name) {
            Some(button) => {
                button.last_clicked_at = Some(at);
                button.input_values = inputs;
                vec![ObjectRef::Source(TriggerSource::UiButton(name))]
            }
            None => {
                warn!(button = %name, "click on unknown button");
                Vec::new()
            }
        },
        Action::UpsertConfigMap(cm) => {
            let name = cm.name.clone();
            if state.config_maps.get(&name) == Some(&cm) {
                return Vec::new();
            }
            state.config_maps.insert(name.clone(), cm);
            vec![ObjectRef::Source(TriggerSource::ConfigMap(name))]
        }
        Action::SetConfigMapKey { name, key, value } => {
            let cm = state
                .config_maps
                .entry(name.clone())
                .or_insert_with(|| ConfigMap::new(name.clone()));
            if cm.data.get(&key) == Some(&value) {
                return Vec::new();
            }
            cm.data.insert(key, value);
            vec![ObjectRef::Source(TriggerSource::ConfigMap(name))]
        }
        Action::DeleteSource(source) => {
            let removed = match &source {
                TriggerSource::FileWatch(n) => state.file_watches.remove(n).is_some(),
                TriggerSource::UiButton(n) => state.buttons.remove(n).is_some(),
                TriggerSource::ConfigMap(n) => state.config_maps.remove(n).is_some(),
                TriggerSource::Build(n) => state.manifests.remove(n).is_some(),
            };
            if removed {
                vec![ObjectRef::Source(source)]
            } else {
                Vec::new()
            }
        }
        Action::UpsertManifest(manifest) => {
            let name = manifest.name.clone();
            if state.manifests.get(&name) == Some(&manifest) {
                return Vec::new();
            }
            state.manifests.insert(name.clone(), manifest);
            vec![
                ObjectRef::Manifest(name.clone()),
                ObjectRef::Source(TriggerSource::Build(name)),
            ]
        }
        Action::BuildStarted { manifest } => match state.manifests.get_mut(&manifest) {
            Some(m) if !m.build_in_progress => {
                m.build_in_progress = true;
                build_changed(manifest)
            }
            Some(_) => Vec::new(),
            None => {
                warn!(resource = %manifest, "build started for unknown resource");
                Vec::new()
            }
        },
        Action::BuildCompleted { manifest, at } => match state.manifests.get_mut(&manifest) {
            Some(m) => {
                m.build_in_progress = false;
                m.last_deploy_at = Some(at);
                build_changed(manifest)
            }
            None => {
                warn!(resource = %manifest, "build completed for unknown resource");
                Vec::new()
            }
        },
    }
}

fn build_changed(manifest: Name) -> Vec<ObjectRef> {
    vec![
        ObjectRef::Manifest(manifest.clone()),
        ObjectRef::Source(TriggerSource::Build(manifest)),
    ]
}

fn upsert_cmd(state: &mut EngineState, cmd: Cmd) -> Vec<ObjectRef> {
    if let Some(owner) = &cmd.owner {
        let generation = state
            .serve_generations
            .entry(owner.manifest.clone())
            .or_insert(0);
        *generation = (*generation).max(owner.generation);
    }

    let name = cmd.name.clone();
    match state.cmds.entry(name.clone()) {
        Entry::Occupied(mut e) => {
            let existing = e.get_mut();
            if existing.spec == cmd.spec && existing.owner == cmd.owner {
                return Vec::new();
            }
            existing.spec = cmd.spec;
            existing.owner = cmd.owner;
        }
        Entry::Vacant(e) => {
            e.insert(cmd);
        }
    }
    vec![ObjectRef::Cmd(name)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CmdSpec, CmdState, ExecSpec};
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn cmd(name: &str, args: &[&str]) -> Cmd {
        Cmd::new(name, CmdSpec::new(ExecSpec::new(args.iter().copied())), ts(0))
    }

    #[test]
    fn status_updates_produce_no_change() {
        let mut st = EngineState::default();
        assert_eq!(
            reduce(&mut st, Action::UpsertCmd(cmd("foo", &["true"]))),
            vec![ObjectRef::Cmd("foo".into())]
        );

        let mut status = CmdStatus::default();
        status.state = CmdState::Waiting {
            reason: "x".into(),
        };
        let changes = reduce(
            &mut st,
            Action::UpdateCmdStatus {
                name: "foo".into(),
                status: status.clone(),
            },
        );
        assert!(changes.is_empty());
        assert_eq!(st.cmds["foo"].status, status);
    }

    #[test]
    fn upsert_keeps_status_and_creation_time() {
        let mut st = EngineState::default();
        reduce(&mut st, Action::UpsertCmd(cmd("foo", &["true"])));
        reduce(
            &mut st,
            Action::UpdateCmdStatus {
                name: "foo".into(),
                status: CmdStatus {
                    state: CmdState::Waiting { reason: "kept".into() },
                    ..CmdStatus::default()
                },
            },
        );

        let mut replacement = cmd("foo", &["false"]);
        replacement.created_at = ts(100);
        assert_eq!(reduce(&mut st, Action::UpsertCmd(replacement.clone())).len(), 1);
        // Same spec again is not a change.
        assert!(reduce(&mut st, Action::UpsertCmd(replacement)).is_empty());

        let stored = &st.cmds["foo"];
        assert_eq!(stored.created_at, ts(0));
        assert_eq!(stored.status.waiting_reason(), Some("kept"));
        assert_eq!(stored.spec.exec.args, vec!["false".to_string()]);
    }

    #[test]
    fn file_events_only_move_forward() {
        let mut st = EngineState::default();
        reduce(&mut st, Action::UpsertFileWatch(FileWatch::new("fw")));

        let first = reduce(
            &mut st,
            Action::RecordFileEvent {
                name: "fw".into(),
                at: ts(10),
            },
        );
        assert_eq!(first.len(), 1);

        let stale = reduce(
            &mut st,
            Action::RecordFileEvent {
                name: "fw".into(),
                at: ts(5),
            },
        );
        assert!(stale.is_empty());
        assert_eq!(st.file_watches["fw"].last_event_time, Some(ts(10)));

        // Re-declaring the watch keeps its event time.
        reduce(&mut st, Action::UpsertFileWatch(FileWatch::new("fw")));
        assert_eq!(st.file_watches["fw"].last_event_time, Some(ts(10)));
    }

    #[test]
    fn delete_marks_then_remove_drops() {
        let mut st = EngineState::default();
        reduce(&mut st, Action::UpsertCmd(cmd("foo", &["true"])));

        assert_eq!(reduce(&mut st, Action::DeleteCmd("foo".into())).len(), 1);
        assert!(reduce(&mut st, Action::DeleteCmd("foo".into())).is_empty());
        assert!(st.cmds["foo"].deleting);

        reduce(&mut st, Action::RemoveCmd("foo".into()));
        assert!(!st.cmds.contains_key("foo"));
    }

    #[test]
    fn build_lifecycle_notifies_manifest_and_build_source() {
        let mut st = EngineState::default();
        reduce(&mut st, Action::UpsertManifest(Manifest::new("api")));

        let started = reduce(&mut st, Action::BuildStarted { manifest: "api".into() });
        assert!(started.contains(&ObjectRef::Source(TriggerSource::Build("api".into()))));
        assert!(st.build_in_progress("api"));

        reduce(
            &mut st,
            Action::BuildCompleted {
                manifest: "api".into(),
                at: ts(7),
            },
        );
        assert!(!st.build_in_progress("api"));
        assert_eq!(st.manifests["api"].last_deploy_at, Some(ts(7)));
    }
}
