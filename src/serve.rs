// src/serve.rs

//! Serve controller: materialises serve resources as generation-numbered
//! `Cmd`s (`api-serve-1`, `api-serve-2`, ...).
//!
//! A generation is never replaced in place. When the serve spec or the deploy
//! changes, the current generation is marked for deletion and the next one is
//! only created once the old `Cmd` is gone. While a build is in progress
//! nothing is replaced.

use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::disable;
use crate::model::{Cmd, CmdOwner, CmdSpec, Manifest, Name};
use crate::store::{Action, Store};

#[derive(Clone)]
pub struct ServeController {
    store: Store,
    clock: SharedClock,
}

impl std::fmt::Debug for ServeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeController").finish_non_exhaustive()
    }
}

enum Plan {
    Nothing,
    Delete(Vec<Name>),
    Create(Cmd),
}

impl ServeController {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Manifests whose disable source lives in `config_map`.
    pub fn manifests_using_config_map(&self, config_map: &str) -> Vec<Name> {
        self.store.read(|st| {
            st.manifests
                .values()
                .filter(|m| {
                    m.disable_source
                        .as_ref()
                        .is_some_and(|d| d.config_map == config_map)
                })
                .map(|m| m.name.clone())
                .collect()
        })
    }

    pub fn reconcile_all(&self) {
        let names: Vec<Name> = self.store.read(|st| {
            let mut names: Vec<Name> = st.manifests.keys().cloned().collect();
            // Owners that no longer exist still need their cmds cleaned up.
            for cmd in st.cmds.values() {
                if let Some(owner) = &cmd.owner {
                    if !names.contains(&owner.manifest) {
                        names.push(owner.manifest.clone());
                    }
                }
            }
            names
        });
        for name in names {
            self.reconcile(&name);
        }
    }

    pub fn reconcile(&self, manifest: &str) {
        let now = self.clock.now();
        let plan = self.store.read(|st| {
            let owned = st.cmds_owned_by(manifest);
            let live: Vec<&Cmd> = owned.iter().copied().filter(|c| !c.deleting).collect();
            let draining = owned.iter().any(|c| c.deleting);

            let Some(m) = st.manifests.get(manifest).filter(|m| m.serve.is_some()) else {
                return delete_all(&live);
            };
            if disable::resolve(m.disable_source.as_ref(), st).is_disabled() {
                return delete_all(&live);
            }
            if m.build_in_progress {
                return Plan::Nothing;
            }

            let desired = desired_spec(m);
            let current = live.last().copied();
            match current {
                Some(cur) if is_current(cur, m, &desired) => {
                    // Older generations left behind.
                    delete_all(&live[..live.len() - 1])
                }
                Some(_) => delete_all(&live),
                None if draining => Plan::Nothing,
                None => {
                    let generation = st.serve_generations.get(manifest).copied().unwrap_or(0) + 1;
                    let mut cmd = Cmd::new(m.serve_cmd_name(generation), desired, now);
                    cmd.owner = Some(CmdOwner {
                        manifest: manifest.to_string(),
                        generation,
                        deployed_at: m.last_deploy_at,
                    });
                    Plan::Create(cmd)
                }
            }
        });

        match plan {
            Plan::Nothing => {}
            Plan::Delete(names) => {
                for name in names {
                    info!(resource = %manifest, cmd = %name, "retiring serve cmd");
                    self.store.dispatch(Action::DeleteCmd(name));
                }
            }
            Plan::Create(cmd) => {
                info!(resource = %manifest, cmd = %cmd.name, "creating serve cmd");
                self.store.dispatch(Action::UpsertCmd(cmd));
            }
        }
        debug!(resource = %manifest, "serve reconcile done");
    }
}

fn delete_all(cmds: &[&Cmd]) -> Plan {
    if cmds.is_empty() {
        Plan::Nothing
    } else {
        Plan::Delete(cmds.iter().map(|c| c.name.clone()).collect())
    }
}

fn desired_spec(m: &Manifest) -> CmdSpec {
    match &m.serve {
        Some(serve) => CmdSpec::new(serve.exec.clone()),
        None => CmdSpec::default(),
    }
}

fn is_current(cmd: &Cmd, m: &Manifest, desired: &CmdSpec) -> bool {
    cmd.spec == *desired
        && cmd
            .owner
            .as_ref()
            .is_some_and(|o| o.deployed_at == m.last_deploy_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::model::ExecSpec;
    use chrono::{TimeZone, Utc};

    fn setup(script: &str) -> (Store, ServeController) {
        let store = Store::default();
        let mut m = Manifest::new("foo").with_serve(ExecSpec::shell(script));
        m.last_deploy_at = Some(Utc.timestamp_opt(1, 0).unwrap());
        store.dispatch(Action::UpsertManifest(m));
        let serve = ServeController::new(store.clone(), clock::system());
        (store, serve)
    }

    fn cmd_names(store: &Store) -> Vec<Name> {
        store.read(|st| st.cmds.keys().cloned().collect())
    }

    #[test]
    fn creates_first_generation() {
        let (store, serve) = setup("true");
        serve.reconcile("foo");
        assert_eq!(cmd_names(&store), vec!["foo-serve-1".to_string()]);

        // Idempotent.
        serve.reconcile("foo");
        assert_eq!(cmd_names(&store), vec!["foo-serve-1".to_string()]);
    }

    #[test]
    fn spec_change_retires_before_replacing() {
        let (store, serve) = setup("true");
        serve.reconcile("foo");

        let mut m = store.read(|st| st.manifests["foo"].clone());
        m.serve = Some(crate::model::ServeTarget {
            exec: ExecSpec::shell("false"),
        });
        store.dispatch(Action::UpsertManifest(m));
        serve.reconcile("foo");

        assert!(store.cmd("foo-serve-1").unwrap().deleting);
        // Replacement waits for removal.
        serve.reconcile("foo");
        assert_eq!(cmd_names(&store), vec!["foo-serve-1".to_string()]);

        store.dispatch(Action::RemoveCmd("foo-serve-1".into()));
        serve.reconcile("foo");
        let next = store.cmd("foo-serve-2").unwrap();
        assert_eq!(next.spec.exec.display(), "false");
    }

    #[test]
    fn build_in_progress_holds_replacement() {
        let (store, serve) = setup("true");
        serve.reconcile("foo");

        store.dispatch(Action::BuildStarted {
            manifest: "foo".into(),
        });
        serve.reconcile("foo");
        assert!(!store.cmd("foo-serve-1").unwrap().deleting);

        store.dispatch(Action::BuildCompleted {
            manifest: "foo".into(),
            at: Utc.timestamp_opt(2, 0).unwrap(),
        });
        serve.reconcile("foo");
        assert!(store.cmd("foo-serve-1").unwrap().deleting);
    }

    #[test]
    fn removed_manifest_orphans_are_deleted() {
        let (store, serve) = setup("true");
        serve.reconcile("foo");
        store.dispatch(Action::DeleteSource(crate::model::TriggerSource::Build(
            "foo".into(),
        )));
        serve.reconcile_all();
        assert!(store.cmd("foo-serve-1").unwrap().deleting);
    }
}
