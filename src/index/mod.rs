// src/index/mod.rs

//! Reverse index from trigger sources to the commands that depend on them.
//!
//! Registration is replaced wholesale per command whenever its spec is seen,
//! so declaration edits update the index without ever counting as triggers.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::model::{Cmd, Name, TriggerSource};

#[derive(Debug, Default)]
pub struct TriggerIndex {
    by_source: HashMap<TriggerSource, BTreeSet<Name>>,
    by_cmd: HashMap<Name, Vec<TriggerSource>>,
}

impl TriggerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every source whose change should re-reconcile `cmd`.
    pub fn sources_for(cmd: &Cmd) -> Vec<TriggerSource> {
        let mut sources = cmd.spec.trigger_sources();
        if let Some(ds) = &cmd.spec.disable_source {
            let src = TriggerSource::ConfigMap(ds.config_map.clone());
            if !sources.contains(&src) {
                sources.push(src);
            }
        }
        if let Some(owner) = &cmd.owner {
            sources.push(TriggerSource::Build(owner.manifest.clone()));
        }
        sources
    }

    pub fn update(&mut self, cmd: &Cmd) {
        self.update_sources(&cmd.name, Self::sources_for(cmd));
    }

    /// Replace the registration of `name` with `sources`.
    pub fn update_sources(&mut self, name: &str, sources: Vec<TriggerSource>) {
        if self.by_cmd.get(name) == Some(&sources) {
            return;
        }
        self.remove(name);
        for src in &sources {
            self.by_source
                .entry(src.clone())
                .or_default()
                .insert(name.to_string());
        }
        trace!(cmd = %name, count = sources.len(), "trigger index updated");
        self.by_cmd.insert(name.to_string(), sources);
    }

    pub fn remove(&mut self, name: &str) {
        let Some(sources) = self.by_cmd.remove(name) else {
            return;
        };
        for src in sources {
            if let Some(dependents) = self.by_source.get_mut(&src) {
                dependents.remove(name);
                if dependents.is_empty() {
                    self.by_source.remove(&src);
                }
            }
        }
    }

    /// Commands depending on `source`, sorted by name.
    pub fn affected(&self, source: &TriggerSource) -> Vec<Name> {
        self.by_source
            .get(source)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cmd.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CmdOwner, CmdSpec, DisableSource, ExecSpec, RestartOnSpec, StartOnSpec};
    use chrono::Utc;

    fn cmd_with(start: &[&str], restart_fw: &[&str]) -> Cmd {
        let spec = CmdSpec {
            start_on: Some(StartOnSpec {
                buttons: start.iter().map(|s| s.to_string()).collect(),
                start_after: None,
            }),
            restart_on: Some(RestartOnSpec {
                buttons: Vec::new(),
                file_watches: restart_fw.iter().map(|s| s.to_string()).collect(),
            }),
            disable_source: Some(DisableSource {
                config_map: "toggle".into(),
                key: "isDisabled".into(),
            }),
            ..CmdSpec::new(ExecSpec::new(["true"]))
        };
        Cmd::new("foo", spec, Utc::now())
    }

    #[test]
    fn update_registers_every_declared_source() {
        let mut idx = TriggerIndex::new();
        let mut cmd = cmd_with(&["b-1"], &["fw-1"]);
        cmd.owner = Some(CmdOwner {
            manifest: "api".into(),
            generation: 1,
            deployed_at: None,
        });
        idx.update(&cmd);

        for src in [
            TriggerSource::UiButton("b-1".into()),
            TriggerSource::FileWatch("fw-1".into()),
            TriggerSource::ConfigMap("toggle".into()),
            TriggerSource::Build("api".into()),
        ] {
            assert_eq!(idx.affected(&src), vec!["foo".to_string()], "{src}");
        }
    }

    #[test]
    fn update_replaces_previous_registration() {
        let mut idx = TriggerIndex::new();
        idx.update(&cmd_with(&["b-1"], &[]));
        idx.update(&cmd_with(&["b-2"], &[]));

        assert!(idx.affected(&TriggerSource::UiButton("b-1".into())).is_empty());
        assert_eq!(idx.affected(&TriggerSource::UiButton("b-2".into())).len(), 1);
    }

    #[test]
    fn remove_purges_all_entries() {
        let mut idx = TriggerIndex::new();
        idx.update(&cmd_with(&["b-1"], &["fw-1"]));
        idx.remove("foo");

        assert!(idx.is_empty());
        assert!(idx.affected(&TriggerSource::FileWatch("fw-1".into())).is_empty());
    }
}
