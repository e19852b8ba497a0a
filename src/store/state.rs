// src/store/state.rs

use std::collections::BTreeMap;

use crate::model::{Cmd, ConfigMap, FileWatch, Manifest, Name, UiButton};

/// Everything the controllers know about, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub cmds: BTreeMap<Name, Cmd>,
    pub file_watches: BTreeMap<Name, FileWatch>,
    pub buttons: BTreeMap<Name, UiButton>,
    pub config_maps: BTreeMap<Name, ConfigMap>,
    pub manifests: BTreeMap<Name, Manifest>,
    /// Highest serve generation handed out per manifest.
    pub serve_generations: BTreeMap<Name, u64>,
}

impl EngineState {
    pub fn build_in_progress(&self, manifest: &str) -> bool {
        self.manifests
            .get(manifest)
            .is_some_and(|m| m.build_in_progress)
    }

    /// Commands generated for `manifest`, oldest generation first.
    pub fn cmds_owned_by(&self, manifest: &str) -> Vec<&Cmd> {
        let mut owned: Vec<&Cmd> = self
            .cmds
            .values()
            .filter(|c| c.owner.as_ref().is_some_and(|o| o.manifest == manifest))
            .collect();
        owned.sort_by_key(|c| c.owner.as_ref().map(|o| o.generation));
        owned
    }
}
