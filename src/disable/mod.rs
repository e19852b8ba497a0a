// src/disable/mod.rs

//! Resolves a `Cmd`'s disable source against the config maps in the store.
//!
//! Only `Disabled` blocks a command. A missing config map (`Pending`) and an
//! unparseable value (`Error`) are reported on the status but leave the
//! command free to run.

use crate::model::{DisableSource, DisableState, DisableStatus};
use crate::store::EngineState;

pub const NO_SOURCE_REASON: &str = "no disable source";

pub fn resolve(source: Option<&DisableSource>, state: &EngineState) -> DisableStatus {
    let Some(source) = source else {
        return DisableStatus::new(DisableState::Enabled, NO_SOURCE_REASON);
    };

    let Some(cm) = state.config_maps.get(&source.config_map) else {
        return DisableStatus::new(
            DisableState::Pending,
            format!("ConfigMap {:?} does not exist", source.config_map),
        );
    };

    let Some(raw) = cm.data.get(&source.key) else {
        return DisableStatus::new(
            DisableState::Error,
            format!(
                "ConfigMap {:?} has no key {:?}",
                source.config_map, source.key
            ),
        );
    };

    match parse_bool(raw) {
        Some(true) => DisableStatus::new(
            DisableState::Disabled,
            format!(
                "ConfigMap {:?} key {:?} is true",
                source.config_map, source.key
            ),
        ),
        Some(false) => DisableStatus::new(
            DisableState::Enabled,
            format!(
                "ConfigMap {:?} key {:?} is false",
                source.config_map, source.key
            ),
        ),
        None => DisableStatus::new(
            DisableState::Error,
            format!(
                "ConfigMap {:?} key {:?} has non-boolean value {raw:?}",
                source.config_map, source.key
            ),
        ),
    }
}

/// Accepts the usual spellings: `1 t T TRUE true True` and their negatives.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigMap;

    fn source() -> DisableSource {
        DisableSource {
            config_map: "toggle".into(),
            key: "isDisabled".into(),
        }
    }

    fn state_with(value: Option<&str>) -> EngineState {
        let mut st = EngineState::default();
        let mut cm = ConfigMap::new("toggle");
        if let Some(v) = value {
            cm = cm.with("isDisabled", v);
        }
        st.config_maps.insert("toggle".into(), cm);
        st
    }

    #[test]
    fn no_source_is_enabled() {
        let st = EngineState::default();
        assert_eq!(resolve(None, &st).state, DisableState::Enabled);
    }

    #[test]
    fn missing_config_map_is_pending() {
        let st = EngineState::default();
        let status = resolve(Some(&source()), &st);
        assert_eq!(status.state, DisableState::Pending);
        assert!(status.reason.contains("does not exist"));
    }

    #[test]
    fn boolean_values_resolve() {
        assert_eq!(
            resolve(Some(&source()), &state_with(Some("true"))).state,
            DisableState::Disabled
        );
        assert_eq!(
            resolve(Some(&source()), &state_with(Some("False"))).state,
            DisableState::Enabled
        );
    }

    #[test]
    fn garbage_or_missing_key_is_error() {
        assert_eq!(
            resolve(Some(&source()), &state_with(Some("maybe"))).state,
            DisableState::Error
        );
        assert_eq!(
            resolve(Some(&source()), &state_with(None)).state,
            DisableState::Error
        );
    }
}
