// src/model/source.rs

//! Trigger sources a `Cmd` can depend on.
//!
//! These objects are written by collaborators (the file watcher, the control
//! channel, config loading). The reconciler only ever reads them.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Name, Timestamp};

/// Stable identity of something that can cause a `Cmd` to be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerSource {
    FileWatch(Name),
    UiButton(Name),
    ConfigMap(Name),
    /// Build lifecycle of a serve resource; lets a finished build release
    /// restarts it held back.
    Build(Name),
}

impl TriggerSource {
    pub fn name(&self) -> &str {
        match self {
            TriggerSource::FileWatch(n)
            | TriggerSource::UiButton(n)
            | TriggerSource::ConfigMap(n)
            | TriggerSource::Build(n) => n,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TriggerSource::FileWatch(_) => "filewatch",
            TriggerSource::UiButton(_) => "uibutton",
            TriggerSource::ConfigMap(_) => "configmap",
            TriggerSource::Build(_) => "build",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

/// A set of watched paths. The watcher stamps `last_event_time`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileWatch {
    pub name: Name,
    pub paths: Vec<String>,
    pub ignore: Vec<String>,
    pub last_event_time: Option<Timestamp>,
}

impl FileWatch {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Declared input on a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiInputSpec {
    pub name: String,
    pub kind: UiInputKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiInputKind {
    Text {
        default: Option<String>,
    },
    Bool {
        default: bool,
        /// `None` renders as `"true"`; `Some("")` renders as the empty string.
        true_string: Option<String>,
        false_string: Option<String>,
    },
    Hidden {
        value: String,
    },
    Choice {
        choices: Vec<String>,
    },
}

/// Value the user submitted for an input with the last click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiInputValue {
    Text(String),
    Bool(bool),
    Hidden(String),
    Choice(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiInputStatus {
    pub name: String,
    pub value: UiInputValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiButton {
    pub name: Name,
    pub inputs: Vec<UiInputSpec>,
    pub last_clicked_at: Option<Timestamp>,
    /// Snapshot of input values taken with `last_clicked_at`.
    pub input_values: Vec<UiInputStatus>,
}

impl UiButton {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn input_value(&self, name: &str) -> Option<&UiInputValue> {
        self.input_values
            .iter()
            .find(|i| i.name == name)
            .map(|i| &i.value)
    }
}

/// String key/value data; some keys are read as booleans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigMap {
    pub name: Name,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
