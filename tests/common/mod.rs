#![allow(dead_code)]

use std::error::Error;

use cmdctl::model::{UiInputStatus, UiInputValue};

pub use cmdctl_test_utils::{CmdBuilder, Harness, init_tracing, wait_for, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

pub fn text(name: &str, value: &str) -> UiInputStatus {
    UiInputStatus {
        name: name.to_string(),
        value: UiInputValue::Text(value.to_string()),
    }
}
