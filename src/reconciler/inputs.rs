// src/reconciler/inputs.rs

//! Button input values rendered as environment variables.

use crate::model::{UiButton, UiInputKind, UiInputSpec, UiInputValue};

/// `NAME=value` for every input declared on `button`, in declaration order,
/// using the values captured with its last click.
pub fn button_env(button: &UiButton) -> Vec<String> {
    button
        .inputs
        .iter()
        .map(|spec| {
            let value = render(spec, button.input_value(&spec.name));
            format!("{}={}", spec.name, value)
        })
        .collect()
}

fn render(spec: &UiInputSpec, value: Option<&UiInputValue>) -> String {
    match &spec.kind {
        UiInputKind::Text { default } => match value {
            Some(UiInputValue::Text(v)) => v.clone(),
            _ => default.clone().unwrap_or_default(),
        },
        UiInputKind::Bool {
            default,
            true_string,
            false_string,
        } => {
            let on = match value {
                Some(UiInputValue::Bool(b)) => *b,
                _ => *default,
            };
            if on {
                true_string.clone().unwrap_or_else(|| "true".to_string())
            } else {
                false_string.clone().unwrap_or_else(|| "false".to_string())
            }
        }
        UiInputKind::Hidden { value } => value.clone(),
        UiInputKind::Choice { choices } => match value {
            Some(UiInputValue::Choice(v)) if choices.contains(v) => v.clone(),
            _ => choices.first().cloned().unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UiInputStatus;

    fn button(kind: UiInputKind, value: Option<UiInputValue>) -> UiButton {
        let mut b = UiButton::new("b-1");
        b.inputs.push(UiInputSpec {
            name: "dry_run".into(),
            kind,
        });
        if let Some(value) = value {
            b.input_values.push(UiInputStatus {
                name: "dry_run".into(),
                value,
            });
        }
        b
    }

    fn bool_kind(t: Option<&str>, f: Option<&str>) -> UiInputKind {
        UiInputKind::Bool {
            default: false,
            true_string: t.map(str::to_string),
            false_string: f.map(str::to_string),
        }
    }

    #[test]
    fn text_inputs_use_submitted_values() {
        let mut b = UiButton::new("b-1");
        for (name, value) in [("foo", "bar"), ("baz", "wait what comes next")] {
            b.inputs.push(UiInputSpec {
                name: name.into(),
                kind: UiInputKind::Text { default: None },
            });
            b.input_values.push(UiInputStatus {
                name: name.into(),
                value: UiInputValue::Text(value.into()),
            });
        }
        assert_eq!(button_env(&b), vec!["foo=bar", "baz=wait what comes next"]);
    }

    #[test]
    fn bool_inputs_render_custom_strings() {
        let cases = [
            (bool_kind(None, None), true, "true"),
            (bool_kind(Some("custom value"), None), true, "custom value"),
            (bool_kind(None, None), false, "false"),
            (bool_kind(None, Some("ooh la la")), false, "ooh la la"),
            (bool_kind(None, Some("")), false, ""),
        ];
        for (kind, value, expected) in cases {
            let b = button(kind, Some(UiInputValue::Bool(value)));
            assert_eq!(button_env(&b), vec![format!("dry_run={expected}")]);
        }
    }

    #[test]
    fn hidden_inputs_use_declared_value() {
        let b = button(
            UiInputKind::Hidden {
                value: "secret".into(),
            },
            Some(UiInputValue::Hidden("ignored".into())),
        );
        assert_eq!(button_env(&b), vec!["dry_run=secret"]);
    }

    #[test]
    fn choice_inputs_fall_back_to_first_choice() {
        let kind = || UiInputKind::Choice {
            choices: vec!["choice1".into(), "choice2".into()],
        };
        let cases = [
            ("", "choice1"),
            ("not in choices", "choice1"),
            ("choice1", "choice1"),
            ("choice2", "choice2"),
        ];
        for (value, expected) in cases {
            let b = button(kind(), Some(UiInputValue::Choice(value.into())));
            assert_eq!(button_env(&b), vec![format!("dry_run={expected}")]);
        }
    }
}
