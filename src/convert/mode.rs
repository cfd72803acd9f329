//! Mode handling
//!
//! Applies the run's target state to the assembled task sequence and turns
//! shell-style variable references into Ansible environment lookups.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_yaml::Value;

use crate::domain::{ConversionContext, State, Task};

use super::Warnings;

/// Compose interpolation: `$$`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
/// `$VAR`, and any other braced form, which is left alone
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)(?::?-([^}]*))?\}|([A-Za-z_][A-Za-z0-9_]*)|(\{[^}]*\}))",
    )
    .expect("valid env reference pattern")
});

/// Applies state and secret policy to a full task sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeController {
    state: State,
}

impl ModeController {
    /// Creates the controller, warning about options without effect
    pub fn new(ctx: &ConversionContext, warnings: &mut Warnings) -> Self {
        if ctx.state == State::Absent && ctx.secret_exists_explicit {
            warnings.push(
                "option --secret-exists",
                format!(
                    "'{}' has no effect with --state absent and is ignored",
                    ctx.secret_exists.as_param()
                ),
            );
        }
        Self { state: ctx.state }
    }

    /// Finalizes the creation-ordered tasks for this mode
    ///
    /// Teardown runs the exact reverse of creation, so dependents go before
    /// the services, networks and secrets they need.
    pub fn apply(&self, mut tasks: Vec<Task>, warnings: &mut Warnings) -> Vec<Task> {
        if self.state == State::Absent {
            tasks.reverse();
        }
        for task in &mut tasks {
            let mut unsupported = Vec::new();
            task.name = substitute_text(&task.name, &mut unsupported);
            for (_, value) in task.params.iter_mut() {
                unsupported.extend(substitute_env(value));
            }
            unsupported.dedup();
            for reference in unsupported {
                warnings.push(
                    format!("task {}", task.name),
                    format!("unsupported variable reference '{}' left as is", reference),
                );
            }
        }
        tasks
    }
}

/// Replaces variable references in every string of a value
///
/// Returns the braced references that have no lookup equivalent, such as
/// `${VAR:?message}`. Those stay in the value unchanged.
pub fn substitute_env(value: &mut Value) -> Vec<String> {
    let mut unsupported = Vec::new();
    substitute_in(value, &mut unsupported);
    unsupported
}

fn substitute_in(value: &mut Value, unsupported: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            if text.contains('$') {
                *text = substitute_text(text, unsupported);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_in(item, unsupported);
            }
        }
        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                substitute_in(item, unsupported);
            }
        }
        Value::Tagged(tagged) => substitute_in(&mut tagged.value, unsupported),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn substitute_text(text: &str, unsupported: &mut Vec<String>) -> String {
    ENV_REFERENCE
        .replace_all(text, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            if let Some(name) = caps.get(2).or_else(|| caps.get(4)) {
                return match caps.get(3) {
                    Some(default) => format!(
                        "{{{{ lookup('env', '{}') | default('{}', true) }}}}",
                        name.as_str(),
                        default.as_str().replace('\\', "\\\\").replace('\'', "\\'")
                    ),
                    None => format!("{{{{ lookup('env', '{}') }}}}", name.as_str()),
                };
            }
            unsupported.push(caps[0].to_string());
            caps[0].to_string()
        })
        .into_owned()
}
