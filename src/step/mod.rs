//! The step contract and the built-in step catalog.
//!
//! A [`Step`] transforms, validates or parses a single [`Value`]. Fields thread a value through an
//! ordered list of steps; see [`crate::field::Field::ingest`] for how step outcomes are combined.
//!
//! Built-in steps:
//!
//! - parsers ([`parse`]): [`IntegerParser`], [`FloatParser`], [`BoolParser`], [`DateParser`],
//!   [`DatetimeParser`]
//! - validators ([`validate`]): [`RegexValidator`]
//! - transformations ([`transform`]): [`Truncate`], [`RegexReplace`], [`DefaultValue`],
//!   [`DictionaryLookup`]
//!
//! Ad-hoc steps can be built from closures with [`FnStep`].

pub mod parse;
pub mod transform;
pub mod validate;

use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::types::Value;

pub use parse::{BoolParser, DateParser, DatetimeParser, FloatParser, IntegerParser};
pub use transform::{DefaultAction, DefaultValue, DictionaryLookup, RegexReplace, Truncate};
pub use validate::RegexValidator;

/// Classification of a step. Used for documentation only; it never changes behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Validation,
    Transformation,
    Parser,
}

/// Result of applying a step to a value.
///
/// When `success` is `false` the value is conventionally [`Value::Null`] and callers must not rely
/// on it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub value: Value,
    pub success: bool,
    pub diagnostic: Option<Diagnostic>,
}

impl StepOutcome {
    /// Successful application with no diagnostic.
    pub fn ok(value: Value) -> Self {
        Self {
            value,
            success: true,
            diagnostic: None,
        }
    }

    /// Successful application that still wants to report something (usually `Info`/`Warning`).
    pub fn ok_with(value: Value, diagnostic: Diagnostic) -> Self {
        Self {
            value,
            success: true,
            diagnostic: Some(diagnostic),
        }
    }

    /// Failed application with an `Error` diagnostic carrying `text`.
    pub fn fail(text: impl Into<String>) -> Self {
        Self {
            value: Value::Null,
            success: false,
            diagnostic: Some(Diagnostic::error(text)),
        }
    }

    /// Failed application without a diagnostic; the field synthesizes one.
    pub fn fail_silently() -> Self {
        Self {
            value: Value::Null,
            success: false,
            diagnostic: None,
        }
    }
}

/// An unexpected fault inside a step.
///
/// This is not a data problem: the field pipeline turns it into an `InternalError` diagnostic and
/// stops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A unit of single-value transformation, validation or parsing.
///
/// Steps hold only immutable configuration and must not remember anything between calls: one
/// instance is shared by every record of every run, possibly across worker threads.
pub trait Step: Send + Sync {
    /// Classification of the step.
    fn kind(&self) -> StepKind;

    /// Type name used to derive [`Step::name`].
    fn type_name(&self) -> &'static str;

    /// Constructor parameters, in declaration order.
    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        Vec::new()
    }

    /// Human-readable name, e.g. `Truncate(length=10)`. Used in generated diagnostics.
    fn name(&self) -> String {
        format_step_name(self.type_name(), &self.parameters())
    }

    /// Longer description of what the step does.
    fn description(&self) -> String {
        String::new()
    }

    /// Apply the step to one value.
    ///
    /// Return `Err` only for unexpected internal faults; ordinary bad input is reported as a
    /// failed [`StepOutcome`].
    fn apply(&self, value: Value) -> Result<StepOutcome, StepError>;
}

impl fmt::Debug for dyn Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Render `Name(k=v, ...)`; parameter values are rendered as JSON.
pub fn format_step_name(type_name: &str, parameters: &[(&'static str, serde_json::Value)]) -> String {
    if parameters.is_empty() {
        return type_name.to_string();
    }
    let formatted = parameters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{type_name}({formatted})")
}

/// JSON rendering of a [`Value`] for step parameters.
pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int64(v) => serde_json::Value::from(*v),
        Value::Float64(v) => serde_json::Value::from(*v),
        Value::Bool(v) => serde_json::Value::from(*v),
        Value::Utf8(s) => serde_json::Value::from(s.as_str()),
        Value::Date(d) => serde_json::Value::from(d.to_string()),
        Value::Datetime(dt) => serde_json::Value::from(dt.to_string()),
    }
}

/// A step backed by a closure.
///
/// ```rust
/// use record_ingest::step::{FnStep, Step, StepKind, StepOutcome};
/// use record_ingest::types::Value;
///
/// let upper = FnStep::new("Uppercase", StepKind::Transformation, |v| {
///     Ok(match v {
///         Value::Utf8(s) => StepOutcome::ok(Value::Utf8(s.to_uppercase())),
///         Value::Null => StepOutcome::ok(Value::Null),
///         other => StepOutcome::fail(format!("cannot uppercase {}", other.type_name())),
///     })
/// });
/// assert_eq!(upper.name(), "Uppercase");
/// ```
pub struct FnStep<F> {
    name: String,
    kind: StepKind,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(Value) -> Result<StepOutcome, StepError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, kind: StepKind, func: F) -> Self {
        Self {
            name: name.into(),
            kind,
            func,
        }
    }
}

impl<F> Step for FnStep<F>
where
    F: Fn(Value) -> Result<StepOutcome, StepError> + Send + Sync,
{
    fn kind(&self) -> StepKind {
        self.kind
    }

    fn type_name(&self) -> &'static str {
        "FnStep"
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        (self.func)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_without_parameters_is_type_name() {
        assert_eq!(format_step_name("IntegerParser", &[]), "IntegerParser");
    }

    #[test]
    fn name_renders_parameters_as_json() {
        let name = format_step_name(
            "RegexReplace",
            &[
                ("pattern", serde_json::json!("\\s+")),
                ("replacement", serde_json::json!(" ")),
            ],
        );
        assert_eq!(name, r#"RegexReplace(pattern="\\s+", replacement=" ")"#);
    }

    #[test]
    fn fn_step_uses_given_name_and_closure() {
        let step = FnStep::new("Always", StepKind::Validation, |v| Ok(StepOutcome::ok(v)));
        assert_eq!(step.name(), "Always");
        assert_eq!(step.kind(), StepKind::Validation);
        assert_eq!(step.apply(Value::Int64(3)).unwrap(), StepOutcome::ok(Value::Int64(3)));
    }
}
