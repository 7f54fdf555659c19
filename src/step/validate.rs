//! Validator steps: pass the value through unchanged or fail.

use regex::Regex;

use super::{Step, StepError, StepKind, StepOutcome};
use crate::error::IngestionResult;
use crate::types::Value;

/// Validates that the whole string matches a regular expression.
///
/// The pattern is anchored at both ends. One leading `^` and one trailing unescaped `$` in the
/// supplied pattern are accepted and ignored; an escaped `\$` stays a literal dollar sign.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    pattern: String,
    compiled: Regex,
}

impl RegexValidator {
    pub fn new(pattern: impl Into<String>) -> IngestionResult<Self> {
        let pattern = pattern.into();
        let compiled = Regex::new(&format!("^(?:{})$", strip_anchors(&pattern)))?;
        Ok(Self { pattern, compiled })
    }
}

fn strip_anchors(pattern: &str) -> &str {
    let inner = pattern.strip_prefix('^').unwrap_or(pattern);
    match inner.strip_suffix('$') {
        // An odd run of backslashes before the `$` escapes it.
        Some(rest) if (rest.len() - rest.trim_end_matches('\\').len()) % 2 == 0 => rest,
        _ => inner,
    }
}

impl Step for RegexValidator {
    fn kind(&self) -> StepKind {
        StepKind::Validation
    }

    fn type_name(&self) -> &'static str {
        "RegexValidator"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![("pattern", serde_json::Value::from(self.pattern.as_str()))]
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be validated"),
            Value::Utf8(s) => {
                if self.compiled.is_match(&s) {
                    StepOutcome::ok(Value::Utf8(s))
                } else {
                    StepOutcome::fail(format!(
                        "String {s:?} does not match regex pattern {:?}",
                        self.pattern
                    ))
                }
            }
            other => StepOutcome::fail(format!(
                "Cannot use regex to validate non-string, got {}",
                other.type_name()
            )),
        })
    }
}
