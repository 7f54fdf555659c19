//! Parser steps: turn trimmed text into typed values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::{Step, StepError, StepKind, StepOutcome};
use crate::types::Value;

/// Parses text as a 64-bit signed integer. Integer input passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerParser;

impl Step for IntegerParser {
    fn kind(&self) -> StepKind {
        StepKind::Parser
    }

    fn type_name(&self) -> &'static str {
        "IntegerParser"
    }

    fn description(&self) -> String {
        "Parses the value as a 64-bit signed integer.".to_string()
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be parsed as int64"),
            Value::Int64(v) => StepOutcome::ok(Value::Int64(v)),
            Value::Utf8(s) => match s.parse::<i64>() {
                Ok(v) => StepOutcome::ok(Value::Int64(v)),
                Err(e) => StepOutcome::fail(format!("Unable to parse {s:?} as int64: {e}")),
            },
            other => StepOutcome::fail(format!("Cannot parse {} as int64", other.type_name())),
        })
    }
}

/// Parses text as a 64-bit float. Integer input is widened.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatParser;

impl Step for FloatParser {
    fn kind(&self) -> StepKind {
        StepKind::Parser
    }

    fn type_name(&self) -> &'static str {
        "FloatParser"
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be parsed as float64"),
            Value::Float64(v) => StepOutcome::ok(Value::Float64(v)),
            Value::Int64(v) => StepOutcome::ok(Value::Float64(v as f64)),
            Value::Utf8(s) => match s.parse::<f64>() {
                Ok(v) => StepOutcome::ok(Value::Float64(v)),
                Err(e) => StepOutcome::fail(format!("Unable to parse {s:?} as float64: {e}")),
            },
            other => StepOutcome::fail(format!("Cannot parse {} as float64", other.type_name())),
        })
    }
}

/// Parses common boolean spellings (`true/false`, `t/f`, `1/0`, `yes/no`, `y/n`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolParser;

impl Step for BoolParser {
    fn kind(&self) -> StepKind {
        StepKind::Parser
    }

    fn type_name(&self) -> &'static str {
        "BoolParser"
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be parsed as bool"),
            Value::Bool(b) => StepOutcome::ok(Value::Bool(b)),
            Value::Utf8(s) => match parse_bool(&s) {
                Some(b) => StepOutcome::ok(Value::Bool(b)),
                None => StepOutcome::fail(format!(
                    "Unable to parse {s:?} as bool (expected true/false/1/0/yes/no)"
                )),
            },
            other => StepOutcome::fail(format!("Cannot parse {} as bool", other.type_name())),
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parses a calendar date using a `chrono` format string (default `%Y-%m-%d`).
#[derive(Debug, Clone)]
pub struct DateParser {
    format: String,
}

impl DateParser {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new("%Y-%m-%d")
    }
}

impl Step for DateParser {
    fn kind(&self) -> StepKind {
        StepKind::Parser
    }

    fn type_name(&self) -> &'static str {
        "DateParser"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![("format", serde_json::Value::from(self.format.as_str()))]
    }

    fn description(&self) -> String {
        format!("Parses temporal data as a date using `{}`.", self.format)
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be parsed as temporal data"),
            Value::Date(d) => StepOutcome::ok(Value::Date(d)),
            Value::Utf8(s) => match NaiveDate::parse_from_str(&s, &self.format) {
                Ok(d) => StepOutcome::ok(Value::Date(d)),
                Err(_) => StepOutcome::fail(temporal_mismatch(&self.format)),
            },
            other => StepOutcome::fail(format!("Cannot parse {} as date", other.type_name())),
        })
    }
}

/// Parses a date-time using a `chrono` format string (default `%Y-%m-%dT%H:%M:%S%z`).
///
/// Formats with an offset specifier produce the UTC equivalent; formats without one are taken
/// as UTC already.
#[derive(Debug, Clone)]
pub struct DatetimeParser {
    format: String,
}

impl DatetimeParser {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    fn has_offset(&self) -> bool {
        ["%z", "%:z", "%::z", "%#z"]
            .iter()
            .any(|directive| self.format.contains(directive))
    }

    fn parse(&self, s: &str) -> Option<NaiveDateTime> {
        if self.has_offset() {
            DateTime::parse_from_str(s, &self.format)
                .ok()
                .map(|dt| dt.naive_utc())
        } else {
            NaiveDateTime::parse_from_str(s, &self.format).ok()
        }
    }
}

impl Default for DatetimeParser {
    fn default() -> Self {
        Self::new("%Y-%m-%dT%H:%M:%S%z")
    }
}

impl Step for DatetimeParser {
    fn kind(&self) -> StepKind {
        StepKind::Parser
    }

    fn type_name(&self) -> &'static str {
        "DatetimeParser"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![("format", serde_json::Value::from(self.format.as_str()))]
    }

    fn description(&self) -> String {
        format!("Parses temporal data as a UTC date-time using `{}`.", self.format)
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Null value cannot be parsed as temporal data"),
            Value::Datetime(dt) => StepOutcome::ok(Value::Datetime(dt)),
            Value::Utf8(s) => match self.parse(&s) {
                Some(dt) => StepOutcome::ok(Value::Datetime(dt)),
                None => StepOutcome::fail(temporal_mismatch(&self.format)),
            },
            other => StepOutcome::fail(format!("Cannot parse {} as datetime", other.type_name())),
        })
    }
}

fn temporal_mismatch(format: &str) -> String {
    format!("Temporal data does not match format {format:?}, or resulting date/datetime is invalid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn integer_parser_parses_and_rejects() {
        let ok = IntegerParser.apply(Value::from("42")).unwrap();
        assert_eq!(ok, StepOutcome::ok(Value::Int64(42)));

        let bad = IntegerParser.apply(Value::from("4x2")).unwrap();
        assert!(!bad.success);
        assert_eq!(bad.value, Value::Null);
        assert!(bad.diagnostic.unwrap().text().contains("\"4x2\""));

        let null = IntegerParser.apply(Value::Null).unwrap();
        assert!(!null.success);
    }

    #[test]
    fn float_parser_widens_integers() {
        assert_eq!(
            FloatParser.apply(Value::Int64(2)).unwrap().value,
            Value::Float64(2.0)
        );
        assert_eq!(
            FloatParser.apply(Value::from("98.5")).unwrap().value,
            Value::Float64(98.5)
        );
    }

    #[test]
    fn bool_parser_accepts_common_spellings() {
        assert_eq!(BoolParser.apply(Value::from("Yes")).unwrap().value, Value::Bool(true));
        assert_eq!(BoolParser.apply(Value::from("0")).unwrap().value, Value::Bool(false));
        assert!(!BoolParser.apply(Value::from("maybe")).unwrap().success);
    }

    #[test]
    fn date_parser_uses_format() {
        let step = DateParser::new("%d/%m/%Y");
        assert_eq!(step.name(), r#"DateParser(format="%d/%m/%Y")"#);
        let out = step.apply(Value::from("31/12/2023")).unwrap();
        assert_eq!(out.value, Value::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
        assert!(!step.apply(Value::from("2023-12-31")).unwrap().success);
    }

    #[test]
    fn datetime_parser_normalises_offsets_to_utc() {
        let out = DatetimeParser::default()
            .apply(Value::from("2024-01-01T10:00:00+0200"))
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(out.value, Value::Datetime(expected));
    }

    #[test]
    fn datetime_parser_without_offset() {
        let out = DatetimeParser::new("%Y-%m-%d %H:%M")
            .apply(Value::from("2024-03-05 07:30"))
            .unwrap();
        assert!(out.success);
    }
}
