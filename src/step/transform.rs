//! Transformation steps.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::{Step, StepError, StepKind, StepOutcome, value_to_json};
use crate::error::IngestionResult;
use crate::types::Value;

/// Truncates a string to at most `length` characters. Null passes through.
#[derive(Debug, Clone, Copy)]
pub struct Truncate {
    length: usize,
}

impl Truncate {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Step for Truncate {
    fn kind(&self) -> StepKind {
        StepKind::Transformation
    }

    fn type_name(&self) -> &'static str {
        "Truncate"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![("length", serde_json::Value::from(self.length))]
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::ok(Value::Null),
            Value::Utf8(s) => StepOutcome::ok(Value::Utf8(s.chars().take(self.length).collect())),
            other => StepOutcome::fail(format!(
                "Cannot truncate non-string, got {}",
                other.type_name()
            )),
        })
    }
}

/// Replaces every match of a pattern in a string.
#[derive(Debug, Clone)]
pub struct RegexReplace {
    pattern: String,
    replacement: String,
    compiled: Regex,
}

impl RegexReplace {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> IngestionResult<Self> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern)?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
            compiled,
        })
    }
}

impl Step for RegexReplace {
    fn kind(&self) -> StepKind {
        StepKind::Transformation
    }

    fn type_name(&self) -> &'static str {
        "RegexReplace"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![
            ("pattern", serde_json::Value::from(self.pattern.as_str())),
            ("replacement", serde_json::Value::from(self.replacement.as_str())),
        ]
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        Ok(match value {
            Value::Null => StepOutcome::fail("Cannot replace values in null string"),
            Value::Utf8(s) => StepOutcome::ok(Value::Utf8(
                self.compiled
                    .replace_all(&s, self.replacement.as_str())
                    .into_owned(),
            )),
            other => StepOutcome::fail(format!(
                "Cannot replace values in non-string, got {}",
                other.type_name()
            )),
        })
    }
}

/// When [`DefaultValue`] substitutes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    /// Only replace null values.
    Fill,
    /// Always replace the value.
    Replace,
}

impl DefaultAction {
    fn as_str(self) -> &'static str {
        match self {
            DefaultAction::Fill => "fill",
            DefaultAction::Replace => "replace",
        }
    }
}

/// Substitutes a fixed default value.
#[derive(Debug, Clone)]
pub struct DefaultValue {
    value: Value,
    action: DefaultAction,
}

impl DefaultValue {
    pub fn new(value: impl Into<Value>, action: DefaultAction) -> Self {
        Self {
            value: value.into(),
            action,
        }
    }

    /// Fill nulls with `value`.
    pub fn fill(value: impl Into<Value>) -> Self {
        Self::new(value, DefaultAction::Fill)
    }
}

impl Step for DefaultValue {
    fn kind(&self) -> StepKind {
        StepKind::Transformation
    }

    fn type_name(&self) -> &'static str {
        "DefaultValue"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![
            ("default_value", value_to_json(&self.value)),
            ("action", serde_json::Value::from(self.action.as_str())),
        ]
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        let replace = match self.action {
            DefaultAction::Replace => true,
            DefaultAction::Fill => value.is_null(),
        };
        Ok(StepOutcome::ok(if replace { self.value.clone() } else { value }))
    }
}

/// Totally ordered projection of a [`Value`] used as a lookup key. Floats compare by bit
/// pattern, with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LookupKey {
    Null,
    Int64(i64),
    Float64(u64),
    Bool(bool),
    Utf8(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
}

impl From<&Value> for LookupKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => LookupKey::Null,
            Value::Int64(v) => LookupKey::Int64(*v),
            Value::Float64(v) => LookupKey::Float64((if *v == 0.0 { 0.0_f64 } else { *v }).to_bits()),
            Value::Bool(v) => LookupKey::Bool(*v),
            Value::Utf8(s) => LookupKey::Utf8(s.clone()),
            Value::Date(d) => LookupKey::Date(*d),
            Value::Datetime(dt) => LookupKey::Datetime(*dt),
        }
    }
}

impl LookupKey {
    /// Object key used when rendering the table as JSON.
    fn json_key(&self) -> String {
        match self {
            LookupKey::Null => "null".to_string(),
            LookupKey::Int64(v) => v.to_string(),
            LookupKey::Float64(bits) => f64::from_bits(*bits).to_string(),
            LookupKey::Bool(v) => v.to_string(),
            LookupKey::Utf8(s) => s.clone(),
            LookupKey::Date(d) => d.to_string(),
            LookupKey::Datetime(dt) => dt.to_string(),
        }
    }
}

/// Replaces values through a lookup table.
///
/// Keys are typed: `Int64(1)` matches a key built from `1_i64`, not one built from `"1"`. Values
/// missing from the table pass through unchanged, unless `fail_if_missing` is set.
#[derive(Debug, Clone)]
pub struct DictionaryLookup {
    lookup: BTreeMap<LookupKey, Value>,
    fail_if_missing: bool,
}

impl DictionaryLookup {
    pub fn new<K, V>(lookup: impl IntoIterator<Item = (K, V)>, fail_if_missing: bool) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Self {
            lookup: lookup
                .into_iter()
                .map(|(k, v)| (LookupKey::from(&k.into()), v.into()))
                .collect(),
            fail_if_missing,
        }
    }
}

impl Step for DictionaryLookup {
    fn kind(&self) -> StepKind {
        StepKind::Transformation
    }

    fn type_name(&self) -> &'static str {
        "DictionaryLookup"
    }

    fn parameters(&self) -> Vec<(&'static str, serde_json::Value)> {
        let table = self
            .lookup
            .iter()
            .map(|(k, v)| (k.json_key(), value_to_json(v)))
            .collect::<serde_json::Map<_, _>>();
        vec![
            ("lookup", serde_json::Value::Object(table)),
            ("fail_if_missing", serde_json::Value::from(self.fail_if_missing)),
        ]
    }

    fn apply(&self, value: Value) -> Result<StepOutcome, StepError> {
        if let Some(hit) = self.lookup.get(&LookupKey::from(&value)) {
            return Ok(StepOutcome::ok(hit.clone()));
        }
        if self.fail_if_missing {
            return Ok(StepOutcome::fail(format!(
                "{value} is not in the lookup dict for this field"
            )));
        }
        Ok(StepOutcome::ok(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        let t = Truncate::new(3);
        assert_eq!(t.apply(Value::from("héllo")).unwrap().value, Value::from("hél"));
        assert_eq!(t.apply(Value::Null).unwrap(), StepOutcome::ok(Value::Null));
        assert!(!t.apply(Value::Int64(1)).unwrap().success);
        assert_eq!(t.name(), "Truncate(length=3)");
    }

    #[test]
    fn regex_replace_replaces_all_matches() {
        let r = RegexReplace::new(r"\s+", " ").unwrap();
        assert_eq!(r.apply(Value::from("a  b\tc")).unwrap().value, Value::from("a b c"));
        assert!(!r.apply(Value::Null).unwrap().success);
    }

    #[test]
    fn default_value_fill_only_replaces_null() {
        let d = DefaultValue::fill("n/a");
        assert_eq!(d.apply(Value::Null).unwrap().value, Value::from("n/a"));
        assert_eq!(d.apply(Value::from("x")).unwrap().value, Value::from("x"));

        let r = DefaultValue::new(0_i64, DefaultAction::Replace);
        assert_eq!(r.apply(Value::from("x")).unwrap().value, Value::Int64(0));
        assert_eq!(
            r.name(),
            r#"DefaultValue(default_value=0, action="replace")"#
        );
    }

    #[test]
    fn dictionary_lookup_passes_through_or_fails() {
        let lenient = DictionaryLookup::new([("M", "male"), ("F", "female")], false);
        assert_eq!(lenient.apply(Value::from("M")).unwrap().value, Value::from("male"));
        assert_eq!(lenient.apply(Value::from("X")).unwrap().value, Value::from("X"));

        let strict = DictionaryLookup::new([("M", "male")], true);
        let out = strict.apply(Value::from("X")).unwrap();
        assert!(!out.success);
        assert_eq!(
            out.diagnostic.unwrap().text(),
            "\"X\" is not in the lookup dict for this field"
        );
    }

    #[test]
    fn dictionary_lookup_matches_typed_keys() {
        let codes = DictionaryLookup::new([(1_i64, "one"), (2_i64, "two")], true);
        let hit = codes.apply(Value::Int64(1)).unwrap();
        assert!(hit.success);
        assert_eq!(hit.value, Value::from("one"));

        // A string key never matches an integer value.
        let by_text = DictionaryLookup::new([("1", "one")], true);
        let miss = by_text.apply(Value::Int64(1)).unwrap();
        assert!(!miss.success);
        assert_eq!(
            miss.diagnostic.unwrap().text(),
            "1 is not in the lookup dict for this field"
        );

        let flags = DictionaryLookup::new([(true, "Y"), (false, "N")], false);
        assert_eq!(flags.apply(Value::Bool(false)).unwrap().value, Value::from("N"));
        assert_eq!(
            codes.name(),
            r#"DictionaryLookup(lookup={"1":"one","2":"two"}, fail_if_missing=true)"#
        );
    }
}
