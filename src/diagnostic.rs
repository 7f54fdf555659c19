//! Severity-tagged diagnostic messages and the per-record diagnostic set.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a [`Diagnostic`].
///
/// Ordered from least to most severe, so sets of diagnostics iterate infos first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational note, never affects success.
    Info,
    /// Recoverable data-quality note.
    Warning,
    /// Data-quality violation.
    Error,
    /// Defect in the engine or in a step. Never downgraded, upgraded or suppressed.
    InternalError,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::InternalError,
    ];

    /// Canonical upper-case label (`INFO`, `WARNING`, `ERROR`, `INTERNAL_ERROR`).
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this severity counts as an error.
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::InternalError)
    }

    /// One step less severe. `InternalError` is fixed.
    pub fn downgrade(self) -> Self {
        match self {
            Severity::Error => Severity::Warning,
            Severity::Warning => Severity::Info,
            other => other,
        }
    }

    /// One step more severe. `InternalError` is fixed.
    pub fn upgrade(self) -> Self {
        match self {
            Severity::Info => Severity::Warning,
            Severity::Warning => Severity::Error,
            other => other,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown severity label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid severity {0:?}; expected one of INFO, WARNING, ERROR, INTERNAL_ERROR")]
pub struct InvalidSeverity(pub String);

impl FromStr for Severity {
    type Err = InvalidSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| InvalidSeverity(s.to_string()))
    }
}

/// An immutable, severity-tagged message produced while ingesting a record.
///
/// Equality, ordering and hashing are structural over `(severity, text)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    severity: Severity,
    text: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    /// Build a diagnostic from a textual severity label, failing on unknown labels.
    pub fn parse(severity: &str, text: impl Into<String>) -> Result<Self, InvalidSeverity> {
        Ok(Self::new(severity.parse()?, text))
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn internal(text: impl Into<String>) -> Self {
        Self::new(Severity::InternalError, text)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }

    /// Return the diagnostic with a downgraded severity (Error → Warning → Info).
    pub fn downgrade(self) -> Self {
        Self {
            severity: self.severity.downgrade(),
            text: self.text,
        }
    }

    /// Return the diagnostic with an upgraded severity (Info → Warning → Error).
    pub fn upgrade(self) -> Self {
        Self {
            severity: self.severity.upgrade(),
            text: self.text,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

/// Deduplicated set of diagnostics for a single record.
///
/// Inserting a diagnostic identical to one already present is a no-op. Iteration order is
/// deterministic (by severity, then text) regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(BTreeSet<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a diagnostic. Returns `false` if an identical one was already present.
    pub fn insert(&mut self, diagnostic: Diagnostic) -> bool {
        self.0.insert(diagnostic)
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.0.contains(diagnostic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Whether any diagnostic is an `Error` or `InternalError`.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Number of diagnostics with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|d| d.severity == severity).count()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::collections::btree_set::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::collections::btree_set::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downgrade_and_upgrade_walk_the_ladder() {
        let d = Diagnostic::error("bad");
        assert_eq!(d.clone().downgrade().severity(), Severity::Warning);
        assert_eq!(d.downgrade().downgrade().severity(), Severity::Info);
        assert_eq!(Diagnostic::info("x").downgrade().severity(), Severity::Info);

        let u = Diagnostic::info("note");
        assert_eq!(u.clone().upgrade().severity(), Severity::Warning);
        assert_eq!(u.upgrade().upgrade().severity(), Severity::Error);
        assert_eq!(Diagnostic::error("x").upgrade().severity(), Severity::Error);
    }

    #[test]
    fn internal_error_is_fixed() {
        let d = Diagnostic::internal("boom");
        assert_eq!(d.clone().downgrade(), d);
        assert_eq!(d.clone().upgrade(), d);
        assert!(d.is_error());
    }

    #[test]
    fn is_error_only_for_error_levels() {
        assert!(!Diagnostic::info("a").is_error());
        assert!(!Diagnostic::warning("a").is_error());
        assert!(Diagnostic::error("a").is_error());
        assert!(Diagnostic::internal("a").is_error());
    }

    #[test]
    fn parse_rejects_unknown_severity() {
        let d = Diagnostic::parse("WARNING", "w").unwrap();
        assert_eq!(d, Diagnostic::warning("w"));

        let err = Diagnostic::parse("FATAL", "x").unwrap_err();
        assert_eq!(err, InvalidSeverity("FATAL".to_string()));
        assert!("warning".parse::<Severity>().is_err());
    }

    #[test]
    fn set_deduplicates_identical_diagnostics() {
        let mut set = Diagnostics::new();
        assert!(set.insert(Diagnostic::error("same")));
        assert!(!set.insert(Diagnostic::error("same")));
        assert!(set.insert(Diagnostic::warning("same")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.count(Severity::Error), 1);
        assert!(set.has_errors());
    }

    #[test]
    fn serializes_with_upper_case_severity() {
        let json = serde_json::to_string(&Diagnostic::internal("x")).unwrap();
        assert_eq!(json, r#"{"severity":"INTERNAL_ERROR","text":"x"}"#);
    }
}
