//! Fields: one output column's source plus its ordered step pipeline.
//!
//! A field resolves its raw input from a [`Source`], normalises it, threads it through its
//! [`Step`]s and applies the mandatory / nullable / fail-on-error policy. See [`Field::ingest`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, Diagnostics, Severity};
use crate::error::{IngestionError, IngestionResult};
use crate::step::{Step, StepOutcome};
use crate::types::{Column, DataType, RawRecord, Value};

pub(crate) const MANDATORY_NULL: &str = "null value received in mandatory field";
pub(crate) const NON_NULLABLE_NULL: &str = "null value in non-nullable field after ingestion";

/// A value derived from the record's context rather than its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialValue {
    /// Name of the inbound file (null when the run has no file context).
    FileName,
    /// Zero-based position of the record in the stream.
    RecordIndex,
    /// One-based position of the record in the stream.
    RecordNumber,
}

impl SpecialValue {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialValue::FileName => "file_name",
            SpecialValue::RecordIndex => "record_index",
            SpecialValue::RecordNumber => "record_number",
        }
    }
}

impl FromStr for SpecialValue {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_name" => Ok(SpecialValue::FileName),
            "record_index" => Ok(SpecialValue::RecordIndex),
            "record_number" => Ok(SpecialValue::RecordNumber),
            other => Err(IngestionError::definition(format!(
                "unknown special value {other:?}; expected one of file_name, record_index, record_number"
            ))),
        }
    }
}

/// Where a field's raw input comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// An inbound column, looked up by name. A missing column is null.
    Column(String),
    /// The same value for every record.
    Constant(Value),
    /// A value derived from the record context.
    Special(SpecialValue),
}

/// Per-record context used to resolve [`Source::Special`] values.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// Zero-based index of the record in the stream.
    pub index: usize,
    /// Name of the inbound file, if any.
    pub file_name: Option<&'a str>,
}

impl Source {
    /// Resolve the raw input value for one record.
    pub fn resolve(&self, record: &RawRecord, ctx: RecordContext<'_>) -> Value {
        match self {
            Source::Column(name) => record
                .get(name)
                .map(|s| Value::Utf8(s.clone()))
                .unwrap_or(Value::Null),
            // Each record gets its own copy; outputs never alias the constant.
            Source::Constant(v) => v.clone(),
            Source::Special(SpecialValue::FileName) => ctx
                .file_name
                .map(|f| Value::Utf8(f.to_string()))
                .unwrap_or(Value::Null),
            Source::Special(SpecialValue::RecordIndex) => Value::Int64(ctx.index as i64),
            Source::Special(SpecialValue::RecordNumber) => Value::Int64(ctx.index as i64 + 1),
        }
    }
}

/// Result of ingesting one value through a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub value: Value,
    pub success: bool,
    pub diagnostics: Diagnostics,
}

/// A single output column's validation/transformation pipeline.
///
/// Fields are immutable once built and are shared by every record of a run.
#[derive(Clone)]
pub struct Field {
    source: Source,
    steps: Vec<Arc<dyn Step>>,
    outbound_name: String,
    data_type: DataType,
    mandatory: bool,
    nullable: bool,
    fail_on_error: bool,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("source", &self.source)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("outbound_name", &self.outbound_name)
            .field("data_type", &self.data_type)
            .field("mandatory", &self.mandatory)
            .field("nullable", &self.nullable)
            .field("fail_on_error", &self.fail_on_error)
            .finish()
    }
}

impl Field {
    /// Start building a field fed from an inbound column. The outbound name defaults to `name`.
    pub fn column(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(Source::Column(name.into()))
    }

    /// Start building a field fed from a constant. An outbound name is required.
    pub fn constant(value: impl Into<Value>) -> FieldBuilder {
        FieldBuilder::new(Source::Constant(value.into()))
    }

    /// Start building a field fed from the record context. An outbound name is required.
    pub fn special(kind: SpecialValue) -> FieldBuilder {
        FieldBuilder::new(Source::Special(kind))
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    pub fn outbound_name(&self) -> &str {
        &self.outbound_name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn fail_on_error(&self) -> bool {
        self.fail_on_error
    }

    /// The output column this field produces.
    pub fn column_def(&self) -> Column {
        Column::new(self.outbound_name.clone(), self.data_type, self.nullable)
    }

    /// Validate and transform one raw value.
    ///
    /// 1. Strings are trimmed; an empty result becomes null.
    /// 2. A null value in a mandatory field fails immediately, without running any step.
    /// 3. Steps run in order. A failing step stops the pipeline when `fail_on_error` is set or
    ///    its diagnostic is an `InternalError`; otherwise its `Error` is downgraded to `Warning`
    ///    and the pipeline continues with the value the step returned.
    /// 4. A null result in a non-nullable field that has not already failed adds an error.
    ///
    /// Never panics: step faults and step panics become `InternalError` diagnostics. The panic
    /// hook still runs for a caught panic, so the default hook prints a report to stderr for
    /// every affected record; install a quiet hook with [`std::panic::set_hook`] if that matters.
    pub fn ingest(&self, raw: Value) -> FieldOutcome {
        let mut value = normalize(raw);

        if value.is_null() && self.mandatory {
            return FieldOutcome {
                value: Value::Null,
                success: false,
                diagnostics: Diagnostics::from_iter([Diagnostic::error(MANDATORY_NULL)]),
            };
        }

        let mut diagnostics = Diagnostics::new();
        let mut success = true;

        for step in &self.steps {
            let outcome = run_step(step.as_ref(), value);
            value = outcome.value;

            if outcome.success {
                if let Some(d) = outcome.diagnostic {
                    diagnostics.insert(d);
                }
                continue;
            }

            let diagnostic = outcome
                .diagnostic
                .unwrap_or_else(|| Diagnostic::error(format!("{} reported failure", step.name())));

            if self.fail_on_error || diagnostic.severity() == Severity::InternalError {
                tracing::debug!(
                    field = %self.outbound_name,
                    step = %step.name(),
                    diagnostic = %diagnostic,
                    "step failed, stopping field pipeline"
                );
                diagnostics.insert(diagnostic);
                success = false;
                value = Value::Null;
                break;
            }

            let diagnostic = if diagnostic.severity() == Severity::Error {
                diagnostic.downgrade()
            } else {
                diagnostic
            };
            tracing::trace!(
                field = %self.outbound_name,
                step = %step.name(),
                diagnostic = %diagnostic,
                "step failed, continuing"
            );
            diagnostics.insert(diagnostic);
        }

        if success && value.is_null() && !self.nullable {
            diagnostics.insert(Diagnostic::error(NON_NULLABLE_NULL));
            success = false;
        }

        FieldOutcome {
            value,
            success,
            diagnostics,
        }
    }
}

fn normalize(raw: Value) -> Value {
    match raw {
        Value::Utf8(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if trimmed.len() == s.len() {
                Value::Utf8(s)
            } else {
                Value::Utf8(trimmed.to_string())
            }
        }
        other => other,
    }
}

/// Apply a step, converting faults and panics into `InternalError` outcomes.
///
/// `catch_unwind` does not suppress the process panic hook.
fn run_step(step: &dyn Step, value: Value) -> StepOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| step.apply(value))) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => internal_failure(step, &err.message),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            internal_failure(step, &message)
        }
    }
}

fn internal_failure(step: &dyn Step, message: &str) -> StepOutcome {
    StepOutcome {
        value: Value::Null,
        success: false,
        diagnostic: Some(Diagnostic::internal(format!(
            "Unexpected error in {}: {message}",
            step.name()
        ))),
    }
}

/// Builder for [`Field`]. Obtain one from [`Field::column`], [`Field::constant`] or
/// [`Field::special`].
///
/// Defaults: no steps, `Utf8` output, not mandatory, not failing on error. Nullability defaults
/// to `!mandatory`; explicitly asking for a mandatory nullable field is rejected by
/// [`FieldBuilder::build`].
#[derive(Debug)]
pub struct FieldBuilder {
    source: Source,
    steps: Vec<Arc<dyn Step>>,
    outbound_name: Option<String>,
    data_type: DataType,
    mandatory: bool,
    nullable: Option<bool>,
    fail_on_error: bool,
}

impl FieldBuilder {
    fn new(source: Source) -> Self {
        Self {
            source,
            steps: Vec::new(),
            outbound_name: None,
            data_type: DataType::Utf8,
            mandatory: false,
            nullable: None,
            fail_on_error: false,
        }
    }

    /// Append a step to the pipeline.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append an already shared step to the pipeline.
    pub fn shared_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn outbound_name(mut self, name: impl Into<String>) -> Self {
        self.outbound_name = Some(name.into());
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn build(self) -> IngestionResult<Field> {
        let outbound_name = match (self.outbound_name, &self.source) {
            (Some(name), _) => name,
            (None, Source::Column(name)) => name.clone(),
            (None, other) => {
                return Err(IngestionError::definition(format!(
                    "an outbound name is required for a field sourced from {other:?}"
                )));
            }
        };
        if outbound_name.is_empty() {
            return Err(IngestionError::definition("outbound name must not be empty"));
        }

        let nullable = self.nullable.unwrap_or(!self.mandatory);
        if self.mandatory && nullable {
            return Err(IngestionError::definition(format!(
                "field '{outbound_name}' cannot be both mandatory and nullable"
            )));
        }

        Ok(Field {
            source: self.source,
            steps: self.steps,
            outbound_name,
            data_type: self.data_type,
            mandatory: self.mandatory,
            nullable,
            fail_on_error: self.fail_on_error,
        })
    }
}
