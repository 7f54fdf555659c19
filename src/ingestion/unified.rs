//! Unified path-based ingestion entrypoint.
//!
//! Most callers should use [`ingest_from_path`], which reads a file, applies a
//! [`crate::schema::RecordSchema`] through the [`crate::execution::ExecutionEngine`] and streams
//! the result into a [`crate::sink::Sink`].
//!
//! - If [`IngestionOptions::format`] is `None`, the format is inferred from the file extension.
//! - If an [`super::observability::IngestionObserver`] is provided, success/failure/alerts are
//!   reported to it.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::execution::{ExecutionEngine, ExecutionOptions, RunSummary};
use crate::schema::RecordSchema;
use crate::sink::Sink;

use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::{csv, json};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array-of-objects or NDJSON.
    Json,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "ndjson" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Options controlling unified ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<IngestionFormat>,
    /// Chunking and parallelism.
    pub execution: ExecutionOptions,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("execution", &self.execution)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            execution: ExecutionOptions::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Ingest one file: read records, apply `schema`, and stream results into `sink`.
///
/// The file's name (without directories) is what [`crate::field::SpecialValue::FileName`]
/// resolves to.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on a completed run, with record stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Example
///
/// ```no_run
/// use record_ingest::field::Field;
/// use record_ingest::ingestion::{ingest_from_path, IngestionOptions};
/// use record_ingest::schema::RecordSchema;
/// use record_ingest::sink::{DiagnosticLogSink, ParquetSink};
/// use record_ingest::step::IntegerParser;
/// use record_ingest::types::DataType;
///
/// # fn main() -> Result<(), record_ingest::IngestionError> {
/// let schema = RecordSchema::new(vec![
///     Field::column("name").mandatory(true).build()?,
///     Field::column("age").step(IntegerParser).data_type(DataType::Int64).build()?,
/// ])?;
///
/// let mut sink = (
///     ParquetSink::create("people.parquet", &schema.table_schema())?,
///     DiagnosticLogSink::create("people.diagnostics.csv")?,
/// );
/// let summary = ingest_from_path("people.csv", &schema, &IngestionOptions::default(), &mut sink)?;
/// println!("accepted={} rejected={}", summary.accepted, summary.rejected);
/// # Ok(())
/// # }
/// ```
pub fn ingest_from_path<S>(
    path: impl AsRef<Path>,
    schema: &RecordSchema,
    options: &IngestionOptions,
    sink: &mut S,
) -> IngestionResult<RunSummary>
where
    S: Sink + ?Sized,
{
    let path = path.as_ref();
    let fmt = match options.format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };

    let ctx = IngestionContext {
        path: path.to_path_buf(),
        format: fmt,
    };

    let result = run_file(path, fmt, schema, &options.execution, sink);

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(summary) => obs.on_success(
                &ctx,
                IngestionStats {
                    records: summary.records,
                    accepted: summary.accepted,
                    rejected: summary.rejected,
                    records_with_diagnostics: summary.records_with_diagnostics,
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

fn run_file<S>(
    path: &Path,
    fmt: IngestionFormat,
    schema: &RecordSchema,
    execution: &ExecutionOptions,
    sink: &mut S,
) -> IngestionResult<RunSummary>
where
    S: Sink + ?Sized,
{
    let engine = ExecutionEngine::new(execution.clone())?;
    let file_name = path.file_name().and_then(|s| s.to_str());

    match fmt {
        IngestionFormat::Csv => {
            let records = csv::read_csv_from_path(path)?;
            engine.run(schema, records, file_name, sink)
        }
        IngestionFormat::Json => {
            let records = json::read_json_from_path(path)?;
            engine.run(schema, records.into_iter().map(Ok), file_name, sink)
        }
    }
}

fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_) => IngestionSeverity::Critical,
        IngestionError::Worker { .. } | IngestionError::WorkerPool(_) => IngestionSeverity::Critical,
        IngestionError::Parquet(err) => {
            // Best-effort: parquet errors often wrap IO, but not always in a structured way.
            if error_chain_contains_io(err) {
                IngestionSeverity::Critical
            } else {
                IngestionSeverity::Error
            }
        }
        IngestionError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        IngestionError::Regex(_)
        | IngestionError::SchemaDefinition { .. }
        | IngestionError::SchemaMismatch { .. } => IngestionSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

fn infer_format_from_path(path: &Path) -> IngestionResult<IngestionFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestionError::SchemaMismatch {
            message: format!(
                "cannot infer format: path has no extension ({})",
                path.display()
            ),
        })?;

    IngestionFormat::from_extension(ext).ok_or_else(|| IngestionError::SchemaMismatch {
        message: format!(
            "cannot infer format from extension '{ext}' for path ({})",
            path.display()
        ),
    })
}
