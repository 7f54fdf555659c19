//! `record-ingest` is a record ingestion engine: it validates and transforms a stream of raw
//! string records into typed output records, one declarative [`field::Field`] pipeline per output
//! column, and collects a severity-tagged [`diagnostic::Diagnostic`] report for every record.
//!
//! The primary entrypoints are [`execution::ExecutionEngine`] (for in-memory or custom record
//! streams) and [`ingestion::ingest_from_path`] (CSV/JSON files into a [`sink::Sink`]).
//!
//! ## Model
//!
//! - A [`field::Field`] resolves a raw value from a column, a constant or a special value
//!   (file name, record index, record number), trims it, and threads it through a sequence of
//!   [`step::Step`]s (parsers, validators, transformations).
//! - A [`schema::RecordSchema`] is an ordered list of fields with unique outbound names. A record
//!   is accepted only if every field succeeds.
//! - The [`execution::ExecutionEngine`] applies a schema in chunks, optionally across a worker
//!   pool, preserving record order and keying diagnostics by record index.
//!
//! Bad data never fails a run: it produces diagnostics and (for `Error`/`InternalError`) excludes
//! the record from the output. Only orchestration faults surface as [`IngestionError`].
//!
//! ## Severities
//!
//! - [`diagnostic::Severity::Info`] and [`diagnostic::Severity::Warning`]: notes, the record is kept
//! - [`diagnostic::Severity::Error`]: data-quality violation; halts the field when
//!   `fail_on_error` is set, otherwise it is downgraded to a warning and the field is nulled
//! - [`diagnostic::Severity::InternalError`]: a step fault; always halts and fails the field
//!
//! ## Quick example
//!
//! ```rust
//! use record_ingest::execution::{ExecutionEngine, ExecutionOptions};
//! use record_ingest::field::Field;
//! use record_ingest::schema::RecordSchema;
//! use record_ingest::step::IntegerParser;
//! use record_ingest::types::{DataType, RawRecord, Value};
//!
//! # fn main() -> Result<(), record_ingest::IngestionError> {
//! let schema = RecordSchema::new(vec![
//!     Field::column("name").mandatory(true).build()?,
//!     Field::column("age")
//!         .step(IntegerParser)
//!         .data_type(DataType::Int64)
//!         .build()?,
//! ])?;
//!
//! let record = |name: &str, age: &str| -> RawRecord {
//!     [("name", name), ("age", age)]
//!         .into_iter()
//!         .map(|(k, v)| (k.to_string(), v.to_string()))
//!         .collect()
//! };
//!
//! let engine = ExecutionEngine::new(ExecutionOptions::sequential())?;
//! let report = engine.apply(
//!     &schema,
//!     vec![record("Ada", "36"), record("  ", "40"), record("Bob", "n/a")],
//!     None,
//! )?;
//!
//! assert_eq!(report.dataset.row_count(), 2);
//! assert_eq!(report.dataset.value(0, "age"), Some(&Value::Int64(36)));
//! assert_eq!(report.dataset.value(1, "age"), Some(&Value::Null));
//! assert!(report.diagnostics[&1].has_errors());
//! assert!(!report.diagnostics[&2].has_errors());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`diagnostic`]: severities, diagnostics and deduplicated diagnostic sets
//! - [`step`]: the step contract and the built-in step catalog
//! - [`field`]: per-column pipelines and value sources
//! - [`schema`]: record-level application of a list of fields
//! - [`execution`]: chunked, optionally parallel orchestration, metrics and observers
//! - [`ingestion`]: CSV/JSON readers and the path-based entrypoint
//! - [`sink`]: memory, Parquet and diagnostics-log outputs
//! - [`types`]: values, records and the typed column schema
//! - [`error`]: error types used across the crate

pub mod diagnostic;
pub mod error;
pub mod execution;
pub mod field;
pub mod ingestion;
pub mod schema;
pub mod sink;
pub mod step;
pub mod types;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{IngestionError, IngestionResult};
pub use field::Field;
pub use schema::RecordSchema;
