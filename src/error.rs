use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by schema construction, readers, sinks and the execution engine.
///
/// Per-record data problems are never reported through this type: they become
/// [`crate::diagnostic::Diagnostic`]s attached to the record. An `IngestionError` always means the
/// run (or the schema definition) itself cannot proceed.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or diagnostics-log writing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet writing error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A regex-based step was configured with an invalid pattern.
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// A schema, field or option definition violates a build-time contract.
    #[error("invalid schema definition: {message}")]
    SchemaDefinition { message: String },

    /// A value cannot be stored under the declared output column type.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker failed outside of the field boundary; the run is aborted.
    #[error("worker failure while processing records {first_index}..{end_index}: {message}")]
    Worker {
        first_index: usize,
        end_index: usize,
        message: String,
    },
}

impl IngestionError {
    pub(crate) fn definition(message: impl Into<String>) -> Self {
        Self::SchemaDefinition {
            message: message.into(),
        }
    }
}
