//! Ingestion entrypoints and readers.
//!
//! Most callers should use [`ingest_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`IngestionOptions`])
//! - applies a [`crate::schema::RecordSchema`] and streams results into a [`crate::sink::Sink`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific readers producing [`crate::types::RawRecord`]s are also available under:
//! - [`csv`]
//! - [`json`]

pub mod csv;
pub mod json;
pub mod observability;
pub mod unified;

pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    LogObserver,
};
pub use unified::{ingest_from_path, IngestionFormat, IngestionOptions};
