//! Output sinks.
//!
//! The execution engine hands every processed chunk to a [`Sink`] in stream order, then calls
//! [`Sink::finish`] once the stream is exhausted.
//!
//! - [`MemorySink`]: collects accepted rows into a [`DataSet`] and keeps the diagnostics map
//! - [`parquet::ParquetSink`]: writes accepted rows to a Parquet file, one row group per chunk
//! - [`diagnostics_log::DiagnosticLogSink`]: writes `record_index,severity,text` CSV rows
//!
//! A tuple `(A, B)` of sinks forwards every call to both.

pub mod diagnostics_log;
pub mod parquet;

use crate::error::IngestionResult;
use crate::execution::{ChunkOutput, DiagnosticsMap};
use crate::types::{DataSet, TableSchema};

pub use diagnostics_log::DiagnosticLogSink;
pub use parquet::ParquetSink;

/// Consumer of processed chunks.
pub trait Sink {
    /// Persist one chunk. `schema` is the typed layout of the accepted records.
    fn write_chunk(&mut self, schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()>;

    /// Flush and close. Called once after the last chunk.
    fn finish(&mut self) -> IngestionResult<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write_chunk(&mut self, schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()> {
        (**self).write_chunk(schema, chunk)
    }

    fn finish(&mut self) -> IngestionResult<()> {
        (**self).finish()
    }
}

impl<A: Sink, B: Sink> Sink for (A, B) {
    fn write_chunk(&mut self, schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()> {
        self.0.write_chunk(schema, chunk)?;
        self.1.write_chunk(schema, chunk)
    }

    fn finish(&mut self) -> IngestionResult<()> {
        self.0.finish()?;
        self.1.finish()
    }
}

/// Collects accepted rows and diagnostics in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySink {
    dataset: DataSet,
    diagnostics: DiagnosticsMap,
}

impl MemorySink {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            dataset: DataSet::new(schema, Vec::new()),
            diagnostics: DiagnosticsMap::new(),
        }
    }

    pub fn dataset(&self) -> &DataSet {
        &self.dataset
    }

    pub fn diagnostics(&self) -> &DiagnosticsMap {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (DataSet, DiagnosticsMap) {
        (self.dataset, self.diagnostics)
    }
}

impl Sink for MemorySink {
    fn write_chunk(&mut self, _schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()> {
        self.dataset
            .rows
            .extend(chunk.records.iter().map(|r| r.values().to_vec()));
        self.diagnostics.extend(
            chunk
                .diagnostics
                .iter()
                .map(|(idx, d)| (*idx, d.clone())),
        );
        Ok(())
    }
}
