//! Side-channel log of diagnostics as CSV rows of `record_index,severity,text`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::Sink;
use crate::diagnostic::Severity;
use crate::error::IngestionResult;
use crate::execution::ChunkOutput;
use crate::types::TableSchema;

#[derive(Serialize)]
struct LogRow<'a> {
    record_index: usize,
    severity: Severity,
    text: &'a str,
}

/// Writes every diagnostic of every record, in record-index order.
pub struct DiagnosticLogSink<W: Write = File> {
    writer: csv::Writer<W>,
}

impl DiagnosticLogSink<File> {
    /// Create (or truncate) a diagnostics log at `path`.
    pub fn create(path: impl AsRef<Path>) -> IngestionResult<Self> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> DiagnosticLogSink<W> {
    pub fn new(writer: W) -> IngestionResult<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(["record_index", "severity", "text"])?;
        Ok(Self { writer })
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> IngestionResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::IngestionError::Io(e.into_error()))
    }
}

impl<W: Write> Sink for DiagnosticLogSink<W> {
    fn write_chunk(&mut self, _schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()> {
        for (&record_index, diagnostics) in &chunk.diagnostics {
            for d in diagnostics {
                self.writer.serialize(LogRow {
                    record_index,
                    severity: d.severity(),
                    text: d.text(),
                })?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> IngestionResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, Diagnostics};
    use crate::execution::DiagnosticsMap;

    #[test]
    fn writes_header_and_rows_in_index_order() {
        let mut diagnostics = DiagnosticsMap::new();
        diagnostics.insert(
            4,
            Diagnostics::from_iter([Diagnostic::internal("boom"), Diagnostic::warning("odd, value")]),
        );
        diagnostics.insert(1, Diagnostics::from_iter([Diagnostic::error("missing")]));
        let chunk = ChunkOutput {
            first_index: 0,
            record_count: 5,
            records: Vec::new(),
            accepted_indices: Vec::new(),
            diagnostics,
        };

        let mut sink = DiagnosticLogSink::new(Vec::new()).unwrap();
        sink.write_chunk(&TableSchema::new(Vec::new()), &chunk).unwrap();
        sink.finish().unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();

        assert_eq!(
            text,
            "record_index,severity,text\n1,ERROR,missing\n4,WARNING,\"odd, value\"\n4,INTERNAL_ERROR,boom\n"
        );
    }
}
