//! The record transformer: an ordered, name-unique list of [`Field`]s.

use std::collections::HashSet;
use std::sync::Arc;

use crate::diagnostic::Diagnostics;
use crate::error::{IngestionError, IngestionResult};
use crate::field::{Field, RecordContext};
use crate::types::{OutboundRecord, RawRecord, TableSchema};

/// Result of applying a [`RecordSchema`] to one inbound record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Zero-based index of the record in the stream.
    pub index: usize,
    /// The transformed record. Present even on failure, for inspection.
    pub record: OutboundRecord,
    /// Whether every field succeeded.
    pub success: bool,
    /// Union of all field diagnostics.
    pub diagnostics: Diagnostics,
}

/// Maps one inbound record to one outbound record plus its diagnostics.
///
/// Immutable after construction; share one instance (by reference or `Arc`) across a whole run
/// and across worker threads.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<Field>,
    names: Arc<[String]>,
}

impl RecordSchema {
    /// Create a schema, rejecting duplicate outbound names.
    pub fn new(fields: Vec<Field>) -> IngestionResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.outbound_name()) {
                return Err(IngestionError::definition(format!(
                    "multiple fields with outbound name '{}'",
                    field.outbound_name()
                )));
            }
        }

        let names = fields
            .iter()
            .map(|f| f.outbound_name().to_string())
            .collect::<Vec<_>>()
            .into();
        Ok(Self { fields, names })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by outbound name.
    pub fn field(&self, outbound_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.outbound_name() == outbound_name)
    }

    /// Outbound names in declaration order.
    pub fn outbound_names(&self) -> &[String] {
        &self.names
    }

    /// The typed column layout of accepted records.
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::new(self.fields.iter().map(Field::column_def).collect())
    }

    /// Apply every field to one record.
    ///
    /// Fields never observe each other's output; order only determines column order.
    pub fn apply_record(
        &self,
        index: usize,
        record: &RawRecord,
        file_name: Option<&str>,
    ) -> RecordOutcome {
        let ctx = RecordContext { index, file_name };
        let mut values = Vec::with_capacity(self.fields.len());
        let mut success = true;
        let mut diagnostics = Diagnostics::new();

        for field in &self.fields {
            let outcome = field.ingest(field.source().resolve(record, ctx));
            success &= outcome.success;
            diagnostics.merge(outcome.diagnostics);
            values.push(outcome.value);
        }

        RecordOutcome {
            index,
            record: OutboundRecord::new(Arc::clone(&self.names), values),
            success,
            diagnostics,
        }
    }
}
