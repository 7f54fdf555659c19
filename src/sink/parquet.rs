//! Parquet sink: accepted records are written as one row group per chunk.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{Type, TypePtr};

use super::Sink;
use crate::error::{IngestionError, IngestionResult};
use crate::execution::ChunkOutput;
use crate::types::{Column, DataType, TableSchema, Value};

/// Writes accepted records to a Parquet file.
///
/// Column nullability maps to `OPTIONAL`/`REQUIRED`. Types map as: `Int64` → `INT64`,
/// `Float64` → `DOUBLE`, `Bool` → `BOOLEAN`, `Utf8` → `BYTE_ARRAY (UTF8)`, `Date` →
/// `INT32 (DATE)`, `Datetime` → `INT64 (TIMESTAMP_MICROS)`.
pub struct ParquetSink<W: Write + Send = File> {
    schema: TableSchema,
    writer: Option<SerializedFileWriter<W>>,
}

impl ParquetSink<File> {
    /// Create (or truncate) a Parquet file at `path`.
    pub fn create(path: impl AsRef<Path>, schema: &TableSchema) -> IngestionResult<Self> {
        let file = File::create(path)?;
        Self::new(file, schema)
    }
}

impl<W: Write + Send> ParquetSink<W> {
    /// Write Parquet data to an arbitrary writer.
    pub fn new(writer: W, schema: &TableSchema) -> IngestionResult<Self> {
        let parquet_schema = parquet_schema(schema)?;
        let props = Arc::new(WriterProperties::builder().build());
        let writer = SerializedFileWriter::new(writer, parquet_schema, props)?;
        Ok(Self {
            schema: schema.clone(),
            writer: Some(writer),
        })
    }
}

impl<W: Write + Send> Sink for ParquetSink<W> {
    fn write_chunk(&mut self, schema: &TableSchema, chunk: &ChunkOutput) -> IngestionResult<()> {
        if schema != &self.schema {
            return Err(IngestionError::SchemaMismatch {
                message: "chunk schema differs from the schema the parquet file was opened with"
                    .to_string(),
            });
        }
        if chunk.records.is_empty() {
            return Ok(());
        }
        let writer = self.writer.as_mut().ok_or_else(|| IngestionError::SchemaMismatch {
            message: "parquet sink already finished".to_string(),
        })?;

        let mut row_group = writer.next_row_group()?;
        let mut col_idx = 0usize;
        while let Some(mut col) = row_group.next_column()? {
            let column = &self.schema.columns[col_idx];
            write_column(col.untyped(), column, col_idx, chunk)?;
            col.close()?;
            col_idx += 1;
        }
        row_group.close()?;

        tracing::debug!(
            first_index = chunk.first_index,
            rows = chunk.records.len(),
            "wrote parquet row group"
        );
        Ok(())
    }

    fn finish(&mut self) -> IngestionResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

fn parquet_schema(schema: &TableSchema) -> IngestionResult<TypePtr> {
    let mut fields = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        let (physical, converted) = match column.data_type {
            DataType::Int64 => (PhysicalType::INT64, ConvertedType::NONE),
            DataType::Float64 => (PhysicalType::DOUBLE, ConvertedType::NONE),
            DataType::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
            DataType::Utf8 => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
            DataType::Date => (PhysicalType::INT32, ConvertedType::DATE),
            DataType::Datetime => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
        };
        let repetition = if column.nullable {
            Repetition::OPTIONAL
        } else {
            Repetition::REQUIRED
        };
        let field = Type::primitive_type_builder(&column.name, physical)
            .with_repetition(repetition)
            .with_converted_type(converted)
            .build()?;
        fields.push(Arc::new(field));
    }
    let root = Type::group_type_builder("schema").with_fields(fields).build()?;
    Ok(Arc::new(root))
}

/// Gather the non-null values of column `col_idx` plus definition levels.
fn gather<T>(
    column: &Column,
    col_idx: usize,
    chunk: &ChunkOutput,
    extract: impl Fn(&Value) -> Option<T>,
) -> IngestionResult<(Vec<T>, Vec<i16>)> {
    let mut values = Vec::with_capacity(chunk.records.len());
    let mut def_levels = Vec::with_capacity(chunk.records.len());

    for (record, &index) in chunk.records.iter().zip(&chunk.accepted_indices) {
        let value = &record.values()[col_idx];
        if value.is_null() {
            if !column.nullable {
                return Err(IngestionError::SchemaMismatch {
                    message: format!(
                        "record {index}: null value in non-nullable column '{}'",
                        column.name
                    ),
                });
            }
            def_levels.push(0);
            continue;
        }
        match extract(value) {
            Some(v) => {
                values.push(v);
                def_levels.push(1);
            }
            None => {
                return Err(IngestionError::SchemaMismatch {
                    message: format!(
                        "record {index}: column '{}' expects {:?}, got {}",
                        column.name,
                        column.data_type,
                        value.type_name()
                    ),
                });
            }
        }
    }
    Ok((values, def_levels))
}

fn write_column(
    writer: &mut ColumnWriter<'_>,
    column: &Column,
    col_idx: usize,
    chunk: &ChunkOutput,
) -> IngestionResult<()> {
    macro_rules! write_typed {
        ($w:expr, $extract:expr) => {{
            let (values, defs) = gather(column, col_idx, chunk, $extract)?;
            let defs = column.nullable.then_some(defs.as_slice());
            $w.write_batch(&values, defs, None)?;
        }};
    }

    match (writer, column.data_type) {
        (ColumnWriter::Int64ColumnWriter(w), DataType::Int64) => write_typed!(w, |v| match v {
            Value::Int64(i) => Some(*i),
            _ => None,
        }),
        (ColumnWriter::Int64ColumnWriter(w), DataType::Datetime) => write_typed!(w, |v| match v {
            Value::Datetime(dt) => Some(dt.and_utc().timestamp_micros()),
            _ => None,
        }),
        (ColumnWriter::DoubleColumnWriter(w), DataType::Float64) => write_typed!(w, |v| match v {
            Value::Float64(f) => Some(*f),
            _ => None,
        }),
        (ColumnWriter::BoolColumnWriter(w), DataType::Bool) => write_typed!(w, |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        }),
        (ColumnWriter::ByteArrayColumnWriter(w), DataType::Utf8) => write_typed!(w, |v| match v {
            Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
            _ => None,
        }),
        (ColumnWriter::Int32ColumnWriter(w), DataType::Date) => write_typed!(w, |v| match v {
            Value::Date(d) => days_since_epoch(d),
            _ => None,
        }),
        (_, data_type) => {
            return Err(IngestionError::SchemaMismatch {
                message: format!(
                    "unexpected parquet column writer for '{}' ({data_type:?})",
                    column.name
                ),
            });
        }
    }
    Ok(())
}

fn days_since_epoch(date: &NaiveDate) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_maps_nullability_and_types() {
        let table = TableSchema::new(vec![
            Column::new("id", DataType::Int64, false),
            Column::new("born", DataType::Date, true),
        ]);
        let root = parquet_schema(&table).unwrap();
        let fields = root.get_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].get_basic_info().repetition(), Repetition::REQUIRED);
        assert_eq!(fields[1].get_basic_info().repetition(), Repetition::OPTIONAL);
        assert_eq!(fields[1].get_basic_info().converted_type(), ConvertedType::DATE);
    }

    #[test]
    fn epoch_days() {
        let d = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(days_since_epoch(&d), Some(10));
    }
}
