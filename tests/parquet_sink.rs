use std::fs::File;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field as ParquetField, RowAccessor};

use record_ingest::execution::{ExecutionEngine, ExecutionOptions};
use record_ingest::field::Field;
use record_ingest::schema::RecordSchema;
use record_ingest::sink::{DiagnosticLogSink, ParquetSink};
use record_ingest::step::{DateParser, FloatParser, IntegerParser};
use record_ingest::types::{DataType, RawRecord};
use record_ingest::IngestionError;

fn tmp_file(name: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("record-ingest-{name}-{nanos}.{ext}"))
}

fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn measurements_schema() -> RecordSchema {
    RecordSchema::new(vec![
        Field::column("id")
            .step(IntegerParser)
            .data_type(DataType::Int64)
            .mandatory(true)
            .fail_on_error(true)
            .build()
            .unwrap(),
        Field::column("reading")
            .step(FloatParser)
            .data_type(DataType::Float64)
            .build()
            .unwrap(),
        Field::column("taken")
            .step(DateParser::default())
            .data_type(DataType::Date)
            .build()
            .unwrap(),
    ])
    .unwrap()
}

#[test]
fn accepted_records_are_written_one_row_group_per_chunk() {
    let schema = measurements_schema();
    let data_path = tmp_file("measurements", "parquet");
    let log_path = tmp_file("measurements-diagnostics", "csv");

    let mut sink = (
        ParquetSink::create(&data_path, &schema.table_schema()).unwrap(),
        DiagnosticLogSink::create(&log_path).unwrap(),
    );
    let engine = ExecutionEngine::new(ExecutionOptions {
        workers: 1,
        chunk_size: 2,
        dispatch_size: 1,
    })
    .unwrap();
    let summary = engine
        .run(
            &schema,
            vec![
                Ok(record(&[("id", "1"), ("reading", "0.5"), ("taken", "1970-01-11")])),
                Ok(record(&[("id", "two"), ("reading", "1.5")])),
                Ok(record(&[("id", "3"), ("reading", "hot"), ("taken", "2024-02-29")])),
                Ok(record(&[("id", "4")])),
            ],
            None,
            &mut sink,
        )
        .unwrap();
    assert_eq!(summary.accepted, 3);
    drop(sink);

    let reader = SerializedFileReader::new(File::open(&data_path).unwrap()).unwrap();
    assert_eq!(reader.metadata().num_row_groups(), 2);
    assert_eq!(reader.metadata().file_metadata().num_rows(), 3);

    let rows: Vec<_> = reader
        .get_row_iter(None)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.get_long(0).unwrap()).collect();
    assert_eq!(ids, vec![1, 3, 4]);
    assert_eq!(rows[0].get_double(1).unwrap(), 0.5);

    let cols = |i: usize| -> Vec<ParquetField> {
        rows[i].get_column_iter().map(|(_, f)| f.clone()).collect()
    };
    assert_eq!(cols(0)[2], ParquetField::Date(10));
    assert_eq!(cols(1)[1], ParquetField::Null);
    assert_eq!(cols(1)[2], ParquetField::Date(19_782));
    assert_eq!(cols(2)[2], ParquetField::Null);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("record_index,severity,text\n1,ERROR,"));
    assert!(log.contains("\n2,WARNING,"));

    let _ = std::fs::remove_file(&data_path);
    let _ = std::fs::remove_file(&log_path);
}

#[test]
fn undeclared_conversion_is_a_schema_mismatch() {
    // Declared Int64 but nothing parses the string.
    let schema = RecordSchema::new(vec![
        Field::column("id").data_type(DataType::Int64).build().unwrap(),
    ])
    .unwrap();

    let mut sink = ParquetSink::new(Vec::new(), &schema.table_schema()).unwrap();
    let engine = ExecutionEngine::new(ExecutionOptions::sequential()).unwrap();
    let err = engine
        .run(&schema, vec![Ok(record(&[("id", "7")]))], None, &mut sink)
        .unwrap_err();
    match err {
        IngestionError::SchemaMismatch { message } => {
            assert!(message.contains("record 0"), "{message}");
            assert!(message.contains("'id'"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
