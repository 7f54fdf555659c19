use record_ingest::diagnostic::Severity;
use record_ingest::execution::{ExecutionEngine, ExecutionOptions};
use record_ingest::field::{Field, SpecialValue};
use record_ingest::schema::RecordSchema;
use record_ingest::sink::{DiagnosticLogSink, MemorySink};
use record_ingest::step::{
    DictionaryLookup, FnStep, IntegerParser, RegexValidator, StepError, StepKind, StepOutcome,
    Truncate,
};
use record_ingest::types::{DataType, RawRecord, Value};

fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn name_age_schema() -> RecordSchema {
    RecordSchema::new(vec![
        Field::column("name").mandatory(true).build().unwrap(),
        Field::column("age")
            .step(IntegerParser)
            .data_type(DataType::Int64)
            .fail_on_error(false)
            .build()
            .unwrap(),
    ])
    .unwrap()
}

#[test]
fn three_record_scenario() {
    let engine = ExecutionEngine::new(ExecutionOptions::sequential()).unwrap();
    let report = engine
        .apply(
            &name_age_schema(),
            vec![
                record(&[("name", "Ada"), ("age", "36")]),
                record(&[("name", "   "), ("age", "40")]),
                record(&[("name", "Bob"), ("age", "thirty")]),
            ],
            None,
        )
        .unwrap();

    let ds = &report.dataset;
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[0], vec![Value::from("Ada"), Value::Int64(36)]);
    assert_eq!(ds.rows[1], vec![Value::from("Bob"), Value::Null]);

    assert!(!report.diagnostics.contains_key(&0));

    let second = &report.diagnostics[&1];
    assert_eq!(second.len(), 1);
    assert_eq!(second.count(Severity::Error), 1);
    assert!(second
        .iter()
        .any(|d| d.text() == "null value received in mandatory field"));

    let third = &report.diagnostics[&2];
    assert_eq!(third.len(), 1);
    assert_eq!(third.count(Severity::Warning), 1);

    assert_eq!(report.summary.records, 3);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejected, 1);
    assert_eq!(report.summary.records_with_diagnostics, 2);
}

#[test]
fn fail_on_error_rejects_the_record_instead() {
    let schema = RecordSchema::new(vec![
        Field::column("name").mandatory(true).build().unwrap(),
        Field::column("age")
            .step(IntegerParser)
            .data_type(DataType::Int64)
            .fail_on_error(true)
            .build()
            .unwrap(),
    ])
    .unwrap();

    let engine = ExecutionEngine::new(ExecutionOptions::sequential()).unwrap();
    let report = engine
        .apply(&schema, vec![record(&[("name", "Bob"), ("age", "thirty")])], None)
        .unwrap();

    assert_eq!(report.dataset.row_count(), 0);
    assert_eq!(report.diagnostics[&0].count(Severity::Error), 1);
    assert_eq!(report.diagnostics[&0].count(Severity::Warning), 0);
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let schema = RecordSchema::new(vec![
        Field::column("code")
            .step(RegexValidator::new("[A-Z]{2}").unwrap())
            .step(DictionaryLookup::new([("GB", "United Kingdom"), ("FR", "France")], true))
            .fail_on_error(true)
            .build()
            .unwrap(),
        Field::column("note").step(Truncate::new(4)).build().unwrap(),
        Field::special(SpecialValue::RecordNumber)
            .outbound_name("line")
            .data_type(DataType::Int64)
            .build()
            .unwrap(),
    ])
    .unwrap();

    let codes = ["GB", "FR", "gb", "DE", ""];
    let records: Vec<RawRecord> = (0..1_000)
        .map(|i| {
            let note = format!("note {i}");
            record(&[("code", codes[i % codes.len()]), ("note", note.as_str())])
        })
        .collect();

    let sequential = ExecutionEngine::new(ExecutionOptions::sequential())
        .unwrap()
        .apply(&schema, records.clone(), Some("codes.csv"))
        .unwrap();
    let parallel = ExecutionEngine::new(ExecutionOptions {
        workers: 4,
        chunk_size: 128,
        dispatch_size: 7,
    })
    .unwrap()
    .apply(&schema, records, Some("codes.csv"))
    .unwrap();

    assert_eq!(sequential.dataset, parallel.dataset);
    assert_eq!(sequential.diagnostics, parallel.diagnostics);
    assert_eq!(sequential.summary.accepted, 400);

    let lines: Vec<i64> = parallel
        .dataset
        .rows
        .iter()
        .map(|r| match r[2] {
            Value::Int64(n) => n,
            ref other => panic!("unexpected {other:?}"),
        })
        .collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
}

#[test]
fn failing_step_without_diagnostic_gets_a_generic_error() {
    let silent = FnStep::new("Silent", StepKind::Validation, |_: Value| {
        Ok::<_, StepError>(StepOutcome::fail_silently())
    });
    let schema = RecordSchema::new(vec![
        Field::column("v")
            .step(silent)
            .fail_on_error(true)
            .build()
            .unwrap(),
    ])
    .unwrap();

    let report = ExecutionEngine::new(ExecutionOptions::sequential())
        .unwrap()
        .apply(&schema, vec![record(&[("v", "x")])], None)
        .unwrap();

    let diags = &report.diagnostics[&0];
    assert_eq!(diags.len(), 1);
    assert!(diags
        .iter()
        .all(|d| d.severity() == Severity::Error && d.text() == "Silent reported failure"));
}

#[test]
fn memory_and_log_sinks_fan_out() {
    let schema = name_age_schema();
    let engine = ExecutionEngine::new(ExecutionOptions {
        workers: 2,
        chunk_size: 2,
        dispatch_size: 1,
    })
    .unwrap();

    let mut sink = (
        MemorySink::new(schema.table_schema()),
        DiagnosticLogSink::new(Vec::new()).unwrap(),
    );
    let summary = engine
        .run(
            &schema,
            vec![
                Ok(record(&[("name", "Ada"), ("age", "36")])),
                Ok(record(&[("age", "40")])),
                Ok(record(&[("name", "Bob"), ("age", "x")])),
            ],
            None,
            &mut sink,
        )
        .unwrap();
    assert_eq!(summary.chunks, 2);

    let (memory, log) = sink;
    assert_eq!(memory.dataset().row_count(), 2);
    assert_eq!(memory.diagnostics().len(), 2);

    let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "record_index,severity,text");
    assert_eq!(lines[1], "1,ERROR,null value received in mandatory field");
    assert!(lines[2].starts_with("2,WARNING,"));
    assert_eq!(lines.len(), 3);
}
