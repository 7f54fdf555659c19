use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use record_ingest::execution::{ExecutionEngine, ExecutionOptions};
use record_ingest::field::{Field, SpecialValue};
use record_ingest::schema::RecordSchema;
use record_ingest::step::{DateParser, FloatParser, IntegerParser, RegexValidator, Truncate};
use record_ingest::types::{DataType, RawRecord};

fn schema() -> RecordSchema {
    RecordSchema::new(vec![
        Field::column("id")
            .step(IntegerParser)
            .data_type(DataType::Int64)
            .mandatory(true)
            .fail_on_error(true)
            .build()
            .unwrap(),
        Field::column("email")
            .step(RegexValidator::new(r"[^@\s]+@[^@\s]+\.[a-z]{2,}").unwrap())
            .step(Truncate::new(64))
            .build()
            .unwrap(),
        Field::column("amount")
            .step(FloatParser)
            .data_type(DataType::Float64)
            .build()
            .unwrap(),
        Field::column("day")
            .step(DateParser::default())
            .data_type(DataType::Date)
            .build()
            .unwrap(),
        Field::special(SpecialValue::RecordNumber)
            .outbound_name("line")
            .data_type(DataType::Int64)
            .build()
            .unwrap(),
    ])
    .unwrap()
}

fn records(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let mut r = RawRecord::new();
            r.insert("id".to_string(), i.to_string());
            let email = if i % 10 == 0 {
                "not-an-email".to_string()
            } else {
                format!("user{i}@example.com")
            };
            r.insert("email".to_string(), email);
            r.insert("amount".to_string(), format!("{}.{:02}", i % 1000, i % 100));
            r.insert("day".to_string(), format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1));
            r
        })
        .collect()
}

fn bench_apply(c: &mut Criterion) {
    let schema = schema();
    let input = records(20_000);

    let mut group = c.benchmark_group("apply");
    group.throughput(Throughput::Elements(input.len() as u64));
    for workers in [1_usize, 2, 4] {
        let engine = ExecutionEngine::new(ExecutionOptions {
            workers,
            ..ExecutionOptions::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &input, |b, input| {
            b.iter(|| {
                let report = engine
                    .apply(black_box(&schema), input.iter().cloned(), None)
                    .unwrap();
                black_box(report.summary)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply);
criterion_main!(benches);
