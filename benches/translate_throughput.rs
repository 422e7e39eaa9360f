//! Benchmark suite for schema and value translation
//!
//! Measures:
//! - Schema translation of records with growing field counts, both ways
//! - Value translation of record batches, native to Avro and back
//! - Binary encoding of translated values
//!
//! # Configuration
//!
//! - `BENCH_SAMPLE_SIZE`: Number of samples to collect (default: 100)
//! - `BENCH_MEASUREMENT_TIME`: Measurement time in seconds (default: 5)
//!
//! ```bash
//! BENCH_SAMPLE_SIZE=50 BENCH_MEASUREMENT_TIME=3 cargo bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::hint::black_box;
use std::time::Duration;

use pegasus_avro::codec::{AvroAdapter, DatumEncoder, DefaultAvroAdapter};
use pegasus_avro::data::{parse_data_schema, DataSchemaTree, DataValue};
use pegasus_avro::{
    avro_to_data, avro_to_data_schema, data_to_avro, data_to_avro_schema, AvroToDataSchemaOptions,
    DataToAvroSchemaOptions, DataTranslationOptions,
};

/// Configure Criterion based on environment variables
fn configure_criterion() -> Criterion {
    let mut criterion = Criterion::default();

    if let Ok(sample_size) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(size) = sample_size.parse::<usize>() {
            criterion = criterion.sample_size(size);
            eprintln!("Configured sample size: {}", size);
        } else {
            eprintln!("Warning: Invalid BENCH_SAMPLE_SIZE value: {}", sample_size);
        }
    }

    if let Ok(measurement_time) = std::env::var("BENCH_MEASUREMENT_TIME") {
        if let Ok(secs) = measurement_time.parse::<u64>() {
            criterion = criterion.measurement_time(Duration::from_secs(secs));
            eprintln!("Configured measurement time: {}s", secs);
        } else {
            eprintln!("Warning: Invalid BENCH_MEASUREMENT_TIME value: {}", measurement_time);
        }
    }

    criterion
}

/// A record with `width` fields cycling through the field shapes the
/// translator treats differently.
fn wide_record(width: usize) -> DataSchemaTree {
    let fields: Vec<Value> = (0..width)
        .map(|i| match i % 4 {
            0 => json!({"name": format!("f{}", i), "type": "long"}),
            1 => json!({"name": format!("f{}", i), "type": "string", "optional": true}),
            2 => json!({"name": format!("f{}", i), "type": ["int", "string"], "optional": true, "default": {"int": 0}}),
            _ => json!({"name": format!("f{}", i), "type": {"type": "array", "items": "double"}}),
        })
        .collect();
    let schema = json!({"type": "record", "name": "Wide", "namespace": "bench", "fields": fields});
    parse_data_schema(&schema.to_string()).unwrap()
}

fn wide_value(tree: &DataSchemaTree, width: usize, seed: usize) -> DataValue {
    let entries: serde_json::Map<String, Value> = (0..width)
        .map(|i| {
            let value = match i % 4 {
                0 => json!(seed * i),
                1 => json!(format!("value-{}", seed)),
                2 => json!({"string": "x"}),
                _ => json!([0.5, 1.5, seed as f64]),
            };
            (format!("f{}", i), value)
        })
        .collect();
    DataValue::from_json_with_schema(&Value::Object(entries), &tree.arena, tree.root).unwrap()
}

fn bench_schema_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema_translation");

    for width in [8, 64, 512] {
        let tree = wide_record(width);
        let options = DataToAvroSchemaOptions::default();
        let avro = data_to_avro_schema(&tree.arena, tree.root, &options).unwrap();

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("forward", width), &tree, |b, tree| {
            b.iter(|| black_box(data_to_avro_schema(&tree.arena, tree.root, &options).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("backward", width), &avro, |b, avro| {
            let options = AvroToDataSchemaOptions::default();
            b.iter(|| black_box(avro_to_data_schema(avro, &options).unwrap()));
        });
    }

    group.finish();
}

fn bench_value_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_translation");
    let width = 32;
    let tree = wide_record(width);
    let avro_schema = data_to_avro_schema(&tree.arena, tree.root, &DataToAvroSchemaOptions::default()).unwrap();
    let options = DataTranslationOptions::default().with_adapter(std::sync::Arc::new(DefaultAvroAdapter::new()));

    for batch in [100, 1_000] {
        let values: Vec<DataValue> = (0..batch).map(|seed| wide_value(&tree, width, seed)).collect();
        let translated: Vec<_> = values
            .iter()
            .map(|v| data_to_avro(v, &tree.arena, tree.root, &avro_schema, &options).unwrap())
            .collect();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("to_avro", batch), &values, |b, values| {
            b.iter(|| {
                for value in values {
                    black_box(data_to_avro(value, &tree.arena, tree.root, &avro_schema, &options).unwrap());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("to_data", batch), &translated, |b, translated| {
            b.iter(|| {
                for value in translated {
                    black_box(avro_to_data(value, &avro_schema, &tree.arena, tree.root, &options).unwrap());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("binary_encode", batch), &translated, |b, translated| {
            let adapter = DefaultAvroAdapter::new();
            b.iter(|| {
                let mut encoder = adapter.new_binary_encoder();
                for value in translated {
                    encoder.write(&avro_schema, value).unwrap();
                }
                black_box(encoder.finish())
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_schema_translation, bench_value_translation
}

criterion_main!(benches);
