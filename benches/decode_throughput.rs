//! Benchmarks for frame decoding and trigger evaluation
//!
//! Run with: cargo bench

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uartium_rs::protocol::{decode_line, tokenize, FrameDecoder};
use uartium_rs::trigger::{Comparison, TriggerBuilder, TriggerEngine};
use uartium_rs::types::Level;

const LINES: &[&str] = &[
    "[INFO] Reading temperature: 23.4 C",
    r#"[WARNING] :m"High temperature alert" temp:f=38.1 threshold:f=35.0 :t=4821"#,
    r#"[DEBUG] :m"Motor telemetry" rpm:u=4200 current:f=1.25 voltage:f=4.9 temp:f=31.0 torque:f=2.31 efficiency:f=91.4 :t=9120"#,
    r#"[ERROR] :m"Connection lost" error:i=-4 retries:u=3 :t=1002"#,
    "cpu:u=42 memory:u=71 disk:u=55",
];

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for (idx, line) in LINES.iter().enumerate() {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::new("line", idx), line, |b, line| {
            b.iter(|| black_box(tokenize(black_box(line))));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = FrameDecoder::new();
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    group.throughput(Throughput::Elements(LINES.len() as u64));
    group.bench_function("mixed_lines", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(decoder.decode_at(black_box(line), ts));
            }
        });
    });

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let records: Vec<_> = (0..1000)
        .map(|i| {
            let mut record = decode_line(LINES[i % LINES.len()]);
            record.timestamp =
                Utc.timestamp_opt(1_700_000_000, 0).unwrap() + ChronoDuration::milliseconds(i as i64 * 10);
            record
        })
        .collect();

    for trigger_count in [1usize, 10, 50].iter() {
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("triggers", trigger_count),
            trigger_count,
            |b, &trigger_count| {
                b.iter_batched(
                    || {
                        let mut engine = TriggerEngine::new();
                        for i in 0..trigger_count {
                            let trigger = match i % 4 {
                                0 => TriggerBuilder::threshold("hot", "temp", Comparison::GreaterThan, 35.0),
                                1 => TriggerBuilder::pattern("lost", r"Connection\s+lost", true),
                                2 => TriggerBuilder::rate("burst", 500.0, 1.0),
                                _ => TriggerBuilder::error_count("errors", 100.0, 60.0),
                            };
                            engine.add(trigger.build());
                        }
                        engine
                    },
                    |mut engine| {
                        for record in &records {
                            black_box(engine.evaluate(record));
                        }
                        engine
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_error_window(c: &mut Criterion) {
    c.bench_function("error_window_churn", |b| {
        let mut engine = TriggerEngine::new();
        engine.add(TriggerBuilder::error_count("errors", 1e9, 300.0).build());
        let mut record = decode_line("[ERROR] churn");
        assert_eq!(record.level, Level::Error);
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut i = 0i64;
        b.iter(|| {
            record.timestamp = start + ChronoDuration::milliseconds(i);
            i += 1;
            black_box(engine.evaluate(&record));
        });
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_decode,
    bench_evaluate,
    bench_error_window,
);

criterion_main!(benches);
