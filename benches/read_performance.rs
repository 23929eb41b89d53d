//! Performance benchmarks for cfgwatch.
//!
//! Measures the read side of the snapshot store:
//! - Snapshot load latency
//! - Decode latency for a typical application struct
//! - Decode throughput with concurrent readers
//! - Decode while the store is being replaced

use cfgwatch::core::{ConfigType, Snapshot, SourceStore, decode_snapshot};
use cfgwatch::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct BenchConfig {
    value: i32,
    name: String,
    flag: bool,
    items: Vec<String>,
}

fn document(value: i32) -> serde_json::Value {
    json!({
        "Value": value,
        "Name": format!("reload_{}", value),
        "Flag": value % 2 == 0,
        "Items": ["a", "b", "c"],
    })
}

fn bench_store() -> Arc<SourceStore> {
    let store = Arc::new(SourceStore::new());
    store.replace(Snapshot::new(document(42), ConfigType::Json));
    store
}

/// Benchmark snapshot load latency
fn benchmark_snapshot_load(c: &mut Criterion) {
    let store = bench_store();

    let mut group = c.benchmark_group("snapshot_load");
    group.bench_function("load", |b| {
        b.iter(|| {
            let snapshot = store.load();
            black_box(&snapshot.tree);
        });
    });
    group.finish();
}

/// Benchmark decoding through the case-insensitive binder
fn benchmark_decode(c: &mut Criterion) {
    let store = bench_store();

    let mut group = c.benchmark_group("decode");
    group.bench_function("decode_struct", |b| {
        b.iter(|| {
            let snapshot = store.load();
            let cfg: BenchConfig = decode_snapshot(&snapshot).unwrap();
            black_box(cfg.value);
        });
    });

    // Exact key matches skip the case-insensitive fallback
    let exact = Snapshot::new(
        json!({"value": 42, "name": "benchmark", "flag": true, "items": ["a", "b", "c"]}),
        ConfigType::Json,
    );
    group.bench_function("decode_struct_exact_keys", |b| {
        b.iter(|| {
            let cfg: BenchConfig = decode_snapshot(&exact).unwrap();
            black_box(cfg.value);
        });
    });
    group.finish();
}

/// Benchmark concurrent decodes with varying thread counts
fn benchmark_concurrent_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_decode");

    for num_threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let store = bench_store();
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for _ in 0..num_threads {
                        let store = Arc::clone(&store);
                        let barrier = Arc::clone(&barrier);

                        handles.push(thread::spawn(move || {
                            barrier.wait();

                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                let snapshot = store.load();
                                let cfg: BenchConfig = decode_snapshot(&snapshot).unwrap();
                                black_box(cfg.value);
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark replacing the snapshot while readers keep decoding
fn benchmark_replace_under_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_under_load");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("replace_with_8_readers", |b| {
        b.iter_custom(|iters| {
            let store = bench_store();
            let keep_running = Arc::new(AtomicBool::new(true));
            let decodes = Arc::new(AtomicUsize::new(0));

            let readers: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let running = Arc::clone(&keep_running);
                    let counter = Arc::clone(&decodes);

                    thread::spawn(move || {
                        while running.load(Ordering::Relaxed) {
                            let snapshot = store.load();
                            let cfg: BenchConfig = decode_snapshot(&snapshot).unwrap();
                            assert_eq!(cfg.name, format!("reload_{}", cfg.value));
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                })
                .collect();

            let start = std::time::Instant::now();
            for i in 0..iters {
                store.replace(Snapshot::new(document(i as i32), ConfigType::Json));
                thread::sleep(Duration::from_micros(100));
            }
            let duration = start.elapsed();

            keep_running.store(false, Ordering::Relaxed);
            for reader in readers {
                reader.join().unwrap();
            }

            println!(
                "  Completed {} decodes during {} replacements",
                decodes.load(Ordering::Relaxed),
                iters
            );
            duration
        });
    });

    group.finish();
}

/// Benchmark the full handle path, including the file-free empty case
fn benchmark_handle_decode(c: &mut Criterion) {
    let config = Configuration::new();

    let mut group = c.benchmark_group("handle");
    group.bench_function("decode_empty_map", |b| {
        b.iter(|| {
            let cfg: std::collections::HashMap<String, String> = config.decode().unwrap();
            black_box(cfg);
        });
    });
    group.bench_function("handle_clone", |b| {
        b.iter(|| {
            let cloned = config.clone();
            black_box(cloned);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_snapshot_load,
    benchmark_decode,
    benchmark_concurrent_decode,
    benchmark_replace_under_load,
    benchmark_handle_decode,
);

criterion_main!(benches);
