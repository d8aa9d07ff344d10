//! Benchmarks for basic cache operations
//!
//! This benchmark suite measures the performance of:
//! - Client writes through the supervisor
//! - Hit vs miss latency
//! - Counter increments
//! - Pipelined writes vs individual writes
//!
//! Runs on the in-process store so no Redis is needed.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resilient_cache::{CacheSystem, CacheSystemBuilder};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Setup cache system for benchmarks
fn setup_cache() -> (CacheSystem, Runtime) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"));
    let cache = rt.block_on(CacheSystemBuilder::new().build());
    (cache, rt)
}

/// Generate test data of specified size
fn test_data(size_bytes: usize) -> serde_json::Value {
    let data_string = "x".repeat(size_bytes);
    json!({
        "data": data_string,
        "size": size_bytes,
        "timestamp": "2025-01-01T00:00:00Z"
    })
}

/// Benchmark write operations
fn bench_cache_set(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    let mut group = c.benchmark_group("cache_set");
    group.measurement_time(Duration::from_secs(10));

    for size in &[100, 1024, 10240, 102_400] {
        let data = test_data(*size);

        group.bench_with_input(BenchmarkId::new("set_with_ttl", size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:set:{}", rand::random::<u32>());
                    cache
                        .cache_client()
                        .set_with_ttl(&key, black_box(&data), 300)
                        .await
                        .unwrap_or_else(|_| panic!("Failed to set cache"));
                });
            });
        });
    }

    group.finish();
}

/// Benchmark read hits and misses
fn bench_cache_get(c: &mut Criterion) {
    let (cache, rt) = setup_cache();
    let data = test_data(1024);

    rt.block_on(async {
        cache
            .cache_client()
            .set_with_ttl("bench:get:hit", &data, 3600)
            .await
            .unwrap_or_else(|_| panic!("Failed to set cache"));
    });

    let mut group = c.benchmark_group("cache_get");

    group.bench_function("hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: Option<serde_json::Value> = cache
                    .cache_client()
                    .get(black_box("bench:get:hit"))
                    .await
                    .unwrap_or_else(|_| panic!("Failed to get cache"));
                black_box(value);
            });
        });
    });

    group.bench_function("miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: Option<serde_json::Value> = cache
                    .cache_client()
                    .get(black_box("bench:get:missing"))
                    .await
                    .unwrap_or_else(|_| panic!("Failed to get cache"));
                black_box(value);
            });
        });
    });

    group.finish();
}

/// Benchmark counter increments
fn bench_incr(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    c.bench_function("incr", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value = cache
                    .cache_client()
                    .incr(black_box("bench:counter"))
                    .await
                    .unwrap_or_else(|_| panic!("Failed to increment"));
                black_box(value);
            });
        });
    });
}

/// Benchmark a batch of writes, pipelined vs one call per write
fn bench_pipeline(c: &mut Criterion) {
    let (cache, rt) = setup_cache();
    let mut group = c.benchmark_group("batch_write");

    for batch in &[10_usize, 100] {
        group.bench_with_input(BenchmarkId::new("pipeline", batch), batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    let client = cache.cache_client();
                    let mut pipeline = client.pipeline();
                    for i in 0..batch {
                        pipeline = pipeline
                            .set(format!("bench:pipe:{i}"), &i, 300)
                            .unwrap_or_else(|_| panic!("Failed to encode"));
                    }
                    black_box(pipeline.execute().await.unwrap_or_else(|_| panic!("Pipeline failed")));
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("individual", batch), batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    for i in 0..batch {
                        cache
                            .cache_client()
                            .set_with_ttl(&format!("bench:single:{i}"), &i, 300)
                            .await
                            .unwrap_or_else(|_| panic!("Failed to set cache"));
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_set, bench_cache_get, bench_incr, bench_pipeline);
criterion_main!(benches);
