//! Benchmarks for TAD decomposition.
//!
//! Run with:
//! ```bash
//! cargo bench --bench tad
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndrt_core::tad::{compute_tad, TadCache, TadDescriptor};
use ndrt_core::{DataType, Order, ShapeDescriptor};
use std::hint::black_box;

/// Uncached decomposition for various shapes and excluded axes
fn bench_compute_tad(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_tad");

    let test_cases = vec![
        ("rows_1000x1000", vec![1000, 1000], vec![0]),
        ("cols_1000x1000", vec![1000, 1000], vec![1]),
        ("middle_100x100x100", vec![100, 100, 100], vec![1]),
        ("outer_two_100x100x100", vec![100, 100, 100], vec![0, 2]),
        ("batch_32x64x64x3", vec![32, 64, 64, 3], vec![0, 3]),
    ];

    for (name, shape, excluded) in test_cases {
        let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &shape).unwrap();
        let tads: usize = excluded.iter().map(|&d| shape[d]).product();
        group.throughput(Throughput::Elements(tads as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(&desc, &excluded),
            |b, (desc, excluded)| {
                b.iter(|| black_box(compute_tad(desc, black_box(excluded), false).unwrap()));
            },
        );
    }

    group.finish();
}

/// Cached lookups of a pack that is already present
fn bench_tad_cache_hit(c: &mut Criterion) {
    let cache = TadCache::new();
    let desc = ShapeDescriptor::new(DataType::Double, Order::F, &[512, 512]).unwrap();
    let key = TadDescriptor::new(&desc, &[1], false);
    cache.get_or_compute(&key).unwrap();

    c.bench_function("tad_cache_hit", |b| {
        b.iter(|| black_box(cache.get_or_compute(black_box(&key)).unwrap()));
    });
}

criterion_group!(benches, bench_compute_tad, bench_tad_cache_hit);
criterion_main!(benches);
