//! Benchmarks for shape interning.
//!
//! Interning runs on every array construction and view, so both the hit path
//! and the insert path matter.
//!
//! Run with:
//! ```bash
//! cargo bench --bench shape_cache
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndrt_core::{DataType, Order, ShapeCache, ShapeDescriptor};
use std::hint::black_box;

/// Repeated lookups of an already interned descriptor
fn bench_intern_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_hit");

    let test_cases = vec![
        ("scalar", vec![]),
        ("vector", vec![1024]),
        ("matrix", vec![256, 256]),
        ("rank_4", vec![8, 16, 32, 64]),
        ("rank_6", vec![2, 3, 4, 5, 6, 7]),
    ];

    for (name, shape) in test_cases {
        let cache = ShapeCache::new(1, false);
        let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &shape).unwrap();
        cache.intern(&desc);

        group.bench_with_input(BenchmarkId::from_parameter(name), &desc, |b, desc| {
            b.iter(|| black_box(cache.intern(black_box(desc))));
        });
    }

    group.finish();
}

/// Filling a fresh cache with distinct descriptors
fn bench_intern_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_insert");

    for count in [16usize, 256, 4096] {
        let descriptors: Vec<ShapeDescriptor> = (1..=count)
            .map(|n| ShapeDescriptor::new(DataType::Int64, Order::C, &[n, 3]).unwrap())
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &descriptors,
            |b, descriptors| {
                b.iter(|| {
                    let cache = ShapeCache::new(1, true);
                    for desc in descriptors {
                        black_box(cache.intern(desc));
                    }
                    cache.len()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_intern_hit, bench_intern_insert);
criterion_main!(benches);
