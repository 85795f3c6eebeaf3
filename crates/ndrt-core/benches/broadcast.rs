//! Benchmarks for broadcast dispatch.
//!
//! Covers each dispatch strategy: pairwise, scalar, true broadcast along
//! rows and columns.
//!
//! Run with:
//! ```bash
//! cargo bench --bench broadcast
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndrt_core::{broadcast_apply, ArithmeticOp, DataType, LaunchContext, NDArray};
use std::hint::black_box;

fn filled(ctx: &std::sync::Arc<LaunchContext>, shape: &[usize]) -> NDArray {
    let mut a = NDArray::zeros(ctx, shape, DataType::Float32).unwrap();
    a.fill_linspace(0.0, 0.5).unwrap();
    a
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_add");
    let ctx = LaunchContext::host();

    let test_cases = vec![
        ("pairwise_256x256", vec![256, 256], vec![256, 256]),
        ("scalar_256x256", vec![256, 256], vec![1]),
        ("row_256x256", vec![256, 256], vec![256]),
        ("column_256x256", vec![256, 256], vec![256, 1]),
        ("inner_32x32x64", vec![32, 32, 64], vec![32, 1, 64]),
    ];

    for (name, x_shape, y_shape) in test_cases {
        let x = filled(&ctx, &x_shape);
        let y = filled(&ctx, &y_shape);
        let mut z = NDArray::zeros(&ctx, &x_shape, DataType::Float32).unwrap();
        group.throughput(Throughput::Elements(x.length_of() as u64));

        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                broadcast_apply(ArithmeticOp::Add.into(), black_box(&x), black_box(&y), &mut z)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_scalar_on_left(c: &mut Criterion) {
    let ctx = LaunchContext::host();
    let s = NDArray::scalar(&ctx, 3.0f32).unwrap();
    let y = filled(&ctx, &[512, 512]);
    let mut z = NDArray::zeros(&ctx, &[512, 512], DataType::Float32).unwrap();

    c.bench_function("broadcast_rsub_scalar_left", |b| {
        b.iter(|| {
            broadcast_apply(ArithmeticOp::Subtract.into(), black_box(&s), &y, &mut z).unwrap()
        });
    });
}

criterion_group!(benches, bench_strategies, bench_scalar_on_left);
criterion_main!(benches);
