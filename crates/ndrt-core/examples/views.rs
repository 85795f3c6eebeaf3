//! Array views and shape operations.
//!
//! This example demonstrates:
//! - Permute and transpose as zero-copy views
//! - Reshape with and without a copy
//! - Sub-ranges, TAD views and diagonals
//!
//! Run with:
//! ```bash
//! cargo run --example views
//! ```

use anyhow::Result;
use ndrt_core::{DiagonalKind, LaunchContext, NDArray, Order, SubRange};
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== ndrt-core: Views and Shape Operations ===\n");

    let ctx = LaunchContext::host();
    example_permute(&ctx)?;
    example_reshape(&ctx)?;
    example_sub_arrays(&ctx)?;

    println!("\n=== All examples completed successfully! ===");
    Ok(())
}

fn example_permute(ctx: &Arc<LaunchContext>) -> Result<()> {
    println!("--- Example 1: Permute ---");

    let a = NDArray::from_vec(ctx, &[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let p = a.permute(&[1, 0])?;
    println!("Original {:?} strides {:?}: {}", a.shape(), a.strides(), a);
    println!("Permuted {:?} strides {:?}: {}", p.shape(), p.strides(), p);
    println!(
        "Shares storage: {}",
        Arc::ptr_eq(a.data_buffer(), p.data_buffer())
    );

    println!();
    Ok(())
}

fn example_reshape(ctx: &Arc<LaunchContext>) -> Result<()> {
    println!("--- Example 2: Reshape ---");

    let mut a = NDArray::zeros(ctx, &[2, 3, 4], ndrt_core::DataType::Int32)?;
    a.fill_linspace(0.0, 1.0)?;

    let viewed = a.reshape(Order::C, &[6, 4])?;
    println!(
        "[2, 3, 4] -> [6, 4] is a view: {}",
        Arc::ptr_eq(viewed.data_buffer(), a.data_buffer())
    );

    let copied = a.transpose().reshape(Order::C, &[24])?;
    println!(
        "transposed -> [24] is a view: {}",
        Arc::ptr_eq(copied.data_buffer(), a.data_buffer())
    );
    println!("First elements after the copy: {:?}", &copied.to_vec::<i32>()?[..4]);

    println!();
    Ok(())
}

fn example_sub_arrays(ctx: &Arc<LaunchContext>) -> Result<()> {
    println!("--- Example 3: Sub-arrays ---");

    let mut m = NDArray::zeros(ctx, &[4, 4], ndrt_core::DataType::Double)?;
    m.fill_linspace(0.0, 1.0)?;

    let block = m.subarray(&[SubRange::Interval(1, 3), SubRange::All], false)?;
    println!("Rows 1..3: {}", block);

    let columns = m.all_tensors_along_dimension(&[0])?;
    println!("Column TADs: {}", columns.len());
    println!("Column 2: {}", columns[2]);

    let diag = m.diagonal(DiagonalKind::Column)?;
    println!("Diagonal {:?}: {}", diag.shape(), diag);

    Ok(())
}
