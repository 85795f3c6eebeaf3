//! Broadcasting and the host/device freshness protocol.
//!
//! Run with:
//! ```bash
//! RUST_LOG=ndrt_core=debug cargo run --example broadcasting
//! ```

use anyhow::Result;
use ndrt_core::buffer::Location;
use ndrt_core::{
    broadcast_apply, ArithmeticOp, BoolOp, BroadcastOutcome, DataType, LaunchContext, NDArray,
    ReduceOp, RuntimeConfig,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== ndrt-core: Broadcasting ===\n");

    let ctx = LaunchContext::new(RuntimeConfig::from_env()?.with_accelerated(true))?;

    let m = NDArray::from_vec(&ctx, &[2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let row = NDArray::from_vec(&ctx, &[3], vec![10.0f64, 20.0, 30.0])?;
    let col = NDArray::from_vec(&ctx, &[2, 1], vec![100.0f64, 200.0])?;

    println!("m + row = {}", &m + &row);
    println!("m + col = {}", &m + &col);
    println!("5 - m   = {}", m.rsub_scalar(5.0)?);
    println!("m > 3   = {}", m.compare(BoolOp::GreaterThan, &NDArray::scalar(&ctx, 3.0f64)?)?);

    let five = NDArray::scalar(&ctx, 5.0f64)?;
    let mut flat = NDArray::zeros(&ctx, &[6], DataType::Double)?;
    match broadcast_apply(ArithmeticOp::Divide.into(), &five, &m, &mut flat)? {
        Some(BroadcastOutcome::Materialized(result)) => {
            println!("5 / m materialized as {:?}: {}", result.shape(), result)
        }
        other => println!("5 / m: {other:?}"),
    }

    let bad = NDArray::zeros(&ctx, &[4], DataType::Double)?;
    let mut out = NDArray::zeros(&ctx, &[2, 3], DataType::Double)?;
    let result = broadcast_apply(ArithmeticOp::Add.into(), &m, &bad, &mut out)?;
    println!("[2, 3] + [4] broadcastable: {}", result.is_some());

    println!("\n--- Freshness ---");
    let buffer = m.data_buffer();
    NDArray::prepare_special_use(&[], &[&m], false)?;
    println!("device actual after prepare: {}", buffer.is_actual(Location::Special));
    m.tick_write_device();
    println!("host actual after device write: {}", m.is_actual_on_host_side());
    println!("row sums: {}", m.reduce_along_dimension(ReduceOp::Sum, &[1], false)?);
    println!("host actual after read: {}", m.is_actual_on_host_side());

    Ok(())
}
