//! Integration tests for ndrt-core
//!
//! These tests exercise arrays, TAD packs, broadcasting and buffer
//! synchronization together through the public API.

use anyhow::Result;
use ndrt_core::buffer::{Freshness, Location, MemoryGroup};
use ndrt_core::tad::compute_tad;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use ndrt_core::{
    broadcast_apply, ArithmeticOp, BroadcastOutcome, DataType, LaunchContext, NDArray, NdError,
    Order, ReduceOp, RuntimeConfig, ShapeDescriptor, SubRange,
};

#[test]
fn test_permute_view_of_matrix() -> Result<()> {
    let ctx = LaunchContext::host();
    let a = NDArray::from_vec(&ctx, &[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;

    let p = a.permute(&[1, 0])?;
    assert_eq!(p.shape(), &[3, 2]);
    assert_eq!(p.strides(), &[1, 3]);
    assert!(p.is_view());
    assert_eq!(p.to_vec::<f32>()?, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

    // Shapes are never shared between views
    assert_eq!(a.shape(), &[2, 3]);
    assert_eq!(a.strides(), &[3, 1]);
    assert!(std::sync::Arc::ptr_eq(a.data_buffer(), p.data_buffer()));
    Ok(())
}

#[test]
fn test_scalar_on_the_left() -> Result<()> {
    let ctx = LaunchContext::host();
    let five = NDArray::scalar(&ctx, 5.0f64)?;
    let v = NDArray::from_vec(&ctx, &[3], vec![1.0f64, 2.0, 3.0])?;
    let mut z = NDArray::zeros(&ctx, &[3], DataType::Double)?;

    let outcome = broadcast_apply(ArithmeticOp::Add.into(), &five, &v, &mut z)?;
    assert!(matches!(outcome, Some(BroadcastOutcome::Target)));
    assert_eq!(z.to_vec::<f64>()?, vec![6.0, 7.0, 8.0]);

    broadcast_apply(ArithmeticOp::Subtract.into(), &five, &v, &mut z)?;
    assert_eq!(z.to_vec::<f64>()?, vec![4.0, 3.0, 2.0]);
    Ok(())
}

#[test]
fn test_tad_and_reduction_of_rank_three() -> Result<()> {
    let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &[2, 3, 4])?;
    let pack = compute_tad(&desc, &[1], false)?;
    assert_eq!(pack.sub_shape().extents(), &[2, 4]);
    assert_eq!(pack.sub_shape().strides(), &[12, 1]);
    assert_eq!(pack.offsets(), &[0, 4, 8]);

    let ctx = LaunchContext::host();
    let mut a = NDArray::zeros(&ctx, &[2, 3, 4], DataType::Float32)?;
    a.assign_scalar(1.0f32)?;
    let sums = a.reduce_along_dimension(ReduceOp::Sum, &[0, 2], false)?;
    assert_eq!(sums.shape(), &[3]);
    assert_eq!(sums.to_vec::<f32>()?, vec![8.0, 8.0, 8.0]);
    assert_eq!(a.tad_for_dimensions(&[0, 2])?.number_of_tads(), 3);
    Ok(())
}

#[test]
fn test_freshness_round_trip() -> Result<()> {
    let ctx = LaunchContext::new(RuntimeConfig::accelerated())?;
    let a = NDArray::from_vec(&ctx, &[4], vec![1i32, 2, 3, 4])?;
    let buffer = a.data_buffer();

    buffer.sync_to(Location::Special)?;
    assert!(buffer.is_actual(Location::Special));

    buffer.with_bytes_mut(Location::Special, |bytes| {
        bytes[..4].copy_from_slice(&42i32.to_le_bytes())
    });
    buffer.tick_write(Location::Special);
    assert_eq!(buffer.freshness(Location::Special), Freshness::Written);
    assert!(!buffer.is_actual(Location::Primary));

    assert_eq!(a.e::<i32>(0)?, 42);
    assert!(buffer.is_actual(Location::Primary));
    assert!(buffer.is_actual(Location::Special));
    Ok(())
}

#[test]
fn test_kernel_bracket_on_views() -> Result<()> {
    let ctx = LaunchContext::new(RuntimeConfig::accelerated())?;
    let x = NDArray::from_vec(&ctx, &[2, 2], vec![1.0f32, 2.0, 3.0, 4.0])?;
    let z = NDArray::zeros(&ctx, &[2, 2], DataType::Float32)?;

    NDArray::prepare_special_use(&[&z], &[&x, &x.transpose()], false)?;
    assert!(x.is_actual_on_device_side());
    assert!(z.data_buffer().is_allocated(Location::Special));
    NDArray::register_special_use(&[&z], &[&x]);
    assert!(!z.is_actual_on_host_side());
    assert!(x.is_actual_on_host_side());
    Ok(())
}

#[test]
fn test_sub_arrays_share_storage() -> Result<()> {
    let ctx = LaunchContext::host();
    let mut a = NDArray::zeros(&ctx, &[3, 4], DataType::Int32)?;
    a.fill_linspace(0.0, 1.0)?;

    let mut block = a.subarray(&[SubRange::Interval(1, 3), SubRange::Strided(0, 4, 2)], false)?;
    assert_eq!(block.shape(), &[2, 2]);
    assert_eq!(block.to_vec::<i32>()?, vec![4, 6, 8, 10]);

    block.assign_scalar(-1)?;
    assert_eq!(a.e::<i32>(4)?, -1);
    assert_eq!(a.e::<i32>(5)?, 5);

    let row = a.sub_array_at(2, &[0], false)?;
    assert_eq!(row.to_vec::<i32>()?, vec![-1, 9, -1, 11]);
    Ok(())
}

#[test]
fn test_copy_assignment_across_types() -> Result<()> {
    let ctx = LaunchContext::host();
    let src = NDArray::from_vec(&ctx, &[3], vec![1.9f64, -2.5, 7.0])?;
    let mut dst = NDArray::zeros(&ctx, &[3], DataType::Int16)?;

    dst.assign(&src)?;
    assert_eq!(dst.data_type(), DataType::Int16);
    assert_eq!(dst.to_vec::<i16>()?, vec![1, -2, 7]);

    dst.copy_assign(&src)?;
    assert_eq!(dst.data_type(), DataType::Double);

    let mismatched = NDArray::zeros(&ctx, &[4], DataType::Double)?;
    assert!(matches!(dst.assign(&mismatched), Err(NdError::InvalidArgument { .. })));
    Ok(())
}

#[test]
fn test_memory_limit_is_recoverable() -> Result<()> {
    let ctx = LaunchContext::new(RuntimeConfig::default().with_host_memory_limit(32))?;
    let a = NDArray::zeros(&ctx, &[4], DataType::Double)?;
    assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 32);

    let err = NDArray::zeros(&ctx, &[1], DataType::Int8).unwrap_err();
    assert!(matches!(err, NdError::Allocation { .. }));

    drop(a);
    assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 0);
    assert!(NDArray::zeros(&ctx, &[1], DataType::Int8).is_ok());
    Ok(())
}

#[test]
fn test_string_arrays_through_views() -> Result<()> {
    let ctx = LaunchContext::host();
    let words = ["alpha", "βeta", "gamma", "δelta"];
    let a = NDArray::from_strings(&ctx, &[2, 2], &words, DataType::Utf16)?;

    let t = a.transpose();
    assert_eq!(t.strings()?, vec!["alpha", "gamma", "βeta", "δelta"]);
    let copy = t.dup(Some(Order::C))?;
    assert!(copy.equals_to(&t, 0.0));
    Ok(())
}

#[test]
fn test_reshape_falls_back_to_copy() -> Result<()> {
    let ctx = LaunchContext::host();
    let a = NDArray::from_vec(&ctx, &[2, 3], vec![1u16, 2, 3, 4, 5, 6])?;
    let t = a.transpose();

    let flat = t.reshape(Order::C, &[6])?;
    assert!(!std::sync::Arc::ptr_eq(flat.data_buffer(), a.data_buffer()));
    assert_eq!(flat.to_vec::<u16>()?, vec![1, 4, 2, 5, 3, 6]);

    let same = a.reshape(Order::C, &[3, 2])?;
    assert!(std::sync::Arc::ptr_eq(same.data_buffer(), a.data_buffer()));
    Ok(())
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_cache_misses_log_at_debug() -> Result<()> {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let ctx = LaunchContext::new(RuntimeConfig::default())?;
    let desc = ShapeDescriptor::new(DataType::Int64, Order::C, &[5, 7, 3])?;
    tracing::subscriber::with_default(subscriber, || -> Result<()> {
        ctx.intern(&desc);
        ctx.tad_pack(&desc, &[1], false)?;
        Ok(())
    })?;

    let output = String::from_utf8(logs.0.lock().clone())?;
    let debug_lines: Vec<&str> = output.lines().filter(|l| l.contains("DEBUG")).collect();
    assert!(debug_lines.iter().any(|l| l.contains("interning new shape descriptor")));
    assert!(debug_lines.iter().any(|l| l.contains("cached new TAD pack")));
    Ok(())
}
