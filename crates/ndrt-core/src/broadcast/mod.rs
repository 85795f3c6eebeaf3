//! Binary operations between arrays of equal or broadcastable shapes.
//!
//! This module is organized into submodules:
//! - `ops`: the operation families and their scalar semantics
//! - `kernels`: the [`BroadcastKernels`] seam and its host implementation
//! - `dispatch`: [`broadcast_apply`], which picks pairwise, scalar or
//!   true-broadcast execution from the operand shapes

mod dispatch;
mod kernels;
mod ops;

pub(crate) use dispatch::warn_incompatible;
pub use dispatch::{broadcast_apply, broadcast_apply_with, BroadcastOutcome};
pub use kernels::{BroadcastKernels, HostKernels};
pub use ops::{ArithmeticOp, BoolOp, BroadcastOp, IntOp};
