//! The NDArray handle and everything that operates on it.
//!
//! This module is organized into submodules:
//! - `types`: the [`NDArray`] struct and its shape predicates
//! - `creation`: allocation, wrapping and scalar constructors
//! - `access`: typed and converting element access
//! - `views`: permute, reshape, sub-arrays, TAD views, diagonals
//! - `bulk`: assignment, copies, casts, tiling and repetition
//! - `strings`: UTF-8/16/32 string arrays
//! - `sync`: host/device synchronization brackets
//! - `reduce`: reductions along dimensions
//! - `ops`: broadcast-backed arithmetic and comparisons
//! - `traits`: operator and formatting trait implementations

mod access;
mod bulk;
mod creation;
mod ops;
mod reduce;
mod strings;
mod sync;
mod traits;
mod types;
mod views;

pub use reduce::ReduceOp;
pub use types::NDArray;
pub use views::{DiagonalKind, SubRange};
