//! Error types for the NDArray runtime core
//!
//! Every fallible operation in this crate returns [`NdResult`]. Usage errors
//! (bad ranks, bad indices, mismatched types) surface as [`NdError`] variants;
//! the one deliberate exception is broadcasting, where incompatible operand
//! shapes are reported as `Ok(None)` rather than an error.
//!
//! # Examples
//!
//! ```
//! use ndrt_core::{NdError, NdResult};
//!
//! fn check_rank(rank: usize) -> NdResult<()> {
//!     if rank > 32 {
//!         return Err(NdError::invalid_argument("check_rank", "rank exceeds 32"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_rank(3).is_ok());
//! assert!(matches!(check_rank(40), Err(NdError::InvalidArgument { .. })));
//! ```

use crate::types::DataType;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type NdResult<T> = std::result::Result<T, NdError>;

/// Top-level error type for NDArray runtime operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NdError {
    /// Generic usage error with a human readable reason
    #[error("Invalid argument in {operation}: {message}")]
    InvalidArgument { operation: String, message: String },

    /// An accessor or operation was called with the wrong number of indices or dimensions
    #[error("{operation}: expected rank {expected}, got {actual}")]
    RankMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    /// Typed access requested an element type different from the array data type
    #[error("{operation}: requested {requested} but array holds {actual}")]
    TypeMismatch {
        operation: String,
        requested: DataType,
        actual: DataType,
    },

    #[error("{operation}: shapes {left:?} and {right:?} are not compatible")]
    ShapeMismatch {
        operation: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Byte-level copy would overrun its destination
    #[error("{operation}: {requested} bytes requested but only {available} available")]
    SizeMismatch {
        operation: String,
        requested: usize,
        available: usize,
    },

    #[error("Invalid dimensions {dims:?} for rank {rank}: {reason}")]
    InvalidDimensions {
        dims: Vec<usize>,
        rank: usize,
        reason: String,
    },

    #[error("Dimensions {dims:?} must be unique and sorted in ascending order")]
    UnsortedDimensions { dims: Vec<usize> },

    /// The memory ledger refused an allocation
    #[error("Allocation of {requested} bytes on {group} memory of device {device} exceeds limit {limit} ({allocated} already in use)")]
    Allocation {
        device: usize,
        group: String,
        requested: usize,
        allocated: usize,
        limit: usize,
    },

    #[error("{operation} is not supported for data type {dtype}")]
    Unsupported { operation: String, dtype: DataType },

    /// One broadcast operand was empty but the output was not
    #[error("{operation}: when some of the input arrays are empty, the output array must be empty as well")]
    EmptyOutputRequired { operation: String },
}

impl NdError {
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        NdError::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn rank_mismatch(operation: impl Into<String>, expected: usize, actual: usize) -> Self {
        NdError::RankMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    pub fn out_of_bounds(index: &[usize], shape: &[usize]) -> Self {
        NdError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: shape.to_vec(),
        }
    }

    pub fn type_mismatch(
        operation: impl Into<String>,
        requested: DataType,
        actual: DataType,
    ) -> Self {
        NdError::TypeMismatch {
            operation: operation.into(),
            requested,
            actual,
        }
    }

    pub fn shape_mismatch(operation: impl Into<String>, left: &[usize], right: &[usize]) -> Self {
        NdError::ShapeMismatch {
            operation: operation.into(),
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }

    pub fn size_mismatch(operation: impl Into<String>, requested: usize, available: usize) -> Self {
        NdError::SizeMismatch {
            operation: operation.into(),
            requested,
            available,
        }
    }

    pub fn invalid_dimensions(dims: &[usize], rank: usize, reason: impl Into<String>) -> Self {
        NdError::InvalidDimensions {
            dims: dims.to_vec(),
            rank,
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>, dtype: DataType) -> Self {
        NdError::Unsupported {
            operation: operation.into(),
            dtype,
        }
    }
}
