//! # ndrt-core
//!
//! Runtime core for N-dimensional arrays: typed buffers that live on a host
//! and optionally a device, interned shape descriptors, tensor-along-dimension
//! decomposition and broadcast dispatch.
//!
//! The crate provides:
//!
//! - **Arrays** ([`NDArray`]) as views over shared [`buffer::DataBuffer`]s
//! - **Shape descriptors** ([`ShapeDescriptor`]) and their interning cache
//! - **TAD packs** ([`tad::TadPack`]) splitting an array into sub-arrays
//! - **Broadcasting** ([`broadcast_apply`]) over float, bool and integer ops
//! - **A launch context** ([`LaunchContext`]) owning caches and the memory ledger
//!
//! ## Core Principles
//!
//! ### Explicit context
//!
//! There is no global runtime. Every array holds an `Arc<LaunchContext>` that
//! owns its shape cache, TAD cache and memory ledger. [`LaunchContext::host`]
//! builds a host-only context; [`RuntimeConfig::accelerated`] enables the
//! emulated device side.
//!
//! ### Memory layout
//!
//! Arrays are C (row-major) or F (column-major). Logical element indices are
//! always row-major over the shape, whatever the physical order. Permute,
//! transpose, sub-arrays and compatible reshapes are zero-copy views.
//!
//! ### Freshness
//!
//! Each buffer tracks which of its host and device copies holds the newest
//! data. Element access synchronizes on demand; kernels bracket their work with
//! [`NDArray::prepare_special_use`] and [`NDArray::register_special_use`].
//!
//! ## Quick Start
//!
//! ```
//! use ndrt_core::{DataType, LaunchContext, NDArray, Order};
//!
//! let ctx = LaunchContext::host();
//! let a = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
//!
//! let p = a.permute(&[1, 0]).unwrap();
//! assert_eq!(p.shape(), &[3, 2]);
//! assert_eq!(p.strides(), &[1, 3]);
//! assert_eq!(p.e::<i32>(1).unwrap(), 4);
//!
//! let z = NDArray::new(&ctx, Order::F, &[2, 2], DataType::Float32).unwrap();
//! assert_eq!(z.strides(), &[1, 2]);
//! ```
//!
//! ## Broadcasting
//!
//! ```
//! use ndrt_core::{LaunchContext, NDArray};
//!
//! let ctx = LaunchContext::host();
//! let five = NDArray::scalar(&ctx, 5.0f32).unwrap();
//! let v = NDArray::from_vec(&ctx, &[3], vec![1.0f32, 2.0, 3.0]).unwrap();
//!
//! assert_eq!((&five + &v).to_vec::<f32>().unwrap(), vec![6.0, 7.0, 8.0]);
//! assert_eq!((&five - &v).to_vec::<f32>().unwrap(), vec![4.0, 3.0, 2.0]);
//! ```
//!
//! ## Error Handling
//!
//! Usage errors return [`NdError`]. Infeasible requests, such as broadcasting
//! incompatible shapes, return `None` or `false` instead:
//!
//! ```
//! use ndrt_core::{ArithmeticOp, DataType, LaunchContext, NDArray};
//!
//! let ctx = LaunchContext::host();
//! let a = NDArray::zeros(&ctx, &[2, 3], DataType::Double).unwrap();
//!
//! assert!(a.e::<f32>(0).is_err());
//! let b = NDArray::zeros(&ctx, &[4], DataType::Double).unwrap();
//! assert!(a.apply_broadcast(ArithmeticOp::Add, &b).unwrap().is_none());
//! ```
//!
//! ## Features
//!
//! - `parallel`: compute large TAD offset tables and reductions with rayon
//! - `serde`: serialization of descriptors, data types and configuration

pub mod array;
pub mod broadcast;
pub mod buffer;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod shape;
pub mod tad;
pub mod types;


pub use array::{DiagonalKind, NDArray, ReduceOp, SubRange};
pub use broadcast::{
    broadcast_apply, ArithmeticOp, BoolOp, BroadcastOp, BroadcastOutcome, IntOp,
};
pub use config::RuntimeConfig;
pub use context::LaunchContext;
pub use element::Element;
pub use error::{NdError, NdResult};
pub use shape::{ShapeCache, ShapeDescriptor};
pub use types::{ArrayKind, DataType, Order, Scalar, Shape};
