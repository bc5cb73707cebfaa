//! # kestrel-core
//!
//! Shape algebra, ownership-aware tensors, and backend traits for kestrel.
//!
//! This crate provides:
//! - [`Shape`] — fixed four-axis extents (rows, cols, chls, nums) with axis projections
//! - [`Patch`] / [`Pool`] — sliding-window geometry
//! - [`Tensor`] — device-tagged buffer handle with explicit ownership and views
//! - [`Backend`] / [`Transfer`] / [`Kernels`] — what a device must provide
//! - [`DeviceRegistry`] — explicit table of opened devices
//! - [`CsrTensor`] — compressed sparse row matrices
//! - [`Initializer`] — seedable random fills
//! - [`Arena`] — per-device table of live allocations behind every handle
//! - [`ops`] — numeric methods on `Tensor` for backends with `Kernels`

pub mod arena;
pub mod backend;
pub mod device;
pub mod dtype;
pub mod error;
pub mod geometry;
pub mod ops;
pub mod random;
pub mod shape;
pub mod sparse;
pub mod tensor;

pub use arena::{AllocId, Arena, ArenaStats};
pub use backend::{
    ArgOp, AxisSpan, Backend, BackendDevice, BinaryOp, GemmArgs, GemvArgs, Kernels, Location,
    MemcpyKind, ReduceOp, ScalarOp, Transfer, UnaryOp,
};
pub use device::DeviceRegistry;
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use geometry::{Patch, PatchGeometry, Pool, PoolGeometry};
pub use random::{Init, Initializer};
pub use shape::{Axis, Shape};
pub use sparse::CsrTensor;
pub use tensor::{Ownership, Tensor};
