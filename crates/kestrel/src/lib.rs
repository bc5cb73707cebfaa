//! # kestrel
//!
//! Device-polymorphic tensors and configuration-driven layer graphs.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kestrel::prelude::*;
//!
//! let config = kestrel::config::load_json("net.json")?;
//! let plan = GraphBuilder::new(&config).build()?;
//! let net = Network::<CpuBackend>::assemble(&plan, &CpuDevice::new(0))?;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `kestrel-core` | Shape, geometry, Tensor, ownership arena, Backend traits, numeric surface |
//! | `kestrel-cpu` | Host backend with rayon-parallel reference kernels |
//! | `kestrel-cuda` | CUDA backend (feature-gated) |
//! | `kestrel-nn` | LayerSpec, GraphBuilder, optimizer descriptors, layers, Network |
//!
//! ## Modules
//!
//! - [`config`] — JSON loading of [`nn::NetConfig`]
//! - [`persist`] — raw buffer save/load

/// Re-export core types.
pub use kestrel_core::{
    bail, AllocId, Arena, ArenaStats, Axis, Backend, BackendDevice, CsrTensor, DType,
    DeviceRegistry, Error, Init, Initializer, Kernels, Location, MemcpyKind, Ownership, Patch,
    Pool, Result, Shape, Tensor, Transfer, WithDType,
};

/// Re-export the host backend.
pub use kestrel_cpu::{CpuBackend, CpuDevice};

/// Re-export the CUDA backend (requires `cuda` feature + NVIDIA CUDA Toolkit).
#[cfg(feature = "cuda")]
pub use kestrel_cuda::{CudaBackend, CudaDevice};

/// Re-export graph construction and layers.
pub mod nn {
    pub use kestrel_nn::*;
}

/// Configuration loading.
pub mod config;

/// Raw buffer persistence.
pub mod persist;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::nn::{
        create_layer, GraphBuilder, Layer, LayerKind, LayerSpec, NetConfig, NetPlan, Network,
        OptimDescriptor, OptimKind,
    };
    pub use crate::persist::{load_raw, save_raw};
    pub use crate::{
        Backend, BackendDevice, CpuBackend, CpuDevice, DeviceRegistry, Initializer, Shape, Tensor,
    };
}
