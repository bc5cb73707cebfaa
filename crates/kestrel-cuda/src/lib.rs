//! # kestrel-cuda
//!
//! Accelerator backend for kestrel on NVIDIA GPUs via cudarc.
//!
//! Compiled only with the `cuda` feature. The backend provides device
//! memory, the host↔device and device↔device transfer kinds, and a cuBLAS
//! handle per device for externally supplied numeric kernels. It does not
//! implement `Kernels`; numeric work on the accelerator is done by vendor
//! libraries that take `Tensor::ptr()`.

#[cfg(feature = "cuda")]
mod device;

#[cfg(feature = "cuda")]
pub use device::{CudaBackend, CudaDevice, CudaPtr, LARGE_ALLOC_BYTES};
