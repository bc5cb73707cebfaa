// CUDA Backend — Device memory and transfers through the cudarc driver API
//
// ARCHITECTURE:
// - CudaDevice wraps cudarc's device handle, a cuBLAS handle, and the
//   allocation arena for that GPU. Clones share all three through Arc.
// - Memory is raw driver memory (cuMemAlloc / cuMemFree); tensors see it as
//   a CudaPtr plus byte offsets, exactly like host memory.
// - Every driver call first binds the device's context to the calling
//   thread, so tensors on different GPUs can be used from one thread.
// - Copies between two different GPUs are staged through a host buffer.
//
// USAGE:
//   let device = CudaBackend::open(0)?;
//   let t = Tensor::<CudaBackend>::zeros((28, 28, 1, 64), &device)?;

use std::fmt;
use std::sync::Arc;

use cudarc::cublas::CudaBlas;
use cudarc::driver::{result, sys};

use kestrel_core::arena::Arena;
use kestrel_core::backend::{Backend, BackendDevice, Location, Transfer};
use kestrel_core::error::{Error, Result};
use kestrel_cpu::{CpuBackend, CpuDevice, HostPtr};

/// Allocations above this size are reported at warn level.
pub const LARGE_ALLOC_BYTES: usize = 1_000_000;

/// Raw device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaPtr(pub sys::CUdeviceptr);

fn driver_err(e: impl fmt::Display) -> Error {
    Error::backend(CudaBackend::NAME, e)
}

// CudaDevice — Wraps a cudarc CUDA device + cuBLAS handle + arena

/// A CUDA device handle. Clonable (uses Arc internally).
#[derive(Clone)]
pub struct CudaDevice {
    dev: Arc<cudarc::driver::CudaDevice>,
    blas: Arc<CudaBlas>,
    arena: Arc<Arena<CudaPtr>>,
    ordinal: usize,
}

impl CudaDevice {
    /// Open the GPU with the given ordinal (0, 1, ...).
    pub fn new(ordinal: usize) -> Result<Self> {
        let dev = cudarc::driver::CudaDevice::new(ordinal)
            .map_err(|e| Error::msg(format!("CUDA device creation failed: {e}")))?;
        let blas = CudaBlas::new(dev.clone())
            .map_err(|e| Error::msg(format!("cuBLAS init failed: {e}")))?;
        tracing::info!(ordinal, "opened CUDA device");
        Ok(CudaDevice {
            dev,
            blas: Arc::new(blas),
            arena: Arc::new(Arena::new()),
            ordinal,
        })
    }

    /// Get the underlying cudarc device handle.
    pub fn device(&self) -> &Arc<cudarc::driver::CudaDevice> {
        &self.dev
    }

    /// Get the cuBLAS handle.
    pub fn blas(&self) -> &CudaBlas {
        &self.blas
    }

    pub fn arena(&self) -> &Arena<CudaPtr> {
        &self.arena
    }

    fn bind(&self) -> Result<()> {
        self.dev.bind_to_thread().map_err(driver_err)
    }

    /// Block until all work queued on this device has finished.
    pub fn synchronize(&self) -> Result<()> {
        self.dev.synchronize().map_err(driver_err)
    }
}

impl fmt::Debug for CudaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CudaDevice({})", self.ordinal)
    }
}

impl BackendDevice for CudaDevice {
    fn name(&self) -> String {
        format!("cuda:{}", self.ordinal)
    }

    fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// The CUDA backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaBackend;

impl Backend for CudaBackend {
    type Device = CudaDevice;
    type Ptr = CudaPtr;

    const NAME: &'static str = "cuda";
    const LOCATION: Location = Location::Accelerator;
    const LARGE_ALLOC_BYTES: usize = LARGE_ALLOC_BYTES;

    fn open(ordinal: usize) -> Result<CudaDevice> {
        CudaDevice::new(ordinal)
    }

    fn arena(device: &CudaDevice) -> &Arena<CudaPtr> {
        &device.arena
    }

    fn allocate(device: &CudaDevice, bytes: usize) -> Result<CudaPtr> {
        device.bind()?;
        // SAFETY: plain driver allocation; a zero-sized request is rounded up
        // so every allocation has a distinct address.
        let ptr = unsafe { result::malloc_sync(bytes.max(1)) }.map_err(driver_err)?;
        Ok(CudaPtr(ptr))
    }

    unsafe fn release(device: &CudaDevice, ptr: CudaPtr, _bytes: usize) -> Result<()> {
        device.bind()?;
        result::free_sync(ptr.0).map_err(driver_err)
    }

    fn offset(ptr: CudaPtr, bytes: usize) -> CudaPtr {
        CudaPtr(ptr.0 + bytes as sys::CUdeviceptr)
    }

    unsafe fn fill(device: &CudaDevice, ptr: CudaPtr, bytes: usize, value: u8) -> Result<()> {
        device.bind()?;
        result::memset_d8_sync(ptr.0, value, bytes).map_err(driver_err)
    }

    unsafe fn upload(device: &CudaDevice, dst: CudaPtr, src: &[u8]) -> Result<()> {
        device.bind()?;
        result::memcpy_htod_sync(dst.0, src).map_err(driver_err)
    }

    unsafe fn download(device: &CudaDevice, src: CudaPtr, dst: &mut [u8]) -> Result<()> {
        device.bind()?;
        result::memcpy_dtoh_sync(dst, src.0).map_err(driver_err)
    }
}

// Transfers — one impl per direction

impl Transfer<CpuBackend> for CudaBackend {
    unsafe fn transfer(
        dst_device: &CudaDevice,
        dst: CudaPtr,
        _src_device: &CpuDevice,
        src: HostPtr,
        bytes: usize,
    ) -> Result<()> {
        let host = std::slice::from_raw_parts(src.as_ptr() as *const u8, bytes);
        Self::upload(dst_device, dst, host)
    }
}

impl Transfer<CudaBackend> for CpuBackend {
    unsafe fn transfer(
        _dst_device: &CpuDevice,
        dst: HostPtr,
        src_device: &CudaDevice,
        src: CudaPtr,
        bytes: usize,
    ) -> Result<()> {
        let host = std::slice::from_raw_parts_mut(dst.as_ptr(), bytes);
        CudaBackend::download(src_device, src, host)
    }
}

impl Transfer<CudaBackend> for CudaBackend {
    unsafe fn transfer(
        dst_device: &CudaDevice,
        dst: CudaPtr,
        src_device: &CudaDevice,
        src: CudaPtr,
        bytes: usize,
    ) -> Result<()> {
        if dst_device.ordinal == src_device.ordinal {
            dst_device.bind()?;
            return result::memcpy_dtod_sync(dst.0, src.0, bytes).map_err(driver_err);
        }
        let mut staging = vec![0u8; bytes];
        Self::download(src_device, src, &mut staging)?;
        Self::upload(dst_device, dst, &staging)
    }
}
