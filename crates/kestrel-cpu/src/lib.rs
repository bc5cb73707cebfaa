//! # kestrel-cpu
//!
//! Host backend for kestrel: 64-byte aligned heap buffers, host-to-host
//! transfers, and reference implementations of every numeric kernel.
//!
//! ```ignore
//! use kestrel_core::{Backend, Tensor};
//! use kestrel_cpu::CpuBackend;
//!
//! let device = CpuBackend::open(0)?;
//! let t = Tensor::<CpuBackend>::from_slice(&[1.0, 2.0, 3.0], (3, 1, 1, 1), &device)?;
//! ```

mod ops;

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use kestrel_core::arena::Arena;
use kestrel_core::backend::{Backend, BackendDevice, Location, Transfer};
use kestrel_core::error::{Error, Result};

const ALIGN: usize = 64;

/// Allocations above this size are reported at warn level.
pub const LARGE_ALLOC_BYTES: usize = 1_000_000_000;

/// Raw pointer into host memory owned by the CPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPtr(NonNull<u8>);

// SAFETY: a HostPtr is only dereferenced inside backend methods whose
// callers guarantee the range is live; the pointer itself is plain data.
unsafe impl Send for HostPtr {}
unsafe impl Sync for HostPtr {}

impl HostPtr {
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }
}

fn layout_for(bytes: usize) -> Result<Layout> {
    Layout::from_size_align(bytes.max(1), ALIGN)
        .map_err(|e| Error::backend(CpuBackend::NAME, e))
}

// CpuDevice — A host "device" with its own allocation arena
//
// Several host devices can exist side by side (one per simulated worker);
// each keeps its own arena so allocation statistics stay per-device.

/// Host device handle. Cheap to clone; clones share the arena.
#[derive(Clone)]
pub struct CpuDevice {
    ordinal: usize,
    arena: Arc<Arena<HostPtr>>,
}

impl CpuDevice {
    pub fn new(ordinal: usize) -> Self {
        CpuDevice {
            ordinal,
            arena: Arc::new(Arena::new()),
        }
    }

    pub fn arena(&self) -> &Arena<HostPtr> {
        &self.arena
    }
}

impl fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuDevice({})", self.ordinal)
    }
}

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        format!("cpu:{}", self.ordinal)
    }

    fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// The host backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Ptr = HostPtr;

    const NAME: &'static str = "cpu";
    const LOCATION: Location = Location::Host;
    const LARGE_ALLOC_BYTES: usize = LARGE_ALLOC_BYTES;

    fn open(ordinal: usize) -> Result<CpuDevice> {
        Ok(CpuDevice::new(ordinal))
    }

    fn arena(device: &CpuDevice) -> &Arena<HostPtr> {
        &device.arena
    }

    fn allocate(device: &CpuDevice, bytes: usize) -> Result<HostPtr> {
        let layout = layout_for(bytes)?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw).map(HostPtr).ok_or_else(|| {
            Error::backend(Self::NAME, format!("out of memory allocating {bytes} bytes"))
        })?;
        tracing::debug!(device = device.ordinal, bytes, "host buffer allocated");
        Ok(ptr)
    }

    unsafe fn release(device: &CpuDevice, ptr: HostPtr, bytes: usize) -> Result<()> {
        let layout = layout_for(bytes)?;
        alloc::dealloc(ptr.as_ptr(), layout);
        tracing::debug!(device = device.ordinal, bytes, "host buffer released");
        Ok(())
    }

    fn offset(ptr: HostPtr, bytes: usize) -> HostPtr {
        // SAFETY: callers only offset within the allocation (checked by
        // Tensor::ptr), so the result is in bounds and non-null.
        HostPtr(unsafe { NonNull::new_unchecked(ptr.as_ptr().add(bytes)) })
    }

    unsafe fn fill(_device: &CpuDevice, ptr: HostPtr, bytes: usize, value: u8) -> Result<()> {
        std::ptr::write_bytes(ptr.as_ptr(), value, bytes);
        Ok(())
    }

    unsafe fn upload(_device: &CpuDevice, dst: HostPtr, src: &[u8]) -> Result<()> {
        std::ptr::copy(src.as_ptr(), dst.as_ptr(), src.len());
        Ok(())
    }

    unsafe fn download(_device: &CpuDevice, src: HostPtr, dst: &mut [u8]) -> Result<()> {
        std::ptr::copy(src.as_ptr(), dst.as_mut_ptr(), dst.len());
        Ok(())
    }
}

impl Transfer<CpuBackend> for CpuBackend {
    unsafe fn transfer(
        _dst_device: &CpuDevice,
        dst: HostPtr,
        _src_device: &CpuDevice,
        src: HostPtr,
        bytes: usize,
    ) -> Result<()> {
        // ranges may overlap when a view is copied onto its own parent
        std::ptr::copy(src.as_ptr(), dst.as_ptr(), bytes);
        Ok(())
    }
}
