// CUDA Backend Tests — device memory, views, and the three transfer kinds
//
// Run with: `cargo test -p kestrel-cuda --features cuda`
//
// All tests create CudaDevice(0).

#![cfg(feature = "cuda")]

use kestrel_core::{Backend, BackendDevice, Error, MemcpyKind, Ownership, Tensor, Transfer};
use kestrel_cpu::{CpuBackend, CpuDevice};
use kestrel_cuda::{CudaBackend, CudaDevice};

type G = Tensor<CudaBackend, f32>;
type H = Tensor<CpuBackend, f32>;

fn gpu() -> CudaDevice {
    CudaDevice::new(0).expect("CUDA device 0 not available")
}

#[test]
fn test_transfer_kinds() {
    assert_eq!(<CudaBackend as Transfer<CpuBackend>>::kind(), MemcpyKind::HostToDevice);
    assert_eq!(<CpuBackend as Transfer<CudaBackend>>::kind(), MemcpyKind::DeviceToHost);
    assert_eq!(<CudaBackend as Transfer<CudaBackend>>::kind(), MemcpyKind::DeviceToDevice);
    assert_eq!(<CpuBackend as Transfer<CpuBackend>>::kind(), MemcpyKind::HostToHost);
}

#[test]
fn test_round_trip_through_device() -> kestrel_core::Result<()> {
    let dev = gpu();
    let host = CpuDevice::new(0);
    let src = H::from_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2, 1, 1), &host)?;

    let mut on_gpu = G::new((2, 2, 1, 1), &dev)?;
    on_gpu.copy_from(&src)?;
    let mut copy = G::new((4, 1, 1, 1), &dev)?;
    copy.copy_from(&on_gpu)?;

    let mut back = H::zeros((4, 1, 1, 1), &host)?;
    copy.copy_into(&mut back)?;
    assert_eq!(back.to_vec()?, vec![1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn test_device_views_and_release() -> kestrel_core::Result<()> {
    let dev = gpu();
    {
        let t = G::from_slice(&[10.0, 20.0, 30.0, 40.0], (4, 1, 1, 1), &dev)?;
        let v = t.section(1, 3)?;
        assert_eq!(v.ownership(), Ownership::Borrowed);
        assert_eq!(v.to_vec()?, vec![20.0, 30.0]);
        assert_eq!(v.ptr()?.0 - t.ptr()?.0, 4);
    }
    let stats = dev.arena().stats();
    assert_eq!((stats.allocations, stats.releases), (1, 1));
    Ok(())
}

#[test]
fn test_device_mem_set_and_shuffle() -> kestrel_core::Result<()> {
    let dev = gpu();
    let mut t = G::from_slice(&[0.0, 1.0, 2.0], (3, 1, 1, 1), &dev)?;
    t.shuffle(&[2, 0, 1])?;
    assert_eq!(t.to_vec()?, vec![2.0, 0.0, 1.0]);
    t.mem_set(0)?;
    assert_eq!(t.to_vec()?, vec![0.0; 3]);
    Ok(())
}

#[test]
fn test_dangling_device_view() -> kestrel_core::Result<()> {
    let dev = gpu();
    let t = G::zeros((2, 1, 1, 1), &dev)?;
    let v = t.create_view();
    drop(t);
    assert!(matches!(v.to_vec(), Err(Error::DanglingHandle { .. })));
    Ok(())
}

#[test]
fn test_device_identity() {
    let dev = gpu();
    assert_eq!(dev.name(), "cuda:0");
    assert_eq!(CudaBackend::NAME, "cuda");
}
