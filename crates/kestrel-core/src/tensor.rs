use std::fmt;
use std::marker::PhantomData;

use crate::arena::AllocId;
use crate::backend::{Backend, BackendDevice, Transfer};
use crate::dtype::WithDType;
use crate::error::{Error, Result};
use crate::shape::Shape;

// Tensor — Device-tagged, ownership-aware handle to a flat buffer
//
// A Tensor is a four-axis Shape plus a handle into one allocation on one
// device. It does not compute anything by itself; numeric work goes through
// `ops` (host kernels) or external accelerator libraries that take `ptr()`.
//
// OWNERSHIP:
//
//   Every allocation has exactly one Owning handle. `create` makes one;
//   `section`, `slice_at`, `segment`, `create_view` and `assign_view` make
//   Borrowed handles into the same allocation. Dropping or clearing the
//   Owning handle releases the allocation; Borrowed handles never release.
//
//   Views carry no reference count. A view that outlives its owner is
//   dangling, and any access through it fails with `DanglingHandle` because
//   the allocation id is no longer in the device arena.
//
// ALIASING vs COPYING:
//
//   Tensor is not Clone. Aliasing is spelled `create_view` / `assign_view`,
//   copying is spelled `copy_from` / `copy_into`, and the copy direction is
//   fixed by the static backend types through `Transfer<Src>`.
//
// LAYOUT:
//
//   Elements are contiguous, cols fastest, then rows, chls, nums. A view is
//   an allocation id plus a byte offset; its extent is the view's shape.

/// Whether a handle is responsible for releasing its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owning,
    Borrowed,
}

#[derive(Debug, Clone, Copy)]
struct Storage {
    id: AllocId,
    /// Byte offset of this handle inside the allocation.
    offset: usize,
}

/// A four-axis buffer of `T` on backend `B`.
pub struct Tensor<B: Backend, T: WithDType = f32> {
    shape: Shape,
    device: Option<B::Device>,
    storage: Option<Storage>,
    ownership: Ownership,
    _dtype: PhantomData<T>,
}

impl<B: Backend, T: WithDType> Tensor<B, T> {
    /// A tensor with no storage and the empty shape.
    pub fn empty() -> Self {
        Tensor {
            shape: Shape::empty(),
            device: None,
            storage: None,
            ownership: Ownership::Borrowed,
            _dtype: PhantomData,
        }
    }

    /// Allocate a new owning tensor. Contents are unspecified.
    pub fn new(shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let mut t = Self::empty();
        t.create(shape, device)?;
        Ok(t)
    }

    /// Allocate a new owning tensor filled with zero bytes.
    pub fn zeros(shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let mut t = Self::new(shape, device)?;
        t.mem_set(0)?;
        Ok(t)
    }

    /// Allocate a new owning tensor and upload `data` into it.
    pub fn from_slice(data: &[T], shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let mut t = Self::new(shape, device)?;
        t.write_slice(data)?;
        Ok(t)
    }

    //  Accessors

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn dims(&self) -> usize {
        self.shape.dims()
    }

    pub fn device(&self) -> Option<&B::Device> {
        self.device.as_ref()
    }

    /// Ordinal of the device this tensor lives on.
    pub fn device_id(&self) -> Option<usize> {
        self.device.as_ref().map(|d| d.ordinal())
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owning(&self) -> bool {
        self.ownership == Ownership::Owning
    }

    /// True when the tensor has no storage.
    pub fn is_empty(&self) -> bool {
        self.storage.is_none()
    }

    /// Allocation this handle refers to.
    pub fn alloc_id(&self) -> Option<AllocId> {
        self.storage.map(|s| s.id)
    }

    /// Element offset of this handle inside its allocation.
    pub fn elem_offset(&self) -> usize {
        self.storage.map(|s| s.offset / T::width()).unwrap_or(0)
    }

    /// Bytes covered by this handle.
    pub fn byte_len(&self) -> usize {
        self.shape.size() * T::width()
    }

    fn require_device(&self) -> Result<&B::Device> {
        self.device.as_ref().ok_or(Error::EmptyTensor)
    }

    /// Resolve this handle to a raw backend pointer.
    ///
    /// Fails if the tensor is empty, the allocation has been released, or
    /// the view would reach past the allocation.
    pub fn ptr(&self) -> Result<B::Ptr> {
        let storage = self.storage.ok_or(Error::EmptyTensor)?;
        let device = self.require_device()?;
        let slot = B::arena(device).resolve(storage.id)?;
        let len = self.byte_len();
        if storage.offset + len > slot.bytes {
            return Err(Error::ViewOutOfBounds {
                offset: storage.offset,
                len,
                capacity: slot.bytes,
            });
        }
        Ok(B::offset(slot.ptr, storage.offset))
    }

    //  Allocation

    /// Allocate storage for `shape` on `device` and become the owner.
    ///
    /// Any allocation this handle already owns is released first, so calling
    /// `create` twice never leaks.
    pub fn create(&mut self, shape: impl Into<Shape>, device: &B::Device) -> Result<()> {
        self.clear()?;
        let shape = shape.into();
        let bytes = shape.size() * T::width();
        if bytes > B::LARGE_ALLOC_BYTES {
            tracing::warn!(
                backend = B::NAME,
                device = device.ordinal(),
                bytes,
                %shape,
                "large allocation"
            );
        }
        let ptr = B::allocate(device, bytes)?;
        let id = match B::arena(device).insert(ptr, bytes) {
            Ok(id) => id,
            Err(e) => {
                // SAFETY: ptr came straight from allocate and was never shared.
                unsafe { B::release(device, ptr, bytes)? };
                return Err(e);
            }
        };
        tracing::debug!(
            backend = B::NAME,
            device = device.ordinal(),
            %id,
            bytes,
            "allocated"
        );
        self.shape = shape;
        self.device = Some(device.clone());
        self.storage = Some(Storage { id, offset: 0 });
        self.ownership = Ownership::Owning;
        Ok(())
    }

    fn release(device: &B::Device, id: AllocId) -> Result<()> {
        let slot = B::arena(device).remove(id)?;
        // SAFETY: the slot was just removed from the arena, so no handle can
        // resolve it again.
        unsafe { B::release(device, slot.ptr, slot.bytes)? };
        tracing::debug!(
            backend = B::NAME,
            device = device.ordinal(),
            %id,
            bytes = slot.bytes,
            "released"
        );
        Ok(())
    }

    /// Release the allocation if owning and reset to the empty shape.
    ///
    /// On a view only this handle is reset; the owner is untouched.
    pub fn clear(&mut self) -> Result<()> {
        let storage = self.storage.take();
        let device = self.device.take();
        let ownership = std::mem::replace(&mut self.ownership, Ownership::Borrowed);
        self.shape = Shape::empty();
        match (ownership, storage, device) {
            (Ownership::Owning, Some(storage), Some(device)) => Self::release(&device, storage.id),
            _ => Ok(()),
        }
    }

    //  Views

    fn view(&self, shape: Shape, elem_offset: usize) -> Self {
        Tensor {
            shape,
            device: self.device.clone(),
            storage: self.storage.map(|s| Storage {
                id: s.id,
                offset: s.offset + elem_offset * T::width(),
            }),
            ownership: Ownership::Borrowed,
            _dtype: PhantomData,
        }
    }

    /// Borrowed alias of the whole tensor.
    pub fn create_view(&self) -> Self {
        self.view(self.shape, 0)
    }

    /// Turn this handle into a Borrowed alias of `other`.
    ///
    /// An allocation this handle owned is released first.
    pub fn assign_view(&mut self, other: &Self) -> Result<()> {
        self.clear()?;
        self.shape = other.shape;
        self.device = other.device.clone();
        self.storage = other.storage;
        self.ownership = Ownership::Borrowed;
        Ok(())
    }

    /// View over `[begin, end)` along the outermost structural axis
    /// (nums for 4-d, chls for 3-d, rows otherwise).
    pub fn section(&self, begin: usize, end: usize) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::EmptyTensor);
        }
        let axis = self.shape.outer_axis();
        let extent = self.shape.extent(axis);
        if begin >= end || end > extent {
            return Err(Error::SliceOutOfBounds {
                axis: axis.name(),
                begin,
                end,
                extent,
            });
        }
        let stride = self.shape.size() / extent;
        Ok(self.view(self.shape.with_extent(axis, end - begin), stride * begin))
    }

    /// View of the single outer slice `i`.
    pub fn slice_at(&self, i: usize) -> Result<Self> {
        self.section(i, i + 1)
    }

    /// Flat view over elements `[begin, end)`, shaped `(end - begin, 1, 1, 1)`.
    pub fn segment(&self, begin: usize, end: usize) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::EmptyTensor);
        }
        if begin >= end || end > self.shape.size() {
            return Err(Error::SliceOutOfBounds {
                axis: "elements",
                begin,
                end,
                extent: self.shape.size(),
            });
        }
        Ok(self.view(Shape::new(end - begin, 1, 1, 1), begin))
    }

    /// Extent of the axis `section` slices along.
    pub fn outer_extent(&self) -> usize {
        self.shape.extent(self.shape.outer_axis())
    }

    //  Shape re-interpretation (element count unchanged)

    pub fn re_shape(&mut self, rows: usize, cols: usize, chls: usize, nums: usize) -> Result<()> {
        self.shape.re_shape(rows, cols, chls, nums)
    }

    pub fn set_nums(&mut self, n: usize) -> Result<()> {
        self.shape.set_nums(n)
    }

    pub fn set_chls(&mut self, c: usize) -> Result<()> {
        self.shape.set_chls(c)
    }

    pub fn set_cols(&mut self, c: usize) -> Result<()> {
        self.shape.set_cols(c)
    }

    //  Host data access

    /// Set every byte of the buffer to `value`.
    pub fn mem_set(&mut self, value: u8) -> Result<()> {
        let ptr = self.ptr()?;
        let device = self.require_device()?;
        // SAFETY: ptr() checked the range against the live allocation.
        unsafe { B::fill(device, ptr, self.byte_len(), value) }
    }

    /// Set every element to `value`.
    pub fn init(&mut self, value: T) -> Result<()> {
        let data = vec![value; self.size()];
        self.write_slice(&data)
    }

    /// Upload `data` into the buffer; lengths must match exactly.
    pub fn write_slice(&mut self, data: &[T]) -> Result<()> {
        if data.len() != self.size() {
            return Err(Error::ElementCountMismatch {
                expected: self.size(),
                got: data.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let ptr = self.ptr()?;
        let device = self.require_device()?;
        // SAFETY: ptr() checked the range; lengths match.
        unsafe { B::upload(device, ptr, as_bytes(data)) }
    }

    /// Download the buffer into a host vector.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut out = vec![T::zero(); self.size()];
        if out.is_empty() {
            return Ok(out);
        }
        let ptr = self.ptr()?;
        let device = self.require_device()?;
        // SAFETY: ptr() checked the range; lengths match.
        unsafe { B::download(device, ptr, as_bytes_mut(&mut out))? };
        Ok(out)
    }

    /// Raw contents in native byte order, `size × width` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(as_bytes(&self.to_vec()?).to_vec())
    }

    /// Overwrite the buffer from raw bytes in native byte order.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.byte_len() {
            return Err(Error::ElementCountMismatch {
                expected: self.byte_len(),
                got: bytes.len(),
            });
        }
        let mut data = vec![T::zero(); self.size()];
        as_bytes_mut(&mut data).copy_from_slice(bytes);
        self.write_slice(&data)
    }

    //  Transfers

    /// Byte-exact copy of `src` into this buffer. Element counts must match;
    /// shapes may differ.
    pub fn copy_from<S>(&mut self, src: &Tensor<S, T>) -> Result<()>
    where
        S: Backend,
        B: Transfer<S>,
    {
        if src.size() != self.size() {
            return Err(Error::ElementCountMismatch {
                expected: self.size(),
                got: src.size(),
            });
        }
        if self.size() == 0 {
            return Ok(());
        }
        let dst_ptr = self.ptr()?;
        let src_ptr = src.ptr()?;
        let dst_device = self.require_device()?;
        let src_device = src.device().ok_or(Error::EmptyTensor)?;
        let bytes = self.byte_len();
        tracing::debug!(
            kind = ?<B as Transfer<S>>::kind(),
            src = src_device.ordinal(),
            dst = dst_device.ordinal(),
            bytes,
            "copy"
        );
        // SAFETY: both ranges were checked against their live allocations.
        unsafe { <B as Transfer<S>>::transfer(dst_device, dst_ptr, src_device, src_ptr, bytes) }
    }

    /// Byte-exact copy of this buffer into `dst`.
    pub fn copy_into<D>(&self, dst: &mut Tensor<D, T>) -> Result<()>
    where
        D: Transfer<B>,
    {
        dst.copy_from(self)
    }

    /// Reorder outer slices: slice `i` becomes the old slice `permutation[i]`.
    ///
    /// The permutation is checked to be a bijection before any data moves.
    /// The result is staged in a temporary of the same shape on the same
    /// device and copied back.
    pub fn shuffle(&mut self, permutation: &[usize]) -> Result<()>
    where
        B: Transfer<B>,
    {
        let extent = self.outer_extent();
        validate_permutation(permutation, extent)?;
        let device = self.require_device()?.clone();

        let mut staged: Tensor<B, T> = Tensor::new(self.shape, &device)?;
        for (i, &from) in permutation.iter().enumerate() {
            let mut dst = staged.slice_at(i)?;
            dst.copy_from(&self.slice_at(from)?)?;
        }
        self.copy_from(&staged)
    }
}

fn validate_permutation(permutation: &[usize], len: usize) -> Result<()> {
    if permutation.len() != len {
        return Err(Error::InvalidPermutation {
            len,
            reason: format!("expected {} entries, got {}", len, permutation.len()),
        });
    }
    let mut seen = vec![false; len];
    for &p in permutation {
        if p >= len {
            return Err(Error::InvalidPermutation {
                len,
                reason: format!("index {p} out of range"),
            });
        }
        if std::mem::replace(&mut seen[p], true) {
            return Err(Error::InvalidPermutation {
                len,
                reason: format!("index {p} repeated"),
            });
        }
    }
    Ok(())
}

fn as_bytes<T: WithDType>(data: &[T]) -> &[u8] {
    // SAFETY: WithDType is only implemented for plain numeric types without
    // padding or invalid bit patterns.
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data)) }
}

fn as_bytes_mut<T: WithDType>(data: &mut [T]) -> &mut [u8] {
    // SAFETY: see `as_bytes`; every byte pattern is a valid value.
    unsafe {
        std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut u8, std::mem::size_of_val(data))
    }
}

impl<B: Backend, T: WithDType> Default for Tensor<B, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<B: Backend, T: WithDType> Drop for Tensor<B, T> {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            tracing::error!(backend = B::NAME, error = %e, "release on drop failed");
        }
    }
}

impl<B: Backend, T: WithDType> fmt::Debug for Tensor<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, device={:?}, {:?}",
            self.shape,
            T::DTYPE,
            self.device_id(),
            self.ownership,
        )?;
        if let Some(s) = self.storage {
            write!(f, ", alloc={}+{}", s.id, s.offset)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_validation() {
        assert!(validate_permutation(&[2, 0, 1], 3).is_ok());
        assert!(validate_permutation(&[], 0).is_ok());
        assert!(matches!(
            validate_permutation(&[0, 0, 1], 3),
            Err(Error::InvalidPermutation { .. })
        ));
        assert!(validate_permutation(&[0, 3, 1], 3).is_err());
        assert!(validate_permutation(&[0, 1], 3).is_err());
    }

    #[test]
    fn test_byte_views() {
        let v = [1.0f32, -2.0];
        let bytes = as_bytes(&v);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }
}
