use std::fmt;

use crate::arena::Arena;
use crate::dtype::WithDType;
use crate::error::Result;

// Backend — Abstraction over where buffers live (host heap, accelerator)
//
// A backend provides a handful of memory capabilities:
//
//   allocate / release   raw storage of a byte count
//   fill                 byte-wise memset
//   upload / download    byte copies between host slices and backend memory
//   offset               pointer arithmetic for views
//
// plus `Transfer<Src>` for backend-to-backend copies. Everything above that
// (ownership, views, slicing, shape checks) lives in `Tensor` and is shared
// by all backends.
//
// Numeric kernels are a separate, optional capability (`Kernels`). The host
// backend implements them as reference code; accelerator kernels come from
// vendor libraries outside this workspace.
//
// All pointer-taking methods are `unsafe`: the caller guarantees that the
// pointer came from this backend's `allocate` (possibly offset) and that the
// byte range is inside that allocation. `Tensor` upholds this by resolving
// every pointer through the device's `Arena` and bounds-checking the view.

/// Where a backend's memory physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Host,
    Accelerator,
}

/// The four transfer kinds, selected by source and destination location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemcpyKind {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

impl MemcpyKind {
    pub fn between(src: Location, dst: Location) -> Self {
        match (src, dst) {
            (Location::Host, Location::Host) => MemcpyKind::HostToHost,
            (Location::Host, Location::Accelerator) => MemcpyKind::HostToDevice,
            (Location::Accelerator, Location::Host) => MemcpyKind::DeviceToHost,
            (Location::Accelerator, Location::Accelerator) => MemcpyKind::DeviceToDevice,
        }
    }
}

/// Identifies a compute device (e.g., "cpu:0", "cuda:1").
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    /// A human-readable name for this device.
    fn name(&self) -> String;

    /// Device id carried by every tensor created on this device.
    fn ordinal(&self) -> usize;
}

/// Memory capabilities every backend must provide.
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    /// Device handle; cheap to clone.
    type Device: BackendDevice;
    /// Raw pointer into this backend's memory.
    type Ptr: Copy + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// Short backend name for logs and errors.
    const NAME: &'static str;
    const LOCATION: Location;
    /// Allocations above this many bytes are logged at warn level.
    const LARGE_ALLOC_BYTES: usize;

    /// Open the device with the given ordinal.
    fn open(ordinal: usize) -> Result<Self::Device>;

    /// The allocation arena owned by a device.
    fn arena(device: &Self::Device) -> &Arena<Self::Ptr>;

    /// Allocate `bytes` of uninitialized storage.
    fn allocate(device: &Self::Device, bytes: usize) -> Result<Self::Ptr>;

    /// Release storage obtained from `allocate`.
    ///
    /// # Safety
    /// `ptr` must be the unmodified result of `allocate(device, bytes)` and
    /// must not be used afterwards.
    unsafe fn release(device: &Self::Device, ptr: Self::Ptr, bytes: usize) -> Result<()>;

    /// Advance a pointer by `bytes`.
    fn offset(ptr: Self::Ptr, bytes: usize) -> Self::Ptr;

    /// Set `bytes` bytes starting at `ptr` to `value`.
    ///
    /// # Safety
    /// `[ptr, ptr + bytes)` must lie inside one live allocation.
    unsafe fn fill(device: &Self::Device, ptr: Self::Ptr, bytes: usize, value: u8) -> Result<()>;

    /// Copy a host byte slice into backend memory.
    ///
    /// # Safety
    /// `[dst, dst + src.len())` must lie inside one live allocation.
    unsafe fn upload(device: &Self::Device, dst: Self::Ptr, src: &[u8]) -> Result<()>;

    /// Copy backend memory into a host byte slice.
    ///
    /// # Safety
    /// `[src, src + dst.len())` must lie inside one live allocation.
    unsafe fn download(device: &Self::Device, src: Self::Ptr, dst: &mut [u8]) -> Result<()>;
}

/// Byte-exact copies from backend `Src` into `Self`.
///
/// Implemented once per (source, destination) pair, so the transfer kind is
/// fixed by the static types of the two tensors.
pub trait Transfer<Src: Backend>: Backend {
    /// Copy `bytes` bytes from `src` to `dst`.
    ///
    /// # Safety
    /// Both ranges must lie inside live allocations of their devices.
    unsafe fn transfer(
        dst_device: &Self::Device,
        dst: Self::Ptr,
        src_device: &Src::Device,
        src: Src::Ptr,
        bytes: usize,
    ) -> Result<()>;

    fn kind() -> MemcpyKind {
        MemcpyKind::between(Src::LOCATION, Self::LOCATION)
    }
}

//  Numeric kernel surface

/// Element-wise unary operations: `dst[i] = op(src[i])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Exp,
    /// 1 / x
    Inv,
    Square,
    Sqrt,
}

/// Element-wise binary operations: `dst[i] = lhs[i] op rhs[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// In-place operations with a scalar operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarOp {
    /// x + v
    Add,
    /// x * v
    Scale,
    /// v
    Fill,
    /// clamp(x, -v, v)
    Project,
}

/// Reductions, either over a whole buffer or along a kept axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
    Mean,
    /// Population variance.
    Var,
    /// Sum of absolute values.
    AbsSum,
    /// Sum of squares.
    SumSq,
}

/// Index-returning reductions over absolute values (BLAS i?amax / i?amin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgOp {
    AbsMax,
    AbsMin,
}

/// Describes one axis of a buffer for kept-axis reductions and broadcasts.
///
/// The index of flat element `i` along the axis is `(i / stride) % extent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSpan {
    /// Elements in the large buffer.
    pub len: usize,
    /// Extent of the kept axis (length of the small buffer).
    pub extent: usize,
    /// Element distance between consecutive indices of the axis.
    pub stride: usize,
}

impl AxisSpan {
    pub fn index_of(&self, i: usize) -> usize {
        (i / self.stride) % self.extent
    }
}

/// `C = alpha * op(A) * op(B) + beta * C`, all row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmArgs {
    pub trans_a: bool,
    pub trans_b: bool,
    /// Rows of C.
    pub m: usize,
    /// Columns of C.
    pub n: usize,
    /// Shared inner dimension.
    pub k: usize,
    pub alpha: f64,
    pub beta: f64,
}

/// `y = alpha * op(A) * x + beta * y`; `rows` × `cols` is A as stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemvArgs {
    pub trans_a: bool,
    pub rows: usize,
    pub cols: usize,
    pub alpha: f64,
    pub beta: f64,
}

/// Numeric kernels over raw backend memory.
///
/// Every method takes element counts, not bytes. Destination and source
/// ranges may alias (e.g. `exp` in place); implementations must read inputs
/// before writing outputs.
///
/// # Safety
/// All pointer arguments must address live allocations large enough for the
/// element counts given; index buffers must hold valid CSR indices.
pub trait Kernels: Backend {
    unsafe fn unary_op<T: WithDType>(
        device: &Self::Device,
        op: UnaryOp,
        dst: Self::Ptr,
        src: Self::Ptr,
        len: usize,
    ) -> Result<()>;

    unsafe fn binary_op<T: WithDType>(
        device: &Self::Device,
        op: BinaryOp,
        dst: Self::Ptr,
        lhs: Self::Ptr,
        rhs: Self::Ptr,
        len: usize,
    ) -> Result<()>;

    unsafe fn scalar_op<T: WithDType>(
        device: &Self::Device,
        op: ScalarOp,
        dst: Self::Ptr,
        len: usize,
        value: f64,
    ) -> Result<()>;

    /// Reduce a whole buffer to one value.
    unsafe fn reduce_all<T: WithDType>(
        device: &Self::Device,
        op: ReduceOp,
        src: Self::Ptr,
        len: usize,
    ) -> Result<f64>;

    /// `dst[j] = op over { src[i] : span.index_of(i) == j }`.
    unsafe fn reduce_axis<T: WithDType>(
        device: &Self::Device,
        op: ReduceOp,
        dst: Self::Ptr,
        src: Self::Ptr,
        span: AxisSpan,
    ) -> Result<()>;

    /// `dst[i] = dst[i] op small[span.index_of(i)]`.
    unsafe fn broadcast_op<T: WithDType>(
        device: &Self::Device,
        op: BinaryOp,
        dst: Self::Ptr,
        small: Self::Ptr,
        span: AxisSpan,
    ) -> Result<()>;

    /// Index and (signed) value of the element with the largest or smallest
    /// magnitude; the first one wins on ties.
    unsafe fn arg_reduce<T: WithDType>(
        device: &Self::Device,
        op: ArgOp,
        src: Self::Ptr,
        len: usize,
    ) -> Result<(usize, f64)>;

    unsafe fn dot<T: WithDType>(
        device: &Self::Device,
        lhs: Self::Ptr,
        rhs: Self::Ptr,
        len: usize,
    ) -> Result<f64>;

    /// `y += alpha * x`.
    unsafe fn axpy<T: WithDType>(
        device: &Self::Device,
        y: Self::Ptr,
        x: Self::Ptr,
        len: usize,
        alpha: f64,
    ) -> Result<()>;

    unsafe fn gemm<T: WithDType>(
        device: &Self::Device,
        args: GemmArgs,
        c: Self::Ptr,
        a: Self::Ptr,
        b: Self::Ptr,
    ) -> Result<()>;

    unsafe fn gemv<T: WithDType>(
        device: &Self::Device,
        args: GemvArgs,
        y: Self::Ptr,
        a: Self::Ptr,
        x: Self::Ptr,
    ) -> Result<()>;

    /// Sparse CSR matrix-vector product, `GemvArgs` describing the dense
    /// shape of the sparse matrix. `row_ptr` has `rows + 1` entries.
    #[allow(clippy::too_many_arguments)]
    unsafe fn csr_gemv<T: WithDType>(
        device: &Self::Device,
        args: GemvArgs,
        y: Self::Ptr,
        values: Self::Ptr,
        row_ptr: Self::Ptr,
        col_idx: Self::Ptr,
        x: Self::Ptr,
    ) -> Result<()>;

    /// `Y += alpha * S` for a dense row-major `Y` and CSR matrix `S`.
    #[allow(clippy::too_many_arguments)]
    unsafe fn csr_axpy<T: WithDType>(
        device: &Self::Device,
        rows: usize,
        cols: usize,
        y: Self::Ptr,
        values: Self::Ptr,
        row_ptr: Self::Ptr,
        col_idx: Self::Ptr,
        alpha: f64,
    ) -> Result<()>;
}
