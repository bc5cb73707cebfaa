use crate::shape::Shape;

/// All errors that can occur within kestrel.
///
/// Every variant describes a configuration or programming mistake: a shape
/// that does not split evenly, a copy between buffers of different sizes, a
/// layer name nobody knows. None of them is transient, so nothing retries.
/// The library hands the error back; binaries print it and exit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two shapes that must agree do not.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Element counts differ (copy, elementwise op, host upload).
    #[error("element count mismatch: expected {expected} elements, got {got}")]
    ElementCountMismatch { expected: usize, got: usize },

    /// An axis split (`set_nums`, `set_chls`, `set_cols`) is not divisible.
    #[error("cannot split {axis}: {total} elements are not divisible by {target}")]
    IndivisibleSplit {
        axis: &'static str,
        total: usize,
        target: usize,
    },

    /// `re_shape` would change the total element count.
    #[error("cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements")]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// A slice request outside the addressed axis.
    #[error("slice [{begin}, {end}) out of bounds for {axis} extent {extent}")]
    SliceOutOfBounds {
        axis: &'static str,
        begin: usize,
        end: usize,
        extent: usize,
    },

    /// A shuffle permutation that is not a bijection on `[0, len)`.
    #[error("invalid permutation for {len} slices: {reason}")]
    InvalidPermutation { len: usize, reason: String },

    /// Layer type name not in the accepted set.
    #[error("unknown layer type '{0}'")]
    UnknownLayerType(String),

    /// Optimizer type name not in the accepted set.
    #[error("unknown optimizer type '{0}'")]
    UnknownOptimizer(String),

    /// A parallel configuration array is shorter than the entries it must cover.
    #[error("configuration array '{key}' has {got} entries, need at least {expected}")]
    ConfigLength {
        key: &'static str,
        expected: usize,
        got: usize,
    },

    /// No device registered under this ordinal.
    #[error("no device registered with ordinal {ordinal}")]
    UnknownDevice { ordinal: usize },

    /// A handle refers to an allocation that has already been released.
    #[error("allocation {id} has been released; the handle is dangling")]
    DanglingHandle { id: u64 },

    /// Release requested for an allocation that is no longer live.
    #[error("allocation {id} released twice")]
    DoubleRelease { id: u64 },

    /// A view would reach past the end of its allocation.
    #[error("view [{offset}, {offset}+{len}) bytes exceeds allocation of {capacity} bytes")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// Operation needs storage but the tensor is empty.
    #[error("tensor has no storage (call create first)")]
    EmptyTensor,

    /// Kernel/pad/stride combination that produces no output window.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Error reported by a device runtime (driver, allocator).
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Wrap a device runtime failure.
    pub fn backend(backend: &'static str, message: impl ToString) -> Self {
        Error::Backend {
            backend,
            message: message.to_string(),
        }
    }
}

/// Convenience Result type used throughout kestrel.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
