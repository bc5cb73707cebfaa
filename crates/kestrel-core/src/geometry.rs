// Geometry — Patch-extraction and pooling window descriptors
//
// Both descriptors share the classic sliding-window formula, applied to the
// rows and cols axes independently:
//
//   out = floor((in + 2*pad - ksize) / stride) + 1
//
// A Patch (im2col) unrolls every ksize×ksize window of every channel into a
// column, so its output packs `ksize² · chls` values per column and one
// column per window position:
//
//   (rows, cols, chls, nums) → (ksize²·chls, h_col·w_col, 1, nums)
//
// A Pool keeps channels and batch and shrinks the spatial axes:
//
//   (rows, cols, chls, nums) → (h_pool, w_pool, chls, nums)
//
// The window counts are returned next to the shape; the descriptors
// themselves never change after construction.

use crate::error::{Error, Result};
use crate::shape::Shape;

fn window_count(extent: usize, ksize: usize, pad: usize, stride: usize) -> Result<usize> {
    if stride == 0 {
        return Err(Error::InvalidGeometry("stride must be positive".into()));
    }
    if ksize == 0 {
        return Err(Error::InvalidGeometry("kernel size must be positive".into()));
    }
    let padded = extent + 2 * pad;
    if padded < ksize {
        return Err(Error::InvalidGeometry(format!(
            "kernel {ksize} larger than padded extent {padded}"
        )));
    }
    Ok((padded - ksize) / stride + 1)
}

/// Patch-extraction (im2col) window descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub ksize: usize,
    pub pad: usize,
    pub stride: usize,
}

/// Output of [`Patch::pack_shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGeometry {
    /// Shape of the unrolled column buffer.
    pub shape: Shape,
    /// Window positions along rows.
    pub h_col: usize,
    /// Window positions along cols.
    pub w_col: usize,
}

impl Patch {
    pub fn new(ksize: usize, pad: usize, stride: usize) -> Self {
        Patch { ksize, pad, stride }
    }

    /// Column-buffer shape and window counts for an input shape.
    pub fn pack_shape(&self, input: &Shape) -> Result<PatchGeometry> {
        let h_col = window_count(input.rows(), self.ksize, self.pad, self.stride)?;
        let w_col = window_count(input.cols(), self.ksize, self.pad, self.stride)?;
        Ok(PatchGeometry {
            shape: Shape::new(
                self.ksize * self.ksize * input.chls(),
                h_col * w_col,
                1,
                input.nums(),
            ),
            h_col,
            w_col,
        })
    }
}

/// Pooling window descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool {
    pub ksize: usize,
    pub pad: usize,
    pub stride: usize,
}

/// Output of [`Pool::pool_shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolGeometry {
    /// Shape of the pooled buffer.
    pub shape: Shape,
    pub h_pool: usize,
    pub w_pool: usize,
}

impl Pool {
    pub fn new(ksize: usize, pad: usize, stride: usize) -> Self {
        Pool { ksize, pad, stride }
    }

    /// Pooled shape and window counts for an input shape.
    pub fn pool_shape(&self, input: &Shape) -> Result<PoolGeometry> {
        let h_pool = window_count(input.rows(), self.ksize, self.pad, self.stride)?;
        let w_pool = window_count(input.cols(), self.ksize, self.pad, self.stride)?;
        Ok(PoolGeometry {
            shape: Shape::new(h_pool, w_pool, input.chls(), input.nums()),
            h_pool,
            w_pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_same_padding() {
        // 3x3 kernel, pad 1, stride 1 keeps 28x28
        let g = Patch::new(3, 1, 1)
            .pack_shape(&Shape::new(28, 28, 16, 8))
            .unwrap();
        assert_eq!((g.h_col, g.w_col), (28, 28));
        assert_eq!(g.shape, Shape::new(9 * 16, 28 * 28, 1, 8));
    }

    #[test]
    fn test_patch_strided() {
        // (32 + 0 - 5) / 3 + 1 = 10, (20 - 5) / 3 + 1 = 6
        let g = Patch::new(5, 0, 3)
            .pack_shape(&Shape::new(32, 20, 3, 2))
            .unwrap();
        assert_eq!((g.h_col, g.w_col), (10, 6));
        assert_eq!(g.shape.extents(), [75, 60, 1, 2]);
    }

    #[test]
    fn test_pool_floor_division() {
        // (7 - 2) / 2 + 1 = 3 (floor), channels and batch preserved
        let g = Pool::new(2, 0, 2).pool_shape(&Shape::new(7, 8, 4, 5)).unwrap();
        assert_eq!((g.h_pool, g.w_pool), (3, 4));
        assert_eq!(g.shape, Shape::new(3, 4, 4, 5));
    }

    #[test]
    fn test_repeated_queries_are_independent() {
        let pool = Pool::new(3, 1, 2);
        let a = pool.pool_shape(&Shape::new(9, 9, 1, 1)).unwrap();
        let b = pool.pool_shape(&Shape::new(5, 5, 1, 1)).unwrap();
        assert_eq!((a.h_pool, b.h_pool), (5, 3));
        assert_eq!(pool, Pool::new(3, 1, 2));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(Pool::new(2, 0, 0).pool_shape(&Shape::new(4, 4, 1, 1)).is_err());
        assert!(Patch::new(5, 0, 1).pack_shape(&Shape::new(3, 3, 1, 1)).is_err());
    }
}
