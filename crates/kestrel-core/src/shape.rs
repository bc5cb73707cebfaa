use std::fmt;

use crate::error::{Error, Result};

// Shape — Fixed four-axis extent of a buffer
//
// Every buffer in kestrel has exactly four logical axes:
//
//   rows  (axis code 1)
//   cols  (axis code 2)
//   chls  (axis code 3)  channels
//   nums  (axis code 4)  batch
//
// Memory is laid out with cols fastest-varying, then rows, then channels,
// then batch. An element (n, c, r, k) lives at
//
//   ((n * chls + c) * rows + r) * cols + k
//
// Derived quantities:
//   size  product of the four extents, unless overridden at construction
//         (sparse buffers carry an irregular element count)
//   dims  number of axes up to the highest one whose extent exceeds 1,
//         under the precedence nums > chls > cols > rows
//
// Two shapes are equal when their four extents are equal; `size` is not
// compared.

/// Canonical axis codes used by the projection methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows = 1,
    Cols = 2,
    Chls = 3,
    Nums = 4,
}

impl Axis {
    /// Numeric code of this axis (1 = rows … 4 = nums).
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Axis> {
        match code {
            1 => Some(Axis::Rows),
            2 => Some(Axis::Cols),
            3 => Some(Axis::Chls),
            4 => Some(Axis::Nums),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Rows => "rows",
            Axis::Cols => "cols",
            Axis::Chls => "chls",
            Axis::Nums => "nums",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Four-axis shape of a buffer.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    rows: usize,
    cols: usize,
    chls: usize,
    nums: usize,
    size: usize,
    dims: usize,
}

impl Shape {
    /// Create a shape from its four extents.
    pub fn new(rows: usize, cols: usize, chls: usize, nums: usize) -> Self {
        let mut shape = Shape {
            rows,
            cols,
            chls,
            nums,
            size: 0,
            dims: 0,
        };
        shape.set_dims();
        shape
    }

    /// Create a shape whose element count is given explicitly instead of
    /// derived from the extents. Used for sparse buffers.
    pub fn with_size(rows: usize, cols: usize, chls: usize, nums: usize, size: usize) -> Self {
        let mut shape = Shape::new(rows, cols, chls, nums);
        shape.size = size;
        shape
    }

    /// The empty shape (all extents zero).
    pub fn empty() -> Self {
        Shape::new(0, 0, 0, 0)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn chls(&self) -> usize {
        self.chls
    }

    pub fn nums(&self) -> usize {
        self.nums
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of active axes (1..=4).
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// The four extents as `[rows, cols, chls, nums]`.
    pub fn extents(&self) -> [usize; 4] {
        [self.rows, self.cols, self.chls, self.nums]
    }

    fn set_dims(&mut self) {
        self.size = self.rows * self.cols * self.chls * self.nums;
        self.dims = if self.nums > 1 {
            4
        } else if self.chls > 1 {
            3
        } else if self.cols > 1 {
            2
        } else {
            1
        };
    }

    //  Axis projections
    //
    // The three tables below are indexed by axis code. They are kept exactly
    // as downstream kernels expect them; in particular `strd_x(2)` is `cols`
    // and `size_x(2)` is 1.

    /// Extent of the axis with the given code; 1 for unknown codes.
    pub fn dims_x(&self, code: u8) -> usize {
        match code {
            1 => self.rows,
            2 => self.cols,
            3 => self.chls,
            4 => self.nums,
            _ => 1,
        }
    }

    /// Element distance between consecutive indices of the axis; `size` for
    /// unknown codes.
    pub fn size_x(&self, code: u8) -> usize {
        match code {
            1 => self.cols,
            2 => 1,
            3 => self.cols * self.rows,
            4 => self.cols * self.rows * self.chls,
            _ => self.size,
        }
    }

    /// Span of one full run of the axis; `size` for unknown codes.
    pub fn strd_x(&self, code: u8) -> usize {
        match code {
            1 => self.cols * self.rows,
            2 => self.cols,
            3 => self.cols * self.rows * self.chls,
            4 => self.size,
            _ => self.size,
        }
    }

    /// Extent of a typed axis.
    pub fn extent(&self, axis: Axis) -> usize {
        self.dims_x(axis.code())
    }

    /// The axis slicing operates on: nums when dims = 4, chls when dims = 3,
    /// rows otherwise.
    pub fn outer_axis(&self) -> Axis {
        match self.dims {
            4 => Axis::Nums,
            3 => Axis::Chls,
            _ => Axis::Rows,
        }
    }

    /// Copy of this shape with one axis replaced.
    pub fn with_extent(&self, axis: Axis, extent: usize) -> Shape {
        let [mut r, mut c, mut ch, mut n] = self.extents();
        match axis {
            Axis::Rows => r = extent,
            Axis::Cols => c = extent,
            Axis::Chls => ch = extent,
            Axis::Nums => n = extent,
        }
        Shape::new(r, c, ch, n)
    }

    //  Re-interpretation

    /// Redistribute batch into channels: `chls * nums` is split as
    /// `(chls * nums / n) × n`.
    pub fn set_nums(&mut self, n: usize) -> Result<()> {
        let total = self.chls * self.nums;
        if n == 0 || total % n != 0 {
            return Err(Error::IndivisibleSplit {
                axis: "nums",
                total,
                target: n,
            });
        }
        self.chls = total / n;
        self.nums = n;
        self.set_dims();
        Ok(())
    }

    /// Redistribute channels into rows: `rows * chls` is split as
    /// `(rows * chls / c) × c`.
    pub fn set_chls(&mut self, c: usize) -> Result<()> {
        let total = self.rows * self.chls;
        if c == 0 || total % c != 0 {
            return Err(Error::IndivisibleSplit {
                axis: "chls",
                total,
                target: c,
            });
        }
        self.rows = total / c;
        self.chls = c;
        self.set_dims();
        Ok(())
    }

    /// Redistribute columns into rows: `rows * cols` is split as
    /// `(rows * cols / c) × c`.
    pub fn set_cols(&mut self, c: usize) -> Result<()> {
        let total = self.rows * self.cols;
        if c == 0 || total % c != 0 {
            return Err(Error::IndivisibleSplit {
                axis: "cols",
                total,
                target: c,
            });
        }
        self.rows = total / c;
        self.cols = c;
        self.set_dims();
        Ok(())
    }

    /// Replace all four extents, keeping the element count.
    pub fn re_shape(&mut self, rows: usize, cols: usize, chls: usize, nums: usize) -> Result<()> {
        let dst = rows * cols * chls * nums;
        if dst != self.size {
            return Err(Error::ReshapeElementMismatch {
                src: self.size,
                dst,
                dst_shape: Shape::new(rows, cols, chls, nums),
            });
        }
        self.rows = rows;
        self.cols = cols;
        self.chls = chls;
        self.nums = nums;
        self.set_dims();
        Ok(())
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::empty()
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.extents() == other.extents()
    }
}

impl Eq for Shape {}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.rows, self.cols, self.chls, self.nums
        )
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((r, c, ch, n): (usize, usize, usize, usize)) -> Self {
        Shape::new(r, c, ch, n)
    }
}

impl From<[usize; 4]> for Shape {
    fn from([r, c, ch, n]: [usize; 4]) -> Self {
        Shape::new(r, c, ch, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_shape() {
        let s = Shape::new(2, 3, 1, 1);
        assert_eq!(s.dims(), 2);
        assert_eq!(s.size(), 6);
    }

    #[test]
    fn test_batch_shape() {
        let s = Shape::new(2, 3, 4, 5);
        assert_eq!(s.dims(), 4);
        assert_eq!(s.size(), 120);
    }

    #[test]
    fn test_dims_precedence() {
        assert_eq!(Shape::new(5, 1, 1, 1).dims(), 1);
        assert_eq!(Shape::new(1, 1, 3, 1).dims(), 3);
        // nums wins even when every other axis is 1
        assert_eq!(Shape::new(1, 1, 1, 2).dims(), 4);
        assert_eq!(Shape::empty().dims(), 1);
        assert_eq!(Shape::empty().size(), 0);
    }

    #[test]
    fn test_size_override() {
        let s = Shape::with_size(4, 4, 1, 1, 7);
        assert_eq!(s.size(), 7);
        assert_eq!(s.dims(), 2);
        // equality ignores size
        assert_eq!(s, Shape::new(4, 4, 1, 1));
    }

    #[test]
    fn test_projection_tables() {
        let s = Shape::new(2, 3, 4, 5);
        assert_eq!(
            [s.dims_x(1), s.dims_x(2), s.dims_x(3), s.dims_x(4), s.dims_x(9)],
            [2, 3, 4, 5, 1]
        );
        assert_eq!(
            [s.size_x(1), s.size_x(2), s.size_x(3), s.size_x(4), s.size_x(0)],
            [3, 1, 6, 24, 120]
        );
        assert_eq!(
            [s.strd_x(1), s.strd_x(2), s.strd_x(3), s.strd_x(4), s.strd_x(7)],
            [6, 3, 24, 120, 120]
        );
    }

    #[test]
    fn test_outer_axis() {
        assert_eq!(Shape::new(4, 1, 1, 1).outer_axis(), Axis::Rows);
        assert_eq!(Shape::new(4, 3, 1, 1).outer_axis(), Axis::Rows);
        assert_eq!(Shape::new(4, 3, 2, 1).outer_axis(), Axis::Chls);
        assert_eq!(Shape::new(4, 3, 2, 6).outer_axis(), Axis::Nums);
    }

    #[test]
    fn test_set_nums() {
        let mut s = Shape::new(2, 2, 3, 4);
        s.set_nums(6).unwrap();
        assert_eq!(s.extents(), [2, 2, 2, 6]);
        assert_eq!(s.size(), 48);
        assert!(s.set_nums(5).is_err());
        assert_eq!(s.extents(), [2, 2, 2, 6]);
    }

    #[test]
    fn test_set_chls_and_cols() {
        let mut s = Shape::new(6, 4, 2, 1);
        s.set_chls(4).unwrap();
        assert_eq!(s.extents(), [3, 4, 4, 1]);
        s.set_cols(6).unwrap();
        assert_eq!(s.extents(), [2, 6, 4, 1]);
        assert!(matches!(
            s.set_cols(5),
            Err(Error::IndivisibleSplit { axis: "cols", .. })
        ));
    }

    #[test]
    fn test_re_shape() {
        let mut s = Shape::new(4, 6, 1, 1);
        assert!(s.re_shape(2, 3, 4, 1).is_ok());
        assert_eq!(s.size(), 24);
        assert_eq!(s.dims(), 3);
        assert!(s.re_shape(2, 3, 4, 2).is_err());
        assert_eq!(s.extents(), [2, 3, 4, 1]);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::new(2, 3, 4, 5)), "[2, 3, 4, 5]");
    }
}
