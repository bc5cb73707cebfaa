use crate::backend::{
    ArgOp, AxisSpan, BinaryOp, GemmArgs, GemvArgs, Kernels, ReduceOp, ScalarOp, UnaryOp,
};
use crate::dtype::WithDType;
use crate::error::{Error, Result};
use crate::shape::{Axis, Shape};
use crate::tensor::Tensor;

// ops — Numeric surface of Tensor on backends that provide Kernels
//
// Methods follow a destination-first convention: `dst.add(&a, &b)` writes
// `a + b` into `dst`. Every method checks element counts, resolves the raw
// pointers through the arena, and hands off to the backend kernel.
//
// KEPT-AXIS REDUCTIONS:
//
//   `reduce_keep(op, &src, axis)` writes one value per index of `axis`:
//
//     dst[j] = op { src[i] : (i / src.size_x(axis)) % src.dims_x(axis) == j }
//
//   so `dst.size()` must equal the extent of `axis` in `src`. The broadcast
//   methods apply the same index rule in the other direction.
//
// MATRIX VIEW:
//
//   gemm/gemv treat a tensor as a row-major matrix whose rows are the
//   outer slicing axis and whose cols are everything else. A fully
//   connected input (r, c, ch, nums) is therefore nums × (r·c·ch), and a
//   weight (flts, in, 1, 1) is flts × in.

fn span_of(shape: &Shape, axis: Axis) -> AxisSpan {
    AxisSpan {
        len: shape.size(),
        extent: shape.extent(axis),
        stride: shape.size_x(axis.code()),
    }
}

/// Span that maps every element to its position inside one batch item.
fn batch_span(shape: &Shape) -> AxisSpan {
    AxisSpan {
        len: shape.size(),
        extent: shape.size_x(Axis::Nums.code()),
        stride: 1,
    }
}

impl<B: Kernels, T: WithDType> Tensor<B, T> {
    fn same_size(&self, other: &Self) -> Result<()> {
        if self.size() != other.size() {
            return Err(Error::ElementCountMismatch {
                expected: self.size(),
                got: other.size(),
            });
        }
        Ok(())
    }

    fn kernel_device(&self) -> Result<&B::Device> {
        self.device().ok_or(Error::EmptyTensor)
    }

    /// Rows and cols of the matrix view used by gemm/gemv.
    pub fn matrix_dims(&self) -> (usize, usize) {
        let rows = self.outer_extent();
        if rows == 0 {
            return (0, 0);
        }
        (rows, self.size() / rows)
    }

    //  Element-wise

    fn unary(&mut self, op: UnaryOp, src: &Self) -> Result<()> {
        self.same_size(src)?;
        let (dst, src_ptr) = (self.ptr()?, src.ptr()?);
        unsafe { B::unary_op::<T>(self.kernel_device()?, op, dst, src_ptr, self.size()) }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Self, rhs: &Self) -> Result<()> {
        self.same_size(lhs)?;
        self.same_size(rhs)?;
        let (dst, l, r) = (self.ptr()?, lhs.ptr()?, rhs.ptr()?);
        unsafe { B::binary_op::<T>(self.kernel_device()?, op, dst, l, r, self.size()) }
    }

    fn scalar(&mut self, op: ScalarOp, value: f64) -> Result<()> {
        let dst = self.ptr()?;
        unsafe { B::scalar_op::<T>(self.kernel_device()?, op, dst, self.size(), value) }
    }

    pub fn add(&mut self, lhs: &Self, rhs: &Self) -> Result<()> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: &Self, rhs: &Self) -> Result<()> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: &Self, rhs: &Self) -> Result<()> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: &Self, rhs: &Self) -> Result<()> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn abs(&mut self, src: &Self) -> Result<()> {
        self.unary(UnaryOp::Abs, src)
    }

    pub fn exp(&mut self, src: &Self) -> Result<()> {
        self.unary(UnaryOp::Exp, src)
    }

    /// Element-wise reciprocal.
    pub fn inv(&mut self, src: &Self) -> Result<()> {
        self.unary(UnaryOp::Inv, src)
    }

    pub fn square(&mut self, src: &Self) -> Result<()> {
        self.unary(UnaryOp::Square, src)
    }

    pub fn sqrt(&mut self, src: &Self) -> Result<()> {
        self.unary(UnaryOp::Sqrt, src)
    }

    /// Clip every element to `[-bound, bound]`.
    pub fn project(&mut self, bound: f64) -> Result<()> {
        self.scalar(ScalarOp::Project, bound)
    }

    pub fn add_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar(ScalarOp::Add, value)
    }

    /// Set every element to `value` on the device.
    pub fn fill_value(&mut self, value: f64) -> Result<()> {
        self.scalar(ScalarOp::Fill, value)
    }

    //  Reductions

    fn reduce(&self, op: ReduceOp) -> Result<f64> {
        if self.size() == 0 {
            return Err(Error::EmptyTensor);
        }
        let src = self.ptr()?;
        unsafe { B::reduce_all::<T>(self.kernel_device()?, op, src, self.size()) }
    }

    pub fn reduce_sum(&self) -> Result<f64> {
        self.reduce(ReduceOp::Sum)
    }

    pub fn reduce_max(&self) -> Result<f64> {
        self.reduce(ReduceOp::Max)
    }

    pub fn reduce_min(&self) -> Result<f64> {
        self.reduce(ReduceOp::Min)
    }

    pub fn reduce_mean(&self) -> Result<f64> {
        self.reduce(ReduceOp::Mean)
    }

    fn reduce_span(&mut self, op: ReduceOp, src: &Self, span: AxisSpan) -> Result<()> {
        if self.size() != span.extent {
            return Err(Error::ElementCountMismatch {
                expected: span.extent,
                got: self.size(),
            });
        }
        if span.len == 0 {
            return Err(Error::EmptyTensor);
        }
        let (dst, src_ptr) = (self.ptr()?, src.ptr()?);
        unsafe { B::reduce_axis::<T>(self.kernel_device()?, op, dst, src_ptr, span) }
    }

    /// Reduce `src` down to one value per index of `axis`.
    pub fn reduce_keep(&mut self, op: ReduceOp, src: &Self, axis: Axis) -> Result<()> {
        self.reduce_span(op, src, span_of(src.shape(), axis))
    }

    fn broadcast_span(&mut self, op: BinaryOp, small: &Self, span: AxisSpan) -> Result<()> {
        if small.size() != span.extent {
            return Err(Error::ElementCountMismatch {
                expected: span.extent,
                got: small.size(),
            });
        }
        if span.len == 0 {
            return Ok(());
        }
        let (dst, s) = (self.ptr()?, small.ptr()?);
        unsafe { B::broadcast_op::<T>(self.kernel_device()?, op, dst, s, span) }
    }

    /// `self[i] = self[i] op small[index of i along axis]`.
    pub fn broadcast(&mut self, op: BinaryOp, small: &Self, axis: Axis) -> Result<()> {
        let span = span_of(self.shape(), axis);
        self.broadcast_span(op, small, span)
    }

    /// Mean over the batch axis: one value per (row, col, chl) position.
    pub fn batch_mean(&mut self, src: &Self) -> Result<()> {
        self.reduce_span(ReduceOp::Mean, src, batch_span(src.shape()))
    }

    /// Subtract a per-position mean from every batch item.
    pub fn sub_batch_mean(&mut self, mean: &Self) -> Result<()> {
        let span = batch_span(self.shape());
        self.broadcast_span(BinaryOp::Sub, mean, span)
    }

    /// Global in-place softmax: one max and one sum over the whole buffer.
    pub fn softmax(&mut self) -> Result<()> {
        let max = self.reduce_max()?;
        self.add_scalar(-max)?;
        let dst = self.ptr()?;
        unsafe { B::unary_op::<T>(self.kernel_device()?, UnaryOp::Exp, dst, dst, self.size())? };
        let sum = self.reduce_sum()?;
        self.scal(1.0 / sum)
    }

    //  BLAS level 1

    pub fn dot(&self, other: &Self) -> Result<f64> {
        self.same_size(other)?;
        let (a, b) = (self.ptr()?, other.ptr()?);
        unsafe { B::dot::<T>(self.kernel_device()?, a, b, self.size()) }
    }

    /// Euclidean norm.
    pub fn nrm2(&self) -> Result<f64> {
        Ok(self.reduce(ReduceOp::SumSq)?.sqrt())
    }

    /// Sum of absolute values.
    pub fn asum(&self) -> Result<f64> {
        self.reduce(ReduceOp::AbsSum)
    }

    pub fn scal(&mut self, alpha: f64) -> Result<()> {
        self.scalar(ScalarOp::Scale, alpha)
    }

    /// `self += alpha * x`.
    pub fn axpy(&mut self, x: &Self, alpha: f64) -> Result<()> {
        self.same_size(x)?;
        let (y, xp) = (self.ptr()?, x.ptr()?);
        unsafe { B::axpy::<T>(self.kernel_device()?, y, xp, self.size(), alpha) }
    }

    fn arg(&self, op: ArgOp) -> Result<(usize, f64)> {
        if self.size() == 0 {
            return Err(Error::EmptyTensor);
        }
        let src = self.ptr()?;
        unsafe { B::arg_reduce::<T>(self.kernel_device()?, op, src, self.size()) }
    }

    /// Index and value of the element with the largest magnitude.
    pub fn amax(&self) -> Result<(usize, f64)> {
        self.arg(ArgOp::AbsMax)
    }

    /// Index and value of the element with the smallest magnitude.
    pub fn amin(&self) -> Result<(usize, f64)> {
        self.arg(ArgOp::AbsMin)
    }

    //  BLAS level 2/3

    /// `self = alpha * op(a) * op(b) + beta * self`.
    pub fn gemm(
        &mut self,
        a: &Self,
        b: &Self,
        trans_a: bool,
        trans_b: bool,
        alpha: f64,
        beta: f64,
    ) -> Result<()> {
        let (ar, ac) = a.matrix_dims();
        let (br, bc) = b.matrix_dims();
        let (m, k) = if trans_a { (ac, ar) } else { (ar, ac) };
        let (kb, n) = if trans_b { (bc, br) } else { (br, bc) };
        if k != kb {
            crate::bail!("gemm inner dimensions differ: {} vs {}", k, kb);
        }
        if self.size() != m * n {
            return Err(Error::ElementCountMismatch {
                expected: m * n,
                got: self.size(),
            });
        }
        let args = GemmArgs {
            trans_a,
            trans_b,
            m,
            n,
            k,
            alpha,
            beta,
        };
        let (c, ap, bp) = (self.ptr()?, a.ptr()?, b.ptr()?);
        unsafe { B::gemm::<T>(self.kernel_device()?, args, c, ap, bp) }
    }

    /// `self = alpha * op(a) * x + beta * self`.
    pub fn gemv(&mut self, a: &Self, x: &Self, trans_a: bool, alpha: f64, beta: f64) -> Result<()> {
        let (rows, cols) = a.matrix_dims();
        let (out, inner) = if trans_a { (cols, rows) } else { (rows, cols) };
        if x.size() != inner {
            return Err(Error::ElementCountMismatch {
                expected: inner,
                got: x.size(),
            });
        }
        if self.size() != out {
            return Err(Error::ElementCountMismatch {
                expected: out,
                got: self.size(),
            });
        }
        let args = GemvArgs {
            trans_a,
            rows,
            cols,
            alpha,
            beta,
        };
        let (y, ap, xp) = (self.ptr()?, a.ptr()?, x.ptr()?);
        unsafe { B::gemv::<T>(self.kernel_device()?, args, y, ap, xp) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_of_axes() {
        let s = Shape::new(2, 3, 4, 5);
        let chls = span_of(&s, Axis::Chls);
        assert_eq!((chls.len, chls.extent, chls.stride), (120, 4, 6));
        let cols = span_of(&s, Axis::Cols);
        assert_eq!((cols.extent, cols.stride), (3, 1));
        assert_eq!(cols.index_of(4), 1);
    }

    #[test]
    fn test_batch_span() {
        let s = Shape::new(2, 2, 3, 4);
        let span = batch_span(&s);
        assert_eq!(span.extent, 12);
        // element 13 is position 1 of batch item 1
        assert_eq!(span.index_of(13), 1);
    }
}
