use crate::backend::{GemvArgs, Kernels};
use crate::dtype::WithDType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

// CsrTensor — Compressed sparse row matrix built from three tensors
//
//   values   nnz elements of T; shape (rows, cols, 1, 1) with size nnz
//   row_ptr  rows + 1 offsets into values
//   col_idx  nnz column indices
//
// The values tensor carries the dense extents but an explicit element count,
// which is exactly what `Shape::with_size` exists for.

/// A rows × cols sparse matrix in CSR form.
pub struct CsrTensor<B: Kernels, T: WithDType = f32> {
    values: Tensor<B, T>,
    row_ptr: Tensor<B, u32>,
    col_idx: Tensor<B, u32>,
    rows: usize,
    cols: usize,
}

fn check_csr(rows: usize, cols: usize, row_ptr: &[u32], col_idx: &[u32]) -> Result<()> {
    if row_ptr.len() != rows + 1 {
        return Err(Error::ElementCountMismatch {
            expected: rows + 1,
            got: row_ptr.len(),
        });
    }
    if row_ptr[0] != 0 || row_ptr.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::msg("CSR row offsets must start at 0 and never decrease"));
    }
    if row_ptr[rows] as usize != col_idx.len() {
        return Err(Error::ElementCountMismatch {
            expected: row_ptr[rows] as usize,
            got: col_idx.len(),
        });
    }
    if let Some(&c) = col_idx.iter().find(|&&c| c as usize >= cols) {
        return Err(Error::msg(format!(
            "CSR column index {c} out of range for {cols} columns"
        )));
    }
    Ok(())
}

impl<B: Kernels, T: WithDType> CsrTensor<B, T> {
    /// Upload a CSR matrix given as host arrays.
    pub fn from_parts(
        rows: usize,
        cols: usize,
        values: &[T],
        row_ptr: &[u32],
        col_idx: &[u32],
        device: &B::Device,
    ) -> Result<Self> {
        check_csr(rows, cols, row_ptr, col_idx)?;
        if values.len() != col_idx.len() {
            return Err(Error::ElementCountMismatch {
                expected: col_idx.len(),
                got: values.len(),
            });
        }
        let nnz = values.len();
        Ok(CsrTensor {
            values: Tensor::from_slice(values, Shape::with_size(rows, cols, 1, 1, nnz), device)?,
            row_ptr: Tensor::from_slice(row_ptr, Shape::new(rows + 1, 1, 1, 1), device)?,
            col_idx: Tensor::from_slice(col_idx, Shape::with_size(nnz, 1, 1, 1, nnz), device)?,
            rows,
            cols,
        })
    }

    /// Compress a dense row-major host matrix, dropping exact zeros.
    pub fn from_dense(dense: &[T], rows: usize, cols: usize, device: &B::Device) -> Result<Self> {
        if dense.len() != rows * cols {
            return Err(Error::ElementCountMismatch {
                expected: rows * cols,
                got: dense.len(),
            });
        }
        let mut values = Vec::new();
        let mut col_idx = Vec::new();
        let mut row_ptr = Vec::with_capacity(rows + 1);
        row_ptr.push(0u32);
        for row in dense.chunks(cols.max(1)).take(rows) {
            for (c, &v) in row.iter().enumerate() {
                if WithDType::to_f64(v) != 0.0 {
                    values.push(v);
                    col_idx.push(c as u32);
                }
            }
            row_ptr.push(values.len() as u32);
        }
        Self::from_parts(rows, cols, &values, &row_ptr, &col_idx, device)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.size()
    }

    pub fn values(&self) -> &Tensor<B, T> {
        &self.values
    }
}

impl<B: Kernels, T: WithDType> Tensor<B, T> {
    /// `self = alpha * op(s) * x + beta * self` for a CSR matrix `s`.
    pub fn sparse_gemv(
        &mut self,
        s: &CsrTensor<B, T>,
        x: &Self,
        trans: bool,
        alpha: f64,
        beta: f64,
    ) -> Result<()> {
        let (out, inner) = if trans {
            (s.cols, s.rows)
        } else {
            (s.rows, s.cols)
        };
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
            trans_a: trans,
            rows: s.rows,
            cols: s.cols,
            alpha,
            beta,
        };
        let device = self.device().ok_or(Error::EmptyTensor)?;
        unsafe {
            B::csr_gemv::<T>(
                device,
                args,
                self.ptr()?,
                s.values.ptr()?,
                s.row_ptr.ptr()?,
                s.col_idx.ptr()?,
                x.ptr()?,
            )
        }
    }

    /// `self += alpha * s`, with `self` viewed as a dense rows × cols matrix.
    pub fn sparse_axpy(&mut self, s: &CsrTensor<B, T>, alpha: f64) -> Result<()> {
        if self.size() != s.rows * s.cols {
            return Err(Error::ElementCountMismatch {
                expected: s.rows * s.cols,
                got: self.size(),
            });
        }
        if s.nnz() == 0 {
            return Ok(());
        }
        let device = self.device().ok_or(Error::EmptyTensor)?;
        unsafe {
            B::csr_axpy::<T>(
                device,
                s.rows,
                s.cols,
                self.ptr()?,
                s.values.ptr()?,
                s.row_ptr.ptr()?,
                s.col_idx.ptr()?,
                alpha,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_csr() {
        // [[1, 0], [0, 2]]
        assert!(check_csr(2, 2, &[0, 1, 2], &[0, 1]).is_ok());
        assert!(check_csr(2, 2, &[0, 1], &[0, 1]).is_err());
        assert!(check_csr(2, 2, &[0, 2, 1], &[0, 1]).is_err());
        assert!(check_csr(2, 2, &[0, 1, 2], &[0, 2]).is_err());
        assert!(check_csr(0, 3, &[0], &[]).is_ok());
    }
}
