// Host kernels — reference implementations of the numeric surface
//
// Every kernel first reads its inputs into owned f64 vectors, then computes,
// then writes the destination. Reading before writing makes in-place calls
// (`dst == src`) and overlapping views behave like the out-of-place form.
// Element-wise work and per-row matrix work run on the rayon pool.

use rayon::prelude::*;

use kestrel_core::backend::{
    ArgOp, AxisSpan, BinaryOp, GemmArgs, GemvArgs, Kernels, ReduceOp, ScalarOp, UnaryOp,
};
use kestrel_core::dtype::WithDType;
use kestrel_core::error::Result;

use crate::{CpuBackend, CpuDevice, HostPtr};

unsafe fn read<T: WithDType>(ptr: HostPtr, len: usize) -> Vec<f64> {
    let src = std::slice::from_raw_parts(ptr.as_ptr() as *const T, len);
    src.par_iter().map(|&v| WithDType::to_f64(v)).collect()
}

unsafe fn read_index(ptr: HostPtr, len: usize) -> Vec<usize> {
    std::slice::from_raw_parts(ptr.as_ptr() as *const u32, len)
        .iter()
        .map(|&i| i as usize)
        .collect()
}

unsafe fn write<T: WithDType>(ptr: HostPtr, values: &[f64]) {
    let dst = std::slice::from_raw_parts_mut(ptr.as_ptr() as *mut T, values.len());
    dst.par_iter_mut()
        .zip(values.par_iter())
        .for_each(|(d, &v)| *d = T::from_f64(v));
}

fn unary(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Abs => x.abs(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Inv => 1.0 / x,
        UnaryOp::Square => x * x,
        UnaryOp::Sqrt => x.sqrt(),
    }
}

fn binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
    }
}

fn reduce(op: ReduceOp, values: &[f64]) -> f64 {
    let n = values.len() as f64;
    match op {
        ReduceOp::Sum => values.par_iter().sum(),
        ReduceOp::Max => values.par_iter().cloned().reduce(|| f64::NEG_INFINITY, f64::max),
        ReduceOp::Min => values.par_iter().cloned().reduce(|| f64::INFINITY, f64::min),
        ReduceOp::Mean => values.par_iter().sum::<f64>() / n,
        ReduceOp::Var => {
            let mean = values.par_iter().sum::<f64>() / n;
            values.par_iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
        }
        ReduceOp::AbsSum => values.par_iter().map(|v| v.abs()).sum(),
        ReduceOp::SumSq => values.par_iter().map(|v| v * v).sum(),
    }
}

fn blend(acc: f64, alpha: f64, beta: f64, prev: f64) -> f64 {
    // beta == 0 must ignore whatever garbage the destination holds
    if beta == 0.0 {
        alpha * acc
    } else {
        alpha * acc + beta * prev
    }
}

impl Kernels for CpuBackend {
    unsafe fn unary_op<T: WithDType>(
        _device: &CpuDevice,
        op: UnaryOp,
        dst: HostPtr,
        src: HostPtr,
        len: usize,
    ) -> Result<()> {
        let mut v = read::<T>(src, len);
        v.par_iter_mut().for_each(|x| *x = unary(op, *x));
        write::<T>(dst, &v);
        Ok(())
    }

    unsafe fn binary_op<T: WithDType>(
        _device: &CpuDevice,
        op: BinaryOp,
        dst: HostPtr,
        lhs: HostPtr,
        rhs: HostPtr,
        len: usize,
    ) -> Result<()> {
        let a = read::<T>(lhs, len);
        let b = read::<T>(rhs, len);
        let out: Vec<f64> = a
            .par_iter()
            .zip(b.par_iter())
            .map(|(&x, &y)| binary(op, x, y))
            .collect();
        write::<T>(dst, &out);
        Ok(())
    }

    unsafe fn scalar_op<T: WithDType>(
        _device: &CpuDevice,
        op: ScalarOp,
        dst: HostPtr,
        len: usize,
        value: f64,
    ) -> Result<()> {
        let mut v = read::<T>(dst, len);
        v.par_iter_mut().for_each(|x| {
            *x = match op {
                ScalarOp::Add => *x + value,
                ScalarOp::Scale => *x * value,
                ScalarOp::Fill => value,
                ScalarOp::Project => x.max(-value).min(value),
            }
        });
        write::<T>(dst, &v);
        Ok(())
    }

    unsafe fn reduce_all<T: WithDType>(
        _device: &CpuDevice,
        op: ReduceOp,
        src: HostPtr,
        len: usize,
    ) -> Result<f64> {
        Ok(reduce(op, &read::<T>(src, len)))
    }

    unsafe fn reduce_axis<T: WithDType>(
        _device: &CpuDevice,
        op: ReduceOp,
        dst: HostPtr,
        src: HostPtr,
        span: AxisSpan,
    ) -> Result<()> {
        if span.extent == 0 {
            return Ok(());
        }
        let values = read::<T>(src, span.len);
        let mut groups = vec![Vec::with_capacity(span.len / span.extent); span.extent];
        for (i, &v) in values.iter().enumerate() {
            groups[span.index_of(i)].push(v);
        }
        let out: Vec<f64> = groups.par_iter().map(|g| reduce(op, g)).collect();
        write::<T>(dst, &out);
        Ok(())
    }

    unsafe fn broadcast_op<T: WithDType>(
        _device: &CpuDevice,
        op: BinaryOp,
        dst: HostPtr,
        small: HostPtr,
        span: AxisSpan,
    ) -> Result<()> {
        let s = read::<T>(small, span.extent);
        let mut v = read::<T>(dst, span.len);
        v.par_iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = binary(op, *x, s[span.index_of(i)]));
        write::<T>(dst, &v);
        Ok(())
    }

    unsafe fn arg_reduce<T: WithDType>(
        _device: &CpuDevice,
        op: ArgOp,
        src: HostPtr,
        len: usize,
    ) -> Result<(usize, f64)> {
        let v = read::<T>(src, len);
        let mut best = 0;
        for (i, x) in v.iter().enumerate().skip(1) {
            let better = match op {
                ArgOp::AbsMax => x.abs() > v[best].abs(),
                ArgOp::AbsMin => x.abs() < v[best].abs(),
            };
            if better {
                best = i;
            }
        }
        Ok((best, v.get(best).copied().unwrap_or(0.0)))
    }

    unsafe fn dot<T: WithDType>(
        _device: &CpuDevice,
        lhs: HostPtr,
        rhs: HostPtr,
        len: usize,
    ) -> Result<f64> {
        let a = read::<T>(lhs, len);
        let b = read::<T>(rhs, len);
        Ok(a.par_iter().zip(b.par_iter()).map(|(x, y)| x * y).sum())
    }

    unsafe fn axpy<T: WithDType>(
        _device: &CpuDevice,
        y: HostPtr,
        x: HostPtr,
        len: usize,
        alpha: f64,
    ) -> Result<()> {
        let xs = read::<T>(x, len);
        let mut ys = read::<T>(y, len);
        ys.par_iter_mut()
            .zip(xs.par_iter())
            .for_each(|(yi, xi)| *yi += alpha * xi);
        write::<T>(y, &ys);
        Ok(())
    }

    unsafe fn gemm<T: WithDType>(
        _device: &CpuDevice,
        args: GemmArgs,
        c: HostPtr,
        a: HostPtr,
        b: HostPtr,
    ) -> Result<()> {
        let GemmArgs {
            trans_a,
            trans_b,
            m,
            n,
            k,
            alpha,
            beta,
        } = args;
        let av = read::<T>(a, m * k);
        let bv = read::<T>(b, k * n);
        let mut cv = read::<T>(c, m * n);
        let a_at = |i: usize, p: usize| if trans_a { av[p * m + i] } else { av[i * k + p] };
        let b_at = |p: usize, j: usize| if trans_b { bv[j * k + p] } else { bv[p * n + j] };
        cv.par_chunks_mut(n.max(1)).enumerate().for_each(|(i, row)| {
            for (j, out) in row.iter_mut().enumerate() {
                let acc: f64 = (0..k).map(|p| a_at(i, p) * b_at(p, j)).sum();
                *out = blend(acc, alpha, beta, *out);
            }
        });
        write::<T>(c, &cv);
        Ok(())
    }

    unsafe fn gemv<T: WithDType>(
        _device: &CpuDevice,
        args: GemvArgs,
        y: HostPtr,
        a: HostPtr,
        x: HostPtr,
    ) -> Result<()> {
        let GemvArgs {
            trans_a,
            rows,
            cols,
            alpha,
            beta,
        } = args;
        let av = read::<T>(a, rows * cols);
        let (out_len, in_len) = if trans_a { (cols, rows) } else { (rows, cols) };
        let xv = read::<T>(x, in_len);
        let mut yv = read::<T>(y, out_len);
        yv.par_iter_mut().enumerate().for_each(|(o, out)| {
            let acc: f64 = if trans_a {
                (0..rows).map(|i| av[i * cols + o] * xv[i]).sum()
            } else {
                (0..cols).map(|j| av[o * cols + j] * xv[j]).sum()
            };
            *out = blend(acc, alpha, beta, *out);
        });
        write::<T>(y, &yv);
        Ok(())
    }

    unsafe fn csr_gemv<T: WithDType>(
        _device: &CpuDevice,
        args: GemvArgs,
        y: HostPtr,
        values: HostPtr,
        row_ptr: HostPtr,
        col_idx: HostPtr,
        x: HostPtr,
    ) -> Result<()> {
        let GemvArgs {
            trans_a,
            rows,
            cols,
            alpha,
            beta,
        } = args;
        let offsets = read_index(row_ptr, rows + 1);
        let nnz = offsets[rows];
        let cols_of = read_index(col_idx, nnz);
        let vals = read::<T>(values, nnz);
        let (out_len, in_len) = if trans_a { (cols, rows) } else { (rows, cols) };
        let xv = read::<T>(x, in_len);
        let mut yv = read::<T>(y, out_len);
        if trans_a {
            let mut acc = vec![0.0; cols];
            for r in 0..rows {
                for p in offsets[r]..offsets[r + 1] {
                    acc[cols_of[p]] += vals[p] * xv[r];
                }
            }
            for (out, a) in yv.iter_mut().zip(acc) {
                *out = blend(a, alpha, beta, *out);
            }
        } else {
            yv.par_iter_mut().enumerate().for_each(|(r, out)| {
                let acc: f64 = (offsets[r]..offsets[r + 1])
                    .map(|p| vals[p] * xv[cols_of[p]])
                    .sum();
                *out = blend(acc, alpha, beta, *out);
            });
        }
        write::<T>(y, &yv);
        Ok(())
    }

    unsafe fn csr_axpy<T: WithDType>(
        _device: &CpuDevice,
        rows: usize,
        cols: usize,
        y: HostPtr,
        values: HostPtr,
        row_ptr: HostPtr,
        col_idx: HostPtr,
        alpha: f64,
    ) -> Result<()> {
        let offsets = read_index(row_ptr, rows + 1);
        let nnz = offsets[rows];
        let cols_of = read_index(col_idx, nnz);
        let vals = read::<T>(values, nnz);
        let mut yv = read::<T>(y, rows * cols);
        for r in 0..rows {
            for p in offsets[r]..offsets[r + 1] {
                yv[r * cols + cols_of[p]] += alpha * vals[p];
            }
        }
        write::<T>(y, &yv);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_ops() {
        let v = [1.0, -2.0, 3.0, 6.0];
        assert_eq!(reduce(ReduceOp::Sum, &v), 8.0);
        assert_eq!(reduce(ReduceOp::Max, &v), 6.0);
        assert_eq!(reduce(ReduceOp::Min, &v), -2.0);
        assert_eq!(reduce(ReduceOp::Mean, &v), 2.0);
        assert_eq!(reduce(ReduceOp::AbsSum, &v), 12.0);
        assert_eq!(reduce(ReduceOp::SumSq, &v), 50.0);
        // mean 2: (1 + 16 + 1 + 16) / 4
        assert_eq!(reduce(ReduceOp::Var, &v), 8.5);
    }

    fn host_ptr<T>(buf: &mut [T]) -> HostPtr {
        HostPtr(std::ptr::NonNull::from(buf).cast())
    }

    #[test]
    fn test_read_widens_and_write_narrows() {
        let mut buf = [1.5f32, -2.0, 0.25];
        let ptr = host_ptr(&mut buf);
        let values = unsafe { read::<f32>(ptr, 3) };
        assert_eq!(values, vec![1.5, -2.0, 0.25]);

        unsafe { write::<f32>(ptr, &[3.0, 4.5, -1.0]) };
        assert_eq!(buf, [3.0, 4.5, -1.0]);

        let mut wide = [0.1f64, 7.0];
        let values = unsafe { read::<f64>(host_ptr(&mut wide), 2) };
        assert_eq!(values, vec![0.1, 7.0]);
    }

    #[test]
    fn test_blend_ignores_destination_when_beta_zero() {
        assert_eq!(blend(2.0, 3.0, 0.0, f64::NAN), 6.0);
        assert_eq!(blend(2.0, 1.0, 0.5, 4.0), 4.0);
    }
}
