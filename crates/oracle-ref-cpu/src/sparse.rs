//! CSR sparse kernels.
//!
//! The sparse operand is the usual `(indptr, indices, data)` triple over a
//! 2-D `rows x cols` core described by the `dense_shape` attribute. The
//! values tensor may carry trailing batch axes (one value vector per
//! channel, all channels sharing the sparsity pattern); `dense_shape` then
//! reads `[rows, cols, batch...]` and each channel is processed
//! independently.

use oracle_core::{DType, EvalError, EvalResult};

use crate::tensor::HostTensor;

/// Validated sparsity pattern with per-element row ownership resolved.
struct CsrPattern {
    rows: usize,
    cols: usize,
    row_of: Vec<usize>,
    col_of: Vec<usize>,
}

impl CsrPattern {
    fn build(indptr: &HostTensor, indices: &HostTensor, rows: usize, cols: usize) -> EvalResult<Self> {
        let indptr = indptr.index_values()?;
        let indices = indices.index_values()?;
        if indptr.len() != rows + 1 {
            return Err(EvalError::execution(format!(
                "indptr has {} entries for {rows} rows",
                indptr.len()
            )));
        }
        let nnz = indices.len();
        if indptr[rows] as usize != nnz {
            return Err(EvalError::execution(format!(
                "indptr terminates at {} but {nnz} column indices are stored",
                indptr[rows]
            )));
        }
        let mut row_of = vec![0usize; nnz];
        for r in 0..rows {
            let (lo, hi) = (indptr[r], indptr[r + 1]);
            if lo < 0 || hi < lo || hi as usize > nnz {
                return Err(EvalError::execution(format!(
                    "indptr entries {lo}..{hi} for row {r} are out of order"
                )));
            }
            for slot in row_of.iter_mut().take(hi as usize).skip(lo as usize) {
                *slot = r;
            }
        }
        let mut col_of = Vec::with_capacity(nnz);
        for &c in &indices {
            if c < 0 || c >= cols as i64 {
                return Err(EvalError::execution(format!(
                    "column index {c} out of range for {cols} columns"
                )));
            }
            col_of.push(c as usize);
        }
        Ok(Self {
            rows,
            cols,
            row_of,
            col_of,
        })
    }

    fn nnz(&self) -> usize {
        self.row_of.len()
    }
}

fn shape_dims(dense_shape: &[i64]) -> EvalResult<Vec<usize>> {
    if dense_shape.len() < 2 {
        return Err(EvalError::execution(
            "dense_shape must carry at least rows and cols",
        ));
    }
    dense_shape
        .iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| EvalError::execution(format!("negative extent {d} in dense_shape")))
        })
        .collect()
}

/// Whether the product should accumulate in `f32` (half/single values) or
/// `f64` (everything else).
fn accumulate_single(dtype: DType) -> bool {
    matches!(dtype, DType::F16 | DType::F32)
}

/// Sparse x dense-vector product; weight is `(cols, 1)`, output `(rows, 1)`.
pub fn eval_csrmv(
    indptr: &HostTensor,
    indices: &HostTensor,
    data: &HostTensor,
    weight: &HostTensor,
    dense_shape: &[i64],
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = shape_dims(dense_shape)?;
    let pattern = CsrPattern::build(indptr, indices, shape[0], shape[1])?;
    if weight.len() != pattern.cols {
        return Err(EvalError::execution(format!(
            "weight vector has {} entries for {} columns",
            weight.len(),
            pattern.cols
        )));
    }
    spmm(&pattern, data, weight, 1, out_dtype)
}

/// Sparse x dense-matrix product; weight is `(cols, k)`, output `(rows, k)`.
pub fn eval_csrmm(
    indptr: &HostTensor,
    indices: &HostTensor,
    data: &HostTensor,
    weight: &HostTensor,
    dense_shape: &[i64],
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = shape_dims(dense_shape)?;
    let pattern = CsrPattern::build(indptr, indices, shape[0], shape[1])?;
    if weight.rank() != 2 || weight.dims()[0] != pattern.cols {
        return Err(EvalError::execution(format!(
            "weight shape {:?} does not match {} columns",
            weight.dims(),
            pattern.cols
        )));
    }
    spmm(&pattern, data, weight, weight.dims()[1], out_dtype)
}

fn spmm(
    pattern: &CsrPattern,
    data: &HostTensor,
    weight: &HostTensor,
    k: usize,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    if data.len() != pattern.nnz() {
        return Err(EvalError::execution(format!(
            "{} stored values for {} pattern entries",
            data.len(),
            pattern.nnz()
        )));
    }
    let out_dims = vec![pattern.rows, k];
    if accumulate_single(data.dtype()) {
        let values = data.f32_values()?;
        let dense = weight.cast(DType::F32);
        let w = dense.as_f32_slice()?;
        let mut out = vec![0f32; pattern.rows * k];
        for e in 0..pattern.nnz() {
            let (r, c) = (pattern.row_of[e], pattern.col_of[e]);
            for j in 0..k {
                out[r * k + j] += values[e] * w[c * k + j];
            }
        }
        return Ok(HostTensor::from_f32(out_dims, out)?.cast(out_dtype));
    }
    let values = data.f64_values();
    let w = weight.f64_values();
    let mut out = vec![0f64; pattern.rows * k];
    for e in 0..pattern.nnz() {
        let (r, c) = (pattern.row_of[e], pattern.col_of[e]);
        for j in 0..k {
            out[r * k + j] += values[e] * w[c * k + j];
        }
    }
    Ok(HostTensor::from_f64(out_dims, out)?.cast(out_dtype))
}

/// Per-channel sum over rows (axis 1) or columns (axis 0); the axis is
/// taken modulo the dense rank, matching the reference behavior.
pub fn eval_csr_reduce_sum(
    indptr: &HostTensor,
    indices: &HostTensor,
    data: &HostTensor,
    dense_shape: &[i64],
    axis: i64,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = shape_dims(dense_shape)?;
    let pattern = CsrPattern::build(indptr, indices, shape[0], shape[1])?;
    let batch = &shape[2..];
    let channels: usize = batch.iter().product::<usize>().max(1);
    check_channelled_data(data, pattern.nnz(), channels)?;
    let axis = axis.rem_euclid(shape.len() as i64) as usize;
    if axis > 1 {
        return Err(EvalError::execution(format!(
            "csr reduce-sum axis {axis} must address the sparse core"
        )));
    }
    let values = data.f64_values();
    let lead = if axis == 1 { pattern.rows } else { pattern.cols };
    let mut out = vec![0f64; lead * channels];
    for e in 0..pattern.nnz() {
        let slot = if axis == 1 {
            pattern.row_of[e]
        } else {
            pattern.col_of[e]
        };
        for c in 0..channels {
            out[slot * channels + c] += values[e * channels + c];
        }
    }
    let mut out_dims = if axis == 1 {
        vec![pattern.rows, 1]
    } else {
        vec![1, pattern.cols]
    };
    out_dims.extend_from_slice(batch);
    Ok(HostTensor::from_f64(out_dims, out)?.cast(out_dtype))
}

/// Elementwise multiply/divide against a dense operand, evaluated only at
/// stored coordinates. Output has the sparse values tensor's shape.
pub fn eval_csr_elementwise(
    indptr: &HostTensor,
    indices: &HostTensor,
    data: &HostTensor,
    dense: &HostTensor,
    dense_shape: &[i64],
    divide: bool,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = shape_dims(dense_shape)?;
    let pattern = CsrPattern::build(indptr, indices, shape[0], shape[1])?;
    let batch = &shape[2..];
    let channels: usize = batch.iter().product::<usize>().max(1);
    check_channelled_data(data, pattern.nnz(), channels)?;
    let full = dense.broadcast_to(&shape)?;
    let dense_values = full.f64_values();
    let values = data.f64_values();
    let mut out = vec![0f64; values.len()];
    for e in 0..pattern.nnz() {
        let (r, c) = (pattern.row_of[e], pattern.col_of[e]);
        for ch in 0..channels {
            let d = dense_values[(r * pattern.cols + c) * channels + ch];
            let x = values[e * channels + ch];
            out[e * channels + ch] = if divide { x / d } else { x * d };
        }
    }
    Ok(HostTensor::from_f64(data.dims().to_vec(), out)?.cast(out_dtype))
}

/// Materializes the dense operand's values at the sparsity pattern's
/// coordinates, `[nnz, batch...]`.
pub fn eval_csr_gather(
    indptr: &HostTensor,
    indices: &HostTensor,
    dense: &HostTensor,
    dense_shape: &[i64],
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = shape_dims(dense_shape)?;
    let pattern = CsrPattern::build(indptr, indices, shape[0], shape[1])?;
    let batch = &shape[2..];
    let channels: usize = batch.iter().product::<usize>().max(1);
    let full = dense.broadcast_to(&shape)?;
    let dense_values = full.f64_values();
    let mut out = Vec::with_capacity(pattern.nnz() * channels);
    for e in 0..pattern.nnz() {
        let (r, c) = (pattern.row_of[e], pattern.col_of[e]);
        for ch in 0..channels {
            out.push(dense_values[(r * pattern.cols + c) * channels + ch]);
        }
    }
    let mut out_dims = vec![pattern.nnz()];
    out_dims.extend_from_slice(batch);
    Ok(HostTensor::from_f64(out_dims, out)?.cast(out_dtype))
}

fn check_channelled_data(data: &HostTensor, nnz: usize, channels: usize) -> EvalResult<()> {
    if data.len() != nnz * channels {
        return Err(EvalError::execution(format!(
            "sparse values tensor {:?} does not match {nnz} entries x {channels} channels",
            data.dims()
        )));
    }
    Ok(())
}
