//! Reduction and scan kernels.
//!
//! Half-precision inputs accumulate in `f32` and round back once at the
//! end; integral inputs accumulate in `i64`. The reduced result is reshaped
//! by the caller to the declared output shape, so `keep_dims` only affects
//! the shape this module reports.

use oracle_core::{DType, EvalError, EvalResult};

use crate::tensor::{compute_strides, unravel_index, HostTensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    Sum,
    Max,
    Min,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Sum,
    Prod,
}

/// Normalizes a possibly-negative axis against `rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> EvalResult<usize> {
    let rank = rank as i64;
    let adjusted = if axis < 0 { axis + rank } else { axis };
    if adjusted < 0 || adjusted >= rank {
        return Err(EvalError::execution(format!(
            "axis {axis} out of range for rank {rank}"
        )));
    }
    Ok(adjusted as usize)
}

/// Reduces over `axes` (all axes when absent). The output keeps reduced
/// axes as size 1 when `keep_dims` is set, otherwise drops them.
pub fn eval_reduce(
    kind: ReduceKind,
    input: &HostTensor,
    axes: Option<&[i64]>,
    keep_dims: bool,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let rank = input.rank();
    let mut reduced = vec![false; rank.max(1)];
    match axes {
        Some(list) => {
            for &axis in list {
                reduced[normalize_axis(axis, rank)?] = true;
            }
        }
        None => reduced.iter_mut().for_each(|r| *r = true),
    }

    let out_dims: Vec<usize> = input
        .dims()
        .iter()
        .enumerate()
        .filter_map(|(axis, &d)| {
            if !reduced[axis] {
                Some(d)
            } else if keep_dims {
                Some(1)
            } else {
                None
            }
        })
        .collect();
    // Strides into the reduced output for each non-reduced input axis.
    let kept_dims: Vec<usize> = input
        .dims()
        .iter()
        .enumerate()
        .map(|(axis, &d)| if reduced[axis] { 1 } else { d })
        .collect();
    let kept_strides = compute_strides(&kept_dims);
    let out_len: usize = kept_dims.iter().product();

    if input.dtype().is_integer() || input.dtype() == DType::Bool {
        let values = input.cast(DType::I64).index_values()?;
        let mut acc = vec![reduce_init_i64(kind); out_len];
        for (idx, &value) in values.iter().enumerate() {
            let slot = kept_flat_index(idx, input.dims(), &reduced, &kept_strides);
            acc[slot] = reduce_step_i64(kind, acc[slot], value);
        }
        return Ok(HostTensor::from_i64(out_dims, acc)?.cast(out_dtype));
    }

    if input.dtype() == DType::F64 {
        let values = input.f64_values();
        let mut acc = vec![reduce_init_f64(kind); out_len];
        for (idx, &value) in values.iter().enumerate() {
            let slot = kept_flat_index(idx, input.dims(), &reduced, &kept_strides);
            acc[slot] = reduce_step_f64(kind, acc[slot], value);
        }
        return Ok(HostTensor::from_f64(out_dims, acc)?.cast(out_dtype));
    }

    let values = input.f32_values()?;
    let mut acc = vec![reduce_init_f64(kind) as f32; out_len];
    for (idx, &value) in values.iter().enumerate() {
        let slot = kept_flat_index(idx, input.dims(), &reduced, &kept_strides);
        acc[slot] = reduce_step_f32(kind, acc[slot], value);
    }
    Ok(HostTensor::from_f32(out_dims, acc)?.cast(out_dtype))
}

fn kept_flat_index(
    flat: usize,
    dims: &[usize],
    reduced: &[bool],
    kept_strides: &[usize],
) -> usize {
    let coord = unravel_index(flat, dims);
    let mut slot = 0usize;
    for (axis, &c) in coord.iter().enumerate() {
        if !reduced[axis] {
            slot += c * kept_strides[axis];
        }
    }
    slot
}

fn reduce_init_i64(kind: ReduceKind) -> i64 {
    match kind {
        ReduceKind::Sum => 0,
        ReduceKind::Prod => 1,
        ReduceKind::Max => i64::MIN,
        ReduceKind::Min => i64::MAX,
    }
}

fn reduce_init_f64(kind: ReduceKind) -> f64 {
    match kind {
        ReduceKind::Sum => 0.0,
        ReduceKind::Prod => 1.0,
        ReduceKind::Max => f64::NEG_INFINITY,
        ReduceKind::Min => f64::INFINITY,
    }
}

fn reduce_step_i64(kind: ReduceKind, acc: i64, value: i64) -> i64 {
    match kind {
        ReduceKind::Sum => acc.wrapping_add(value),
        ReduceKind::Prod => acc.wrapping_mul(value),
        ReduceKind::Max => acc.max(value),
        ReduceKind::Min => acc.min(value),
    }
}

fn reduce_step_f64(kind: ReduceKind, acc: f64, value: f64) -> f64 {
    match kind {
        ReduceKind::Sum => acc + value,
        ReduceKind::Prod => acc * value,
        ReduceKind::Max => acc.max(value),
        ReduceKind::Min => acc.min(value),
    }
}

fn reduce_step_f32(kind: ReduceKind, acc: f32, value: f32) -> f32 {
    match kind {
        ReduceKind::Sum => acc + value,
        ReduceKind::Prod => acc * value,
        ReduceKind::Max => acc.max(value),
        ReduceKind::Min => acc.min(value),
    }
}

/// Cumulative sum/product along one axis with the TF `exclusive` /
/// `reverse` flags.
pub fn eval_scan(
    kind: ScanKind,
    input: &HostTensor,
    axis: i64,
    exclusive: bool,
    reverse: bool,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let axis = normalize_axis(axis, input.rank())?;
    let dims = input.dims().to_vec();
    let extent = dims[axis];
    let strides = compute_strides(&dims);
    let line_stride = strides[axis];
    // Every line along `axis` starts at a flat index whose axis coordinate
    // is zero.
    let line_starts: Vec<usize> = (0..input.len())
        .filter(|&idx| unravel_index(idx, &dims)[axis] == 0)
        .collect();

    if input.dtype().is_integer() || input.dtype() == DType::Bool {
        let values = input.cast(DType::I64).index_values()?;
        let mut out = vec![0i64; values.len()];
        for &start in &line_starts {
            scan_line_i64(kind, &values, &mut out, start, extent, line_stride, exclusive, reverse);
        }
        return Ok(HostTensor::from_i64(dims, out)?.cast(out_dtype));
    }

    if input.dtype() == DType::F64 {
        let values = input.f64_values();
        let mut out = vec![0f64; values.len()];
        for &start in &line_starts {
            scan_line_f64(kind, &values, &mut out, start, extent, line_stride, exclusive, reverse);
        }
        return Ok(HostTensor::from_f64(dims, out)?.cast(out_dtype));
    }

    let values = input.f32_values()?;
    let mut out = vec![0f32; values.len()];
    for &start in &line_starts {
        scan_line_f32(kind, &values, &mut out, start, extent, line_stride, exclusive, reverse);
    }
    Ok(HostTensor::from_f32(dims, out)?.cast(out_dtype))
}

macro_rules! scan_line_impl {
    ($name:ident, $ty:ty, $one:expr) => {
        #[allow(clippy::too_many_arguments)]
        fn $name(
            kind: ScanKind,
            values: &[$ty],
            out: &mut [$ty],
            start: usize,
            extent: usize,
            stride: usize,
            exclusive: bool,
            reverse: bool,
        ) {
            let order: Vec<usize> = if reverse {
                (0..extent).rev().collect()
            } else {
                (0..extent).collect()
            };
            let mut acc: $ty = match kind {
                ScanKind::Sum => Default::default(),
                ScanKind::Prod => $one,
            };
            for &step in &order {
                let idx = start + step * stride;
                if exclusive {
                    out[idx] = acc;
                }
                acc = match kind {
                    ScanKind::Sum => acc + values[idx],
                    ScanKind::Prod => acc * values[idx],
                };
                if !exclusive {
                    out[idx] = acc;
                }
            }
        }
    };
}

scan_line_impl!(scan_line_i64, i64, 1i64);
scan_line_impl!(scan_line_f64, f64, 1f64);
scan_line_impl!(scan_line_f32, f32, 1f32);

/// `(x.all() > 0)` as a single-element tensor of the declared dtype.
pub fn eval_elem_any(input: &HostTensor, out_dtype: DType) -> EvalResult<HostTensor> {
    let all_nonzero = input.f64_values().iter().all(|&x| x != 0.0);
    Ok(HostTensor::from_bool(vec![1], vec![all_nonzero])?.cast(out_dtype))
}
