//! Index-driven gather/scatter kernels.
//!
//! Bounds discipline differs by operator: `gather_nd` and
//! `tensor_scatter_add` silently suppress out-of-range coordinate tuples
//! (the affected element reads zero / is skipped), `unsorted_segment_sum`
//! drops out-of-range segment ids, while plain `gather` treats a bad index
//! as a hard error.

use std::sync::Arc;

use oracle_core::{DType, EvalError, EvalResult};

use crate::reduce::normalize_axis;
use crate::tensor::{compute_strides, map_storage, HostTensor, TensorData};

/// `np.take` along one axis: output shape is
/// `data.shape[:axis] + indices.shape + data.shape[axis+1:]`. Negative
/// indices wrap once; anything still out of range fails.
pub fn eval_gather(data: &HostTensor, indices: &HostTensor, axis: i64) -> EvalResult<HostTensor> {
    let axis = normalize_axis(axis, data.rank())?;
    let extent = data.dims()[axis];
    let flat: Vec<usize> = indices
        .index_values()?
        .into_iter()
        .map(|idx| {
            let adjusted = if idx < 0 { idx + extent as i64 } else { idx };
            if adjusted < 0 || adjusted >= extent as i64 {
                Err(EvalError::execution(format!(
                    "gather index {idx} out of range for axis {axis} (extent {extent})"
                )))
            } else {
                Ok(adjusted as usize)
            }
        })
        .collect::<EvalResult<_>>()?;

    let mut lists: Vec<Vec<usize>> = data.dims().iter().map(|&d| (0..d).collect()).collect();
    lists[axis] = flat;
    let taken = data.take_by_lists(&lists)?;

    let mut out_dims = data.dims()[..axis].to_vec();
    out_dims.extend_from_slice(indices.dims());
    out_dims.extend_from_slice(&data.dims()[axis + 1..]);
    taken.reshaped(out_dims)
}

/// Flat element offsets selected by each row of a `[rows, k]` coordinate
/// table; `None` marks a row with any out-of-range component.
fn row_offsets(coords: &[i64], rows: usize, k: usize, data_dims: &[usize]) -> Vec<Option<usize>> {
    let strides = compute_strides(data_dims);
    (0..rows)
        .map(|r| {
            let mut offset = 0usize;
            for (c, &idx) in coords[r * k..(r + 1) * k].iter().enumerate() {
                if idx < 0 || idx >= data_dims[c] as i64 {
                    return None;
                }
                offset += idx as usize * strides[c];
            }
            Some(offset)
        })
        .collect()
}

/// `gather_nd`: the indices' trailing axis is a coordinate tuple into the
/// data's leading axes. Output shape is
/// `indices.shape[:-1] + data.shape[k:]`; suppressed rows stay zero.
pub fn eval_gather_nd(data: &HostTensor, indices: &HostTensor) -> EvalResult<HostTensor> {
    if indices.rank() == 0 {
        return Err(EvalError::execution("gather_nd indices must have rank >= 1"));
    }
    let k = indices.dims()[indices.rank() - 1];
    if k > data.rank() {
        return Err(EvalError::execution(format!(
            "coordinate tuples of width {k} exceed data rank {}",
            data.rank()
        )));
    }
    let rows: usize = indices.dims()[..indices.rank() - 1].iter().product();
    let tail = &data.dims()[k..];
    let tail_len: usize = tail.iter().product();
    let coords = indices.index_values()?;
    let offsets = row_offsets(&coords, rows, k, data.dims());

    let out_data = map_storage!(data.data(), |v| {
        let mut out = vec![Default::default(); rows * tail_len];
        for (row, base) in offsets.iter().enumerate() {
            if let Some(base) = base {
                out[row * tail_len..(row + 1) * tail_len]
                    .copy_from_slice(&v[*base..*base + tail_len]);
            }
        }
        out
    });
    let mut out_dims = indices.dims()[..indices.rank() - 1].to_vec();
    out_dims.extend_from_slice(tail);
    HostTensor::new(out_dims, out_data)
}

/// `tensor_scatter_add`: accumulates each updates row into a copy of the
/// data at the row's coordinate tuple; duplicates sum, out-of-range rows
/// are skipped. Rank-1 indices are treated as `[n, 1]` tuples.
pub fn eval_tensor_scatter_add(
    data: &HostTensor,
    indices: &HostTensor,
    updates: &HostTensor,
) -> EvalResult<HostTensor> {
    let k = if indices.rank() > 1 {
        indices.dims()[indices.rank() - 1]
    } else {
        1
    };
    if k > data.rank() {
        return Err(EvalError::execution(format!(
            "coordinate tuples of width {k} exceed data rank {}",
            data.rank()
        )));
    }
    let rows = indices.len() / k.max(1);
    let tail_len: usize = data.dims()[k..].iter().product();
    if updates.len() != rows * tail_len {
        return Err(EvalError::execution(format!(
            "updates carry {} elements but {rows} rows of {tail_len} are addressed",
            updates.len()
        )));
    }
    let coords = indices.index_values()?;
    let offsets = row_offsets(&coords, rows, k, data.dims());
    let updates = updates.cast(data.dtype());

    macro_rules! scatter_arm {
        ($variant:ident, $add:expr) => {{
            let (base_values, update_values) = match (data.data(), updates.data()) {
                (TensorData::$variant(a), TensorData::$variant(b)) => (a, b),
                _ => unreachable!("updates narrowed to the data dtype"),
            };
            let mut out = base_values.to_vec();
            for (row, base) in offsets.iter().enumerate() {
                if let Some(base) = base {
                    for j in 0..tail_len {
                        out[base + j] = $add(out[base + j], update_values[row * tail_len + j]);
                    }
                }
            }
            TensorData::$variant(Arc::from(out))
        }};
    }
    let out_data = match data.dtype() {
        DType::Bool => scatter_arm!(Bool, |a: u8, b: u8| a | b),
        DType::I32 => scatter_arm!(I32, |a: i32, b: i32| a.wrapping_add(b)),
        DType::I64 => scatter_arm!(I64, |a: i64, b: i64| a.wrapping_add(b)),
        DType::F16 => scatter_arm!(F16, |a, b| a + b),
        DType::F32 => scatter_arm!(F32, |a: f32, b: f32| a + b),
        DType::F64 => scatter_arm!(F64, |a: f64, b: f64| a + b),
    };
    HostTensor::new(data.dims().to_vec(), out_data)
}

/// `unsorted_segment_sum`: sums data slices into `num_segments` buckets
/// addressed by the ids tensor over the data's leading axes.
pub fn eval_unsorted_segment_sum(
    data: &HostTensor,
    segment_ids: &HostTensor,
    num_segments: usize,
) -> EvalResult<HostTensor> {
    let id_rank = segment_ids.rank();
    if id_rank > data.rank() {
        return Err(EvalError::execution(
            "segment ids rank exceeds data rank",
        ));
    }
    if segment_ids.dims() != &data.dims()[..id_rank] {
        return Err(EvalError::execution(format!(
            "segment ids shape {:?} does not prefix data shape {:?}",
            segment_ids.dims(),
            data.dims()
        )));
    }
    let inner: usize = data.dims()[id_rank..].iter().product();
    let ids = segment_ids.index_values()?;

    macro_rules! segment_arm {
        ($variant:ident, $zero:expr, $add:expr) => {{
            let values = match data.data() {
                TensorData::$variant(v) => v,
                _ => unreachable!("matched on dtype"),
            };
            let mut out = vec![$zero; num_segments * inner];
            for (i, &seg) in ids.iter().enumerate() {
                if seg < 0 || seg >= num_segments as i64 {
                    continue;
                }
                let dst = seg as usize * inner;
                for j in 0..inner {
                    out[dst + j] = $add(out[dst + j], values[i * inner + j]);
                }
            }
            TensorData::$variant(Arc::from(out))
        }};
    }
    let out_data = match data.dtype() {
        DType::Bool => segment_arm!(Bool, 0u8, |a: u8, b: u8| a | b),
        DType::I32 => segment_arm!(I32, 0i32, |a: i32, b: i32| a.wrapping_add(b)),
        DType::I64 => segment_arm!(I64, 0i64, |a: i64, b: i64| a.wrapping_add(b)),
        DType::F16 => segment_arm!(F16, half::f16::ZERO, |a, b| a + b),
        DType::F32 => segment_arm!(F32, 0f32, |a: f32, b: f32| a + b),
        DType::F64 => segment_arm!(F64, 0f64, |a: f64, b: f64| a + b),
    };
    let mut out_dims = vec![num_segments];
    out_dims.extend_from_slice(&data.dims()[id_rank..]);
    HostTensor::new(out_dims, out_data)
}

/// `one_hot`: inserts a `depth` axis at `axis` (negative counts against
/// rank + 1), writing the on-value at each index's slot. Indices outside
/// `[0, depth)` leave their row entirely off.
pub fn eval_one_hot(
    indices: &HostTensor,
    axis: i64,
    depth: usize,
    on_value: &HostTensor,
    off_value: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let out_rank = indices.rank() + 1;
    let axis = normalize_axis(axis, out_rank)?;
    let mut out_dims = indices.dims().to_vec();
    out_dims.insert(axis, depth);

    let on = scalar_value(on_value, "one_hot on-value")?;
    let off = scalar_value(off_value, "one_hot off-value")?;
    let ids = indices.index_values()?;
    let out_strides = compute_strides(&out_dims);
    let in_dims = indices.dims();

    let out_len: usize = out_dims.iter().product();
    let mut values = vec![off; out_len];
    for (flat, &id) in ids.iter().enumerate() {
        if id < 0 || id >= depth as i64 {
            continue;
        }
        let coord = crate::tensor::unravel_index(flat, in_dims);
        let mut dst = id as usize * out_strides[axis];
        let mut out_axis = 0usize;
        for &c in &coord {
            if out_axis == axis {
                out_axis += 1;
            }
            dst += c * out_strides[out_axis];
            out_axis += 1;
        }
        values[dst] = on;
    }
    Ok(HostTensor::from_f64(out_dims, values)?.cast(out_dtype))
}

fn scalar_value(tensor: &HostTensor, what: &str) -> EvalResult<f64> {
    tensor
        .f64_values()
        .first()
        .copied()
        .ok_or_else(|| EvalError::execution(format!("{what} must be a scalar")))
}
