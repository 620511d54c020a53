//! Mask-resolving strided slice with Python slice index semantics.

use oracle_core::{EvalError, EvalResult};

use crate::tensor::HostTensor;

/// Fully-resolved slice request. Masks address axes by bit position
/// (bit `i` = axis `i`); `begin`/`end`/`strides` cover the leading axes
/// and any remaining axes pass through whole.
#[derive(Debug, Clone, Default)]
pub struct SliceSpec {
    pub begin: Vec<i64>,
    pub end: Vec<i64>,
    pub strides: Vec<i64>,
    pub begin_mask: i64,
    pub end_mask: i64,
    pub ellipsis_mask: i64,
    pub new_axis_mask: i64,
    pub shrink_axis_mask: i64,
}

fn bit(mask: i64, axis: usize) -> bool {
    axis < 64 && (mask >> axis) & 1 == 1
}

/// Index set selected by `start:stop:step` over an axis of `len` elements,
/// with CPython's negative-index and clamping rules.
pub fn slice_indices(start: i64, stop: i64, step: i64, len: usize) -> EvalResult<Vec<usize>> {
    if step == 0 {
        return Err(EvalError::execution("slice step cannot be zero"));
    }
    let n = len as i64;
    let adjust = |mut v: i64| -> i64 {
        if v < 0 {
            v += n;
            if v < 0 {
                if step < 0 {
                    -1
                } else {
                    0
                }
            } else {
                v
            }
        } else if v >= n {
            if step < 0 {
                n - 1
            } else {
                n
            }
        } else {
            v
        }
    };
    let mut cur = adjust(start);
    let stop = adjust(stop);
    let mut out = Vec::new();
    if step > 0 {
        while cur < stop {
            out.push(cur as usize);
            cur += step;
        }
    } else {
        while cur > stop {
            out.push(cur as usize);
            cur += step;
        }
    }
    Ok(out)
}

fn normalize_point(index: i64, len: usize) -> EvalResult<usize> {
    let n = len as i64;
    let adjusted = if index < 0 { index + n } else { index };
    if adjusted < 0 || adjusted >= n {
        return Err(EvalError::execution(format!(
            "shrink-axis index {index} out of range for extent {len}"
        )));
    }
    Ok(adjusted as usize)
}

/// Applies the five-mask strided slice: per-axis begin/end-mask widening,
/// then ellipsis, new-axis, and shrink-axis overrides, then Python slicing,
/// then axis insertion/removal on the sliced result. At most one new-axis
/// bit and one shrink-axis bit are accepted.
pub fn eval_strided_slice(input: &HostTensor, spec: &SliceSpec) -> EvalResult<HostTensor> {
    let rank = input.rank();
    if spec.begin.len() != spec.end.len() || spec.begin.len() != spec.strides.len() {
        return Err(EvalError::execution(
            "begin/end/strides must have matching lengths",
        ));
    }
    if spec.begin.len() > rank {
        return Err(EvalError::execution(format!(
            "slice addresses {} axes but tensor has rank {rank}",
            spec.begin.len()
        )));
    }
    if spec.new_axis_mask.count_ones() > 1 {
        return Err(EvalError::execution(
            "more than one new-axis bit is not supported",
        ));
    }
    if spec.shrink_axis_mask.count_ones() > 1 {
        return Err(EvalError::execution(
            "more than one shrink-axis bit is not supported",
        ));
    }

    let mut new_axis = None;
    let mut shrink_axis = None;
    let mut lists: Vec<Vec<usize>> = Vec::with_capacity(rank);
    for axis in 0..rank {
        let len = input.dims()[axis];
        if axis >= spec.begin.len() {
            lists.push((0..len).collect());
            continue;
        }
        let stride = spec.strides[axis];
        let mut start = if bit(spec.begin_mask, axis) {
            if stride >= 0 {
                0
            } else {
                -1
            }
        } else {
            spec.begin[axis]
        };
        let mut stop = if bit(spec.end_mask, axis) {
            if stride >= 0 {
                len as i64
            } else {
                -(len as i64) - 1
            }
        } else {
            spec.end[axis]
        };
        let mut step = stride;
        if bit(spec.ellipsis_mask, axis) {
            start = 0;
            stop = len as i64;
            step = 1;
        }
        if bit(spec.new_axis_mask, axis) {
            start = 0;
            stop = len as i64;
            step = 1;
            new_axis = Some(axis);
        }
        if bit(spec.shrink_axis_mask, axis) {
            let point = normalize_point(start, len)?;
            lists.push(vec![point]);
            shrink_axis = Some(axis);
            continue;
        }
        lists.push(slice_indices(start, stop, step, len)?);
    }

    let mut result = input.take_by_lists(&lists)?;
    if let Some(axis) = new_axis {
        let mut dims = result.dims().to_vec();
        dims.insert(axis, 1);
        result = result.reshaped(dims)?;
    }
    if let Some(axis) = shrink_axis {
        let mut dims = result.dims().to_vec();
        if axis >= dims.len() || dims[axis] != 1 {
            return Err(EvalError::execution(format!(
                "cannot squeeze axis {axis} of shape {dims:?}"
            )));
        }
        dims.remove(axis);
        result = result.reshaped(dims)?;
    }
    Ok(result)
}
