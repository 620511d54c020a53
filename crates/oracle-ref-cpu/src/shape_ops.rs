//! Shape-manipulating kernels: concatenation, axis insertion, operand sums.

use std::sync::Arc;

use oracle_core::{DType, EvalError, EvalResult};

use crate::elementwise::{eval_binary, BinaryOp};
use crate::reduce::normalize_axis;
use crate::tensor::{compute_strides, unravel_index, HostTensor, TensorData};

/// Concatenates same-rank tensors along `axis`. All operands are narrowed
/// to the first operand's dtype so storage stays uniform.
pub fn eval_concat(tensors: &[HostTensor], axis: i64) -> EvalResult<HostTensor> {
    let first = tensors
        .first()
        .ok_or_else(|| EvalError::execution("concat needs at least one operand"))?;
    let dtype = first.dtype();
    let rank = first.rank();
    let axis = normalize_axis(axis, rank)?;
    let parts: Vec<HostTensor> = tensors.iter().map(|t| t.cast(dtype)).collect();
    let mut out_dims = first.dims().to_vec();
    out_dims[axis] = 0;
    for part in &parts {
        if part.rank() != rank {
            return Err(EvalError::execution("concat operands must share rank"));
        }
        for (a, (&d, &e)) in part.dims().iter().zip(first.dims().iter()).enumerate() {
            if a != axis && d != e {
                return Err(EvalError::execution(format!(
                    "concat operand shape {:?} disagrees with {:?} off axis {axis}",
                    part.dims(),
                    first.dims()
                )));
            }
        }
        out_dims[axis] += part.dims()[axis];
    }

    macro_rules! concat_arm {
        ($variant:ident) => {{
            let slices: Vec<&[_]> = parts
                .iter()
                .map(|t| match t.data() {
                    TensorData::$variant(v) => v.as_ref(),
                    _ => unreachable!("operands narrowed to a single dtype"),
                })
                .collect();
            let dims_list: Vec<&[usize]> = parts.iter().map(|t| t.dims()).collect();
            TensorData::$variant(Arc::from(concat_values(&slices, &dims_list, &out_dims, axis)))
        }};
    }
    let data = match dtype {
        DType::Bool => concat_arm!(Bool),
        DType::I32 => concat_arm!(I32),
        DType::I64 => concat_arm!(I64),
        DType::F16 => concat_arm!(F16),
        DType::F32 => concat_arm!(F32),
        DType::F64 => concat_arm!(F64),
    };
    HostTensor::new(out_dims, data)
}

fn concat_values<T: Copy>(
    slices: &[&[T]],
    dims_list: &[&[usize]],
    out_dims: &[usize],
    axis: usize,
) -> Vec<T> {
    let out_len: usize = out_dims.iter().product();
    // Offsets of each part's segment along the concat axis.
    let mut starts = Vec::with_capacity(dims_list.len());
    let mut acc = 0usize;
    for dims in dims_list {
        starts.push(acc);
        acc += dims[axis];
    }
    let mut out = Vec::with_capacity(out_len);
    for idx in 0..out_len {
        let mut coord = unravel_index(idx, out_dims);
        let part = starts
            .iter()
            .rposition(|&s| s <= coord[axis])
            .unwrap_or(0);
        coord[axis] -= starts[part];
        let strides = compute_strides(dims_list[part]);
        let src: usize = coord.iter().zip(strides.iter()).map(|(&c, &s)| c * s).sum();
        out.push(slices[part][src]);
    }
    out
}

/// Inserts a size-1 axis at `axis` (negative counts from the new rank).
pub fn eval_expand_dims(input: &HostTensor, axis: i64) -> EvalResult<HostTensor> {
    let new_rank = input.rank() + 1;
    let axis = normalize_axis(axis, new_rank)?;
    let mut dims = input.dims().to_vec();
    dims.insert(axis, 1);
    input.reshaped(dims)
}

/// Sums every operand of a multi-tensor slot pairwise, narrowing into the
/// declared dtype at each step.
pub fn eval_add_n(tensors: &[HostTensor], out_dtype: DType) -> EvalResult<HostTensor> {
    let mut iter = tensors.iter();
    let first = iter
        .next()
        .ok_or_else(|| EvalError::execution("AddN needs at least one operand"))?;
    let mut acc = first.cast(out_dtype);
    for next in iter {
        acc = eval_binary(BinaryOp::Add, &acc, next, out_dtype)?;
    }
    Ok(acc)
}
