use std::sync::Arc;

use half::f16;
use oracle_core::{DType, EvalError, EvalResult};

/// Dense row-major storage for one runtime tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Bool(Arc<[u8]>),
    I32(Arc<[i32]>),
    I64(Arc<[i64]>),
    F16(Arc<[f16]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Bool(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Bool(_) => DType::Bool,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
            TensorData::F16(_) => DType::F16,
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
        }
    }
}

/// Applies a generic slice expression to whichever variant is present,
/// rebuilding the same variant from the resulting `Vec`.
macro_rules! map_storage {
    ($data:expr, |$v:ident| $body:expr) => {
        match $data {
            TensorData::Bool($v) => TensorData::Bool(Arc::from($body)),
            TensorData::I32($v) => TensorData::I32(Arc::from($body)),
            TensorData::I64($v) => TensorData::I64(Arc::from($body)),
            TensorData::F16($v) => TensorData::F16(Arc::from($body)),
            TensorData::F32($v) => TensorData::F32(Arc::from($body)),
            TensorData::F64($v) => TensorData::F64(Arc::from($body)),
        }
    };
}
pub(crate) use map_storage;

/// Host-resident tensor value produced and consumed by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    dims: Vec<usize>,
    data: TensorData,
}

impl HostTensor {
    pub fn new(dims: Vec<usize>, data: TensorData) -> EvalResult<Self> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(EvalError::execution(format!(
                "tensor data length {} does not match shape {:?}",
                data.len(),
                dims
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn from_f32(dims: Vec<usize>, values: Vec<f32>) -> EvalResult<Self> {
        Self::new(dims, TensorData::F32(Arc::from(values)))
    }

    pub fn from_f64(dims: Vec<usize>, values: Vec<f64>) -> EvalResult<Self> {
        Self::new(dims, TensorData::F64(Arc::from(values)))
    }

    pub fn from_f16(dims: Vec<usize>, values: Vec<f16>) -> EvalResult<Self> {
        Self::new(dims, TensorData::F16(Arc::from(values)))
    }

    pub fn from_i32(dims: Vec<usize>, values: Vec<i32>) -> EvalResult<Self> {
        Self::new(dims, TensorData::I32(Arc::from(values)))
    }

    pub fn from_i64(dims: Vec<usize>, values: Vec<i64>) -> EvalResult<Self> {
        Self::new(dims, TensorData::I64(Arc::from(values)))
    }

    pub fn from_bool(dims: Vec<usize>, values: Vec<bool>) -> EvalResult<Self> {
        let raw: Vec<u8> = values.into_iter().map(|b| b as u8).collect();
        Self::new(dims, TensorData::Bool(Arc::from(raw)))
    }

    pub fn zeros(dtype: DType, dims: Vec<usize>) -> Self {
        let len: usize = dims.iter().product();
        let data = match dtype {
            DType::Bool => TensorData::Bool(Arc::from(vec![0u8; len])),
            DType::I32 => TensorData::I32(Arc::from(vec![0i32; len])),
            DType::I64 => TensorData::I64(Arc::from(vec![0i64; len])),
            DType::F16 => TensorData::F16(Arc::from(vec![f16::ZERO; len])),
            DType::F32 => TensorData::F32(Arc::from(vec![0.0f32; len])),
            DType::F64 => TensorData::F64(Arc::from(vec![0.0f64; len])),
        };
        Self { dims, data }
    }

    /// Builds a tensor of `dims` filled with one scalar, converted into the
    /// requested dtype.
    pub fn full(dtype: DType, dims: Vec<usize>, value: f64) -> Self {
        let len: usize = dims.iter().product();
        let data = match dtype {
            DType::Bool => TensorData::Bool(Arc::from(vec![(value != 0.0) as u8; len])),
            DType::I32 => TensorData::I32(Arc::from(vec![value as i32; len])),
            DType::I64 => TensorData::I64(Arc::from(vec![value as i64; len])),
            DType::F16 => TensorData::F16(Arc::from(vec![f16::from_f64(value); len])),
            DType::F32 => TensorData::F32(Arc::from(vec![value as f32; len])),
            DType::F64 => TensorData::F64(Arc::from(vec![value; len])),
        };
        Self { dims, data }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_f32_slice(&self) -> EvalResult<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Ok(v.as_ref()),
            _ => Err(EvalError::dtype("f32 access", self.dtype())),
        }
    }

    pub fn as_bool_slice(&self) -> EvalResult<&[u8]> {
        match &self.data {
            TensorData::Bool(v) => Ok(v.as_ref()),
            _ => Err(EvalError::dtype("bool access", self.dtype())),
        }
    }

    /// Every numeric value widened to f64, for predicates and generic
    /// plumbing where the widening is exact or precision is irrelevant.
    pub fn f64_values(&self) -> Vec<f64> {
        match &self.data {
            TensorData::Bool(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::F16(v) => v.iter().map(|&x| x.to_f64()).collect(),
            TensorData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::F64(v) => v.to_vec(),
        }
    }

    /// Values widened to f32; accepted for the half/single dtypes that the
    /// mixed-precision compute paths care about.
    pub fn f32_values(&self) -> EvalResult<Vec<f32>> {
        match &self.data {
            TensorData::F16(v) => Ok(v.iter().map(|&x| x.to_f32()).collect()),
            TensorData::F32(v) => Ok(v.to_vec()),
            _ => Err(EvalError::dtype("f32 widening", self.dtype())),
        }
    }

    /// Integer index view; only integral dtypes qualify.
    pub fn index_values(&self) -> EvalResult<Vec<i64>> {
        match &self.data {
            TensorData::I32(v) => Ok(v.iter().map(|&x| x as i64).collect()),
            TensorData::I64(v) => Ok(v.to_vec()),
            _ => Err(EvalError::dtype("index access", self.dtype())),
        }
    }

    /// Same storage under a new shape; element count must agree.
    pub fn reshaped(&self, dims: Vec<usize>) -> EvalResult<Self> {
        let expected: usize = dims.iter().product();
        if expected != self.len() {
            return Err(EvalError::execution(format!(
                "reshape element count mismatch: {:?} -> {:?}",
                self.dims, dims
            )));
        }
        Ok(Self {
            dims,
            data: self.data.clone(),
        })
    }

    /// numpy-style `astype`: floats truncate toward zero when narrowed to
    /// integers, anything nonzero becomes `true` for bool.
    pub fn cast(&self, dtype: DType) -> Self {
        if dtype == self.dtype() {
            return self.clone();
        }
        let wide = self.f64_values();
        let data = match dtype {
            DType::Bool => TensorData::Bool(Arc::from(
                wide.iter().map(|&x| (x != 0.0) as u8).collect::<Vec<_>>(),
            )),
            DType::I32 => {
                TensorData::I32(Arc::from(wide.iter().map(|&x| x as i32).collect::<Vec<_>>()))
            }
            DType::I64 => {
                TensorData::I64(Arc::from(wide.iter().map(|&x| x as i64).collect::<Vec<_>>()))
            }
            DType::F16 => TensorData::F16(Arc::from(
                wide.iter().map(|&x| f16::from_f64(x)).collect::<Vec<_>>(),
            )),
            DType::F32 => {
                TensorData::F32(Arc::from(wide.iter().map(|&x| x as f32).collect::<Vec<_>>()))
            }
            DType::F64 => TensorData::F64(Arc::from(wide)),
        };
        Self {
            dims: self.dims.clone(),
            data,
        }
    }

    /// Reorders axes by `perm` (an inverse-free permutation of axis
    /// indices, numpy `transpose` semantics).
    pub fn permute(&self, perm: &[usize]) -> EvalResult<Self> {
        if perm.len() != self.rank() {
            return Err(EvalError::execution(format!(
                "transpose perm {:?} does not match rank {}",
                perm,
                self.rank()
            )));
        }
        let out_dims: Vec<usize> = perm.iter().map(|&axis| self.dims[axis]).collect();
        let data = map_storage!(&self.data, |v| permute_values(v, &self.dims, perm));
        Ok(Self {
            dims: out_dims,
            data,
        })
    }

    /// numpy-style broadcast to a target shape (right-aligned; size-1 axes
    /// stretch).
    pub fn broadcast_to(&self, target: &[usize]) -> EvalResult<Self> {
        if target.len() < self.rank() {
            return Err(EvalError::execution(format!(
                "cannot broadcast {:?} to lower-rank {:?}",
                self.dims, target
            )));
        }
        let rank_diff = target.len() - self.rank();
        for (axis, &dim) in self.dims.iter().enumerate() {
            let out_dim = target[rank_diff + axis];
            if dim != 1 && dim != out_dim {
                return Err(EvalError::execution(format!(
                    "cannot broadcast {:?} to {:?}",
                    self.dims, target
                )));
            }
        }
        if target == self.dims.as_slice() {
            return Ok(self.clone());
        }
        let data = map_storage!(&self.data, |v| broadcast_values(v, &self.dims, target));
        Ok(Self {
            dims: target.to_vec(),
            data,
        })
    }

    /// Generic multi-axis selection: `lists[axis]` enumerates the source
    /// indices kept on that axis, in output order. The backbone of slicing
    /// and cropping.
    pub fn take_by_lists(&self, lists: &[Vec<usize>]) -> EvalResult<Self> {
        if lists.len() != self.rank() {
            return Err(EvalError::execution(
                "per-axis index lists must match tensor rank",
            ));
        }
        for (axis, list) in lists.iter().enumerate() {
            if let Some(&bad) = list.iter().find(|&&idx| idx >= self.dims[axis]) {
                return Err(EvalError::execution(format!(
                    "index {bad} out of range for axis {axis} (extent {})",
                    self.dims[axis]
                )));
            }
        }
        let out_dims: Vec<usize> = lists.iter().map(Vec::len).collect();
        let data = map_storage!(&self.data, |v| gather_by_lists(v, &self.dims, lists));
        Ok(Self {
            dims: out_dims,
            data,
        })
    }

    /// Repeats the tensor `multiples[axis]` times along each axis
    /// (numpy `tile`; multiples shorter than rank are left-padded with 1).
    pub fn tile(&self, multiples: &[usize]) -> EvalResult<Self> {
        let mut reps = vec![1usize; self.rank().max(multiples.len())];
        let offset = reps.len() - multiples.len();
        reps[offset..].copy_from_slice(multiples);
        let mut base = self.clone();
        if reps.len() > self.rank() {
            let mut dims = vec![1usize; reps.len() - self.rank()];
            dims.extend_from_slice(&self.dims);
            base = self.reshaped(dims)?;
        }
        let out_dims: Vec<usize> = base
            .dims
            .iter()
            .zip(reps.iter())
            .map(|(&d, &r)| d * r)
            .collect();
        let lists: Vec<Vec<usize>> = base
            .dims
            .iter()
            .zip(reps.iter())
            .map(|(&d, &r)| (0..d * r).map(|i| i % d).collect())
            .collect();
        let data = map_storage!(&base.data, |v| gather_by_lists(v, &base.dims, &lists));
        Ok(Self {
            dims: out_dims,
            data,
        })
    }

    /// Constant-pads `head[axis]` elements before and `tail[axis]` after
    /// each axis.
    pub fn pad(&self, head: &[usize], tail: &[usize], value: f64) -> EvalResult<Self> {
        if head.len() != self.rank() || tail.len() != self.rank() {
            return Err(EvalError::execution("pad widths must match tensor rank"));
        }
        let out_dims: Vec<usize> = self
            .dims
            .iter()
            .zip(head.iter().zip(tail.iter()))
            .map(|(&d, (&h, &t))| h + d + t)
            .collect();
        let filled = HostTensor::full(self.dtype(), out_dims.clone(), value);
        let out_strides = compute_strides(&out_dims);
        let data = match (&self.data, &filled.data) {
            (TensorData::Bool(src), TensorData::Bool(dst)) => {
                TensorData::Bool(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            (TensorData::I32(src), TensorData::I32(dst)) => {
                TensorData::I32(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            (TensorData::I64(src), TensorData::I64(dst)) => {
                TensorData::I64(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            (TensorData::F16(src), TensorData::F16(dst)) => {
                TensorData::F16(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            (TensorData::F32(src), TensorData::F32(dst)) => {
                TensorData::F32(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            (TensorData::F64(src), TensorData::F64(dst)) => {
                TensorData::F64(Arc::from(pad_values(src, dst, &self.dims, head, &out_strides)))
            }
            _ => unreachable!("full() preserves dtype"),
        };
        Ok(Self {
            dims: out_dims,
            data,
        })
    }

    /// Crops each axis to `[0, target[axis])`.
    pub fn crop_to(&self, target: &[usize]) -> EvalResult<Self> {
        if target.len() != self.rank() {
            return Err(EvalError::execution("crop shape must match tensor rank"));
        }
        let lists: Vec<Vec<usize>> = target.iter().map(|&d| (0..d).collect()).collect();
        self.take_by_lists(&lists)
    }
}

/// Row-major strides for a dense shape.
pub fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1usize;
    for (i, dim) in dims.iter().enumerate().rev() {
        strides[i] = acc;
        acc *= *dim;
    }
    strides
}

/// Converts a flat row-major index into a coordinate vector.
pub fn unravel_index(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (i, dim) in dims.iter().enumerate().rev() {
        coords[i] = index % *dim;
        index /= *dim;
    }
    coords
}

fn permute_values<T: Copy>(values: &[T], dims: &[usize], perm: &[usize]) -> Vec<T> {
    let out_dims: Vec<usize> = perm.iter().map(|&axis| dims[axis]).collect();
    let in_strides = compute_strides(dims);
    let mut out = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        let coord = unravel_index(idx, &out_dims);
        let mut src = 0usize;
        for (out_axis, &c) in coord.iter().enumerate() {
            src += c * in_strides[perm[out_axis]];
        }
        out.push(values[src]);
    }
    out
}

fn broadcast_values<T: Copy>(values: &[T], dims: &[usize], target: &[usize]) -> Vec<T> {
    let rank_diff = target.len() - dims.len();
    let mut aligned = vec![1usize; target.len()];
    aligned[rank_diff..].copy_from_slice(dims);
    let raw_strides = compute_strides(&aligned);
    // Stretched axes contribute nothing to the source index.
    let strides: Vec<usize> = aligned
        .iter()
        .zip(raw_strides.iter())
        .map(|(&d, &s)| if d == 1 { 0 } else { s })
        .collect();
    let out_len: usize = target.iter().product();
    let mut out = Vec::with_capacity(out_len);
    for idx in 0..out_len {
        let coord = unravel_index(idx, target);
        let mut src = 0usize;
        for (axis, &c) in coord.iter().enumerate() {
            src += c * strides[axis];
        }
        out.push(values[src]);
    }
    out
}

fn gather_by_lists<T: Copy>(values: &[T], dims: &[usize], lists: &[Vec<usize>]) -> Vec<T> {
    let out_dims: Vec<usize> = lists.iter().map(Vec::len).collect();
    let out_len: usize = out_dims.iter().product();
    let in_strides = compute_strides(dims);
    let mut out = Vec::with_capacity(out_len);
    for idx in 0..out_len {
        let coord = unravel_index(idx, &out_dims);
        let mut src = 0usize;
        for (axis, &c) in coord.iter().enumerate() {
            src += lists[axis][c] * in_strides[axis];
        }
        out.push(values[src]);
    }
    out
}

fn pad_values<T: Copy>(
    src: &[T],
    dst: &[T],
    src_dims: &[usize],
    head: &[usize],
    out_strides: &[usize],
) -> Vec<T> {
    let mut out = dst.to_vec();
    for (idx, &value) in src.iter().enumerate() {
        let coord = unravel_index(idx, src_dims);
        let mut dst_index = 0usize;
        for (axis, &c) in coord.iter().enumerate() {
            dst_index += (head[axis] + c) * out_strides[axis];
        }
        out[dst_index] = value;
    }
    out
}
