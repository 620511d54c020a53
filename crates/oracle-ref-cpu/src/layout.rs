//! Dense <-> FRACTAL_NZ layout conversion over the trailing two axes.
//!
//! The fractal layout tiles the trailing `(m, n)` matrix into 16x16 blocks
//! stored as `(n1, m1, 16, 16)`; leading batch axes pass through untouched.
//! Rows and columns that are not multiples of 16 are zero-padded on the way
//! in and cropped back on the way out, with the caller-supplied original
//! shape authoritative for the crop.

use oracle_core::{EvalError, EvalResult, TensorFormat};

use crate::tensor::HostTensor;

pub const TILE: usize = 16;

/// Which fractal axis ordering a packed shape uses when recovering the
/// dense shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fractal {
    ZN,
    ZZ,
}

fn round_up(value: usize) -> usize {
    value.div_ceil(TILE) * TILE
}

/// `(..., m, n)` dense to `(..., n1, m1, 16, 16)` fractal.
pub fn dense_to_fractal(input: &HostTensor) -> EvalResult<HostTensor> {
    let rank = input.rank();
    if rank < 2 {
        return Err(EvalError::execution(
            "fractal packing needs at least two axes",
        ));
    }
    let dims = input.dims();
    let (m, n) = (dims[rank - 2], dims[rank - 1]);
    let (pad_m, pad_n) = (round_up(m), round_up(n));

    let mut padded = input.clone();
    if pad_m != m || pad_n != n {
        let head = vec![0usize; rank];
        let mut tail = vec![0usize; rank];
        tail[rank - 2] = pad_m - m;
        tail[rank - 1] = pad_n - n;
        padded = input.pad(&head, &tail, 0.0)?;
    }

    let mut tiled_dims = dims[..rank - 2].to_vec();
    tiled_dims.extend([pad_m / TILE, TILE, pad_n / TILE, TILE]);
    let tiled = padded.reshaped(tiled_dims)?;

    // (m1, m0, n1, n0) -> (n1, m1, m0, n0) on the trailing four axes.
    let batch = rank - 2;
    let mut perm: Vec<usize> = (0..batch).collect();
    perm.extend([2, 0, 1, 3].iter().map(|&p| p + batch));
    tiled.permute(&perm)
}

/// `(..., n1, m1, 16, 16)` fractal back to dense, cropped to `original`'s
/// trailing two extents.
pub fn fractal_to_dense(input: &HostTensor, original: &[usize]) -> EvalResult<HostTensor> {
    let rank = input.rank();
    if rank < 4 || original.len() < 2 {
        return Err(EvalError::execution(
            "fractal unpacking needs four packed axes and a 2-D original shape",
        ));
    }
    let dims = input.dims();
    let (n1, m1, m0, n0) = (dims[rank - 4], dims[rank - 3], dims[rank - 2], dims[rank - 1]);

    let batch = rank - 4;
    let mut perm: Vec<usize> = (0..batch).collect();
    perm.extend([1, 2, 0, 3].iter().map(|&p| p + batch));
    let unpacked = input.permute(&perm)?;

    let mut dense_dims = dims[..batch].to_vec();
    dense_dims.extend([m1 * m0, n1 * n0]);
    let dense = unpacked.reshaped(dense_dims.clone())?;

    if dense.dims() == original {
        return Ok(dense);
    }
    let mut target = dense_dims;
    let dense_rank = target.len();
    target[dense_rank - 2] = original[original.len() - 2];
    target[dense_rank - 1] = original[original.len() - 1];
    dense.crop_to(&target)
}

/// Dispatch for the `TransData` operator. `original_shape` is the declared
/// output shape, used as the crop target when unpacking.
pub fn eval_trans_data(
    input: &HostTensor,
    src: TensorFormat,
    dst: TensorFormat,
    original_shape: &[usize],
) -> EvalResult<HostTensor> {
    match (src, dst) {
        (TensorFormat::Default | TensorFormat::Nchw, TensorFormat::FractalNz) => {
            dense_to_fractal(input)
        }
        (TensorFormat::FractalNz, TensorFormat::Default | TensorFormat::Nchw) => {
            fractal_to_dense(input, original_shape)
        }
        (src, dst) => Err(EvalError::UnsupportedLayout { src, dst }),
    }
}

/// Recovers the dense shape implied by a packed fractal shape.
pub fn convert_fractal_shape(dims: &[usize], fractal: Fractal) -> EvalResult<Vec<usize>> {
    if dims.len() < 4 {
        return Err(EvalError::execution(
            "fractal shape needs at least four axes",
        ));
    }
    let r = dims.len();
    let mut out = dims[..r - 4].to_vec();
    match fractal {
        Fractal::ZN => out.extend([dims[r - 2] * dims[r - 3], dims[r - 1] * dims[r - 4]]),
        Fractal::ZZ => out.extend([dims[r - 4] * dims[r - 2], dims[r - 3] * dims[r - 1]]),
    }
    Ok(out)
}
