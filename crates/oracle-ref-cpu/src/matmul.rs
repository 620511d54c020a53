//! Matrix product composer and the direct convolution kernel.
//!
//! Half-precision operands are upcast to `f32` for the accumulation and the
//! result narrows to the declared output dtype at the end. `FRACTAL_NZ`
//! operands are unpacked to dense before the product and the result is
//! re-packed when the declared output format asks for it.

use oracle_core::{DType, EvalError, EvalResult, TensorFormat};

use crate::elementwise::{broadcast_shape, eval_binary, BinaryOp};
use crate::layout::{convert_fractal_shape, dense_to_fractal, fractal_to_dense, Fractal};
use crate::random::gaussian_vector;
use crate::tensor::{compute_strides, HostTensor};

/// Resolved matmul request; the registry fills this from the node's
/// attributes and descriptors.
#[derive(Debug, Clone)]
pub struct MatmulSpec {
    pub left_format: TensorFormat,
    pub right_format: TensorFormat,
    pub transpose_a: bool,
    pub transpose_b: bool,
    pub out_format: TensorFormat,
    pub out_dtype: DType,
}

pub fn eval_matmul(
    left: &HostTensor,
    right: &HostTensor,
    bias: Option<&HostTensor>,
    spec: &MatmulSpec,
    seed: u64,
) -> EvalResult<HostTensor> {
    let left = unpack_operand(left, spec.left_format)?;
    let right = unpack_operand(right, spec.right_format)?;

    let left = maybe_swap_trailing(&left, spec.transpose_a)?;
    let right = maybe_swap_trailing(&right, spec.transpose_b)?;
    let mut result = matmul(&left, &right)?.cast(spec.out_dtype);

    if let Some(bias) = bias {
        // The product's trailing extent is authoritative; a bias of any
        // other length is replaced by a fresh Gaussian vector.
        let expect = result.dims()[result.rank() - 1];
        let repaired;
        let bias = if bias.len() == expect {
            bias
        } else {
            repaired = gaussian_vector(expect, 1.0, 0.1, bias.dtype(), seed)?;
            &repaired
        };
        result = eval_binary(BinaryOp::Add, &result, bias, spec.out_dtype)?;
    }

    if spec.out_format != TensorFormat::Default {
        if spec.out_format != TensorFormat::FractalNz {
            return Err(EvalError::UnsupportedLayout {
                src: TensorFormat::Default,
                dst: spec.out_format,
            });
        }
        result = dense_to_fractal(&result)?;
    }
    Ok(result)
}

fn unpack_operand(operand: &HostTensor, format: TensorFormat) -> EvalResult<HostTensor> {
    if format != TensorFormat::FractalNz {
        return Ok(operand.clone());
    }
    let dense_shape = convert_fractal_shape(operand.dims(), Fractal::ZN)?;
    fractal_to_dense(operand, &dense_shape)
}

fn maybe_swap_trailing(operand: &HostTensor, swap: bool) -> EvalResult<HostTensor> {
    if !swap {
        return Ok(operand.clone());
    }
    let rank = operand.rank();
    if rank < 2 {
        return Err(EvalError::execution("cannot transpose a rank-1 operand"));
    }
    let mut perm: Vec<usize> = (0..rank).collect();
    perm.swap(rank - 2, rank - 1);
    operand.permute(&perm)
}

/// NumPy `matmul`: `(..., m, k) x (..., k, n)` with leading-batch
/// broadcast. Single-precision inputs accumulate in `f32`, everything else
/// in `f64`.
pub fn matmul(left: &HostTensor, right: &HostTensor) -> EvalResult<HostTensor> {
    if left.rank() < 2 || right.rank() < 2 {
        return Err(EvalError::execution(
            "matmul operands must have at least two axes",
        ));
    }
    let (m, ka) = (
        left.dims()[left.rank() - 2],
        left.dims()[left.rank() - 1],
    );
    let (kb, n) = (
        right.dims()[right.rank() - 2],
        right.dims()[right.rank() - 1],
    );
    if ka != kb {
        return Err(EvalError::execution(format!(
            "inner extents disagree: {:?} x {:?}",
            left.dims(),
            right.dims()
        )));
    }
    let batch = broadcast_shape(
        &left.dims()[..left.rank() - 2],
        &right.dims()[..right.rank() - 2],
    )?;
    let mut left_target = batch.clone();
    left_target.extend([m, ka]);
    let mut right_target = batch.clone();
    right_target.extend([kb, n]);
    let left = left.broadcast_to(&left_target)?;
    let right = right.broadcast_to(&right_target)?;
    let mut out_dims = batch.clone();
    out_dims.extend([m, n]);
    let batch_count: usize = batch.iter().product();

    let single = matches!(left.dtype(), DType::F16 | DType::F32)
        && matches!(right.dtype(), DType::F16 | DType::F32);
    if single {
        let a = left.f32_values()?;
        let b = right.f32_values()?;
        let out = matmul_values(&a, &b, batch_count, m, ka, n);
        HostTensor::from_f32(out_dims, out)
    } else {
        let a = left.f64_values();
        let b = right.f64_values();
        let out = matmul_values(&a, &b, batch_count, m, ka, n);
        HostTensor::from_f64(out_dims, out)
    }
}

fn matmul_values<T>(a: &[T], b: &[T], batch: usize, m: usize, k: usize, n: usize) -> Vec<T>
where
    T: Copy + Default + std::ops::Mul<Output = T> + std::ops::AddAssign,
{
    let mut out = vec![T::default(); batch * m * n];
    for bi in 0..batch {
        let a_base = bi * m * k;
        let b_base = bi * k * n;
        let o_base = bi * m * n;
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::default();
                for p in 0..k {
                    acc += a[a_base + i * k + p] * b[b_base + p * n + j];
                }
                out[o_base + i * n + j] = acc;
            }
        }
    }
    out
}

/// Resolved conv2d request.
#[derive(Debug, Clone)]
pub struct Conv2dSpec {
    /// left, right, top, bottom.
    pub pad: [usize; 4],
    pub stride: [usize; 2],
    pub dilation: [usize; 2],
    pub out_dtype: DType,
}

/// Direct sliding-window convolution: NHWC data, OHWI filter, `f32`
/// accumulation regardless of input precision.
pub fn eval_conv2d(
    data: &HostTensor,
    filter: &HostTensor,
    spec: &Conv2dSpec,
) -> EvalResult<HostTensor> {
    if data.rank() != 4 || filter.rank() != 4 {
        return Err(EvalError::execution(
            "conv2d expects NHWC data and OHWI filter",
        ));
    }
    let [n, h, w, c] = [data.dims()[0], data.dims()[1], data.dims()[2], data.dims()[3]];
    let [out_c, kh, kw, fc] = [
        filter.dims()[0],
        filter.dims()[1],
        filter.dims()[2],
        filter.dims()[3],
    ];
    if fc != c {
        return Err(EvalError::execution(format!(
            "filter channels {fc} disagree with data channels {c}"
        )));
    }
    let [p_l, p_r, p_t, p_b] = spec.pad;
    let [s_h, s_w] = spec.stride;
    let [d_h, d_w] = spec.dilation;
    if s_h == 0 || s_w == 0 {
        return Err(EvalError::execution("conv2d stride cannot be zero"));
    }
    let padded_h = h + p_t + p_b;
    let padded_w = w + p_l + p_r;
    if padded_h < kh || padded_w < kw {
        return Err(EvalError::execution("filter larger than padded input"));
    }
    let out_h = (padded_h - kh) / s_h + 1;
    let out_w = (padded_w - kw) / s_w + 1;

    let padded = data.pad(&[0, p_t, p_l, 0], &[0, p_b, p_r, 0], 0.0)?;
    let x = padded.cast(DType::F32);
    let x = x.as_f32_slice()?;
    let f = filter.cast(DType::F32);
    let f = f.as_f32_slice()?;
    let x_strides = compute_strides(&[n, padded_h, padded_w, c]);
    let f_strides = compute_strides(&[out_c, kh, kw, c]);

    let mut out = vec![0f32; n * out_h * out_w * out_c];
    let mut write = 0usize;
    for b in 0..n {
        for i in 0..out_h {
            for j in 0..out_w {
                for o in 0..out_c {
                    let mut acc = 0f32;
                    for ki in 0..kh {
                        let row = i * s_h + ki * d_h;
                        if row >= padded_h {
                            continue;
                        }
                        for kj in 0..kw {
                            let col = j * s_w + kj * d_w;
                            if col >= padded_w {
                                continue;
                            }
                            for ch in 0..c {
                                let xv = x[b * x_strides[0]
                                    + row * x_strides[1]
                                    + col * x_strides[2]
                                    + ch];
                                let fv = f[o * f_strides[0]
                                    + ki * f_strides[1]
                                    + kj * f_strides[2]
                                    + ch];
                                acc += xv * fv;
                            }
                        }
                    }
                    out[write] = acc;
                    write += 1;
                }
            }
        }
    }
    Ok(HostTensor::from_f32(vec![n, out_h, out_w, out_c], out)?.cast(spec.out_dtype))
}
