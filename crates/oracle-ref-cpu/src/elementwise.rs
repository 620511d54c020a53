//! Elementwise unary/binary/compare kernels with NumPy-style broadcasting.
//!
//! Numeric policy: half and single inputs compute in `f32`, everything else
//! in `f64`, except the integer-sensitive binary ops which stay in `i64`
//! when both operands are integral. Results are cast into the declared
//! output dtype as the final step.

use oracle_core::{DType, EvalError, EvalResult};

use crate::tensor::HostTensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Sin,
    Cos,
    Asin,
    Acos,
    Asinh,
    Acosh,
    Tanh,
    Rsqrt,
    Sqrt,
    Neg,
    Floor,
    Exp,
    Expm1,
    Log,
    Reciprocal,
    Abs,
    Sign,
    Erf,
    IsNan,
    IsInf,
    IsFinite,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    FloorMod,
    Pow,
    Minimum,
    Maximum,
    Atan2,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// NumPy broadcast of two shapes (right-aligned, size-1 axes stretch).
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> EvalResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![1usize; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return Err(EvalError::execution(format!(
                "shapes {a:?} and {b:?} are not broadcast-compatible"
            )));
        };
    }
    Ok(out)
}

fn broadcast_pair(lhs: &HostTensor, rhs: &HostTensor) -> EvalResult<(HostTensor, HostTensor)> {
    let shape = broadcast_shape(lhs.dims(), rhs.dims())?;
    Ok((lhs.broadcast_to(&shape)?, rhs.broadcast_to(&shape)?))
}

/// Rebuilds a tensor from widened `f64` values in the requested dtype
/// (astype narrowing rules apply).
fn from_wide(dims: Vec<usize>, values: Vec<f64>, dtype: DType) -> EvalResult<HostTensor> {
    Ok(HostTensor::from_f64(dims, values)?.cast(dtype))
}

fn from_wide_f32(dims: Vec<usize>, values: Vec<f32>, dtype: DType) -> EvalResult<HostTensor> {
    Ok(HostTensor::from_f32(dims, values)?.cast(dtype))
}

fn is_single_precision(dtype: DType) -> bool {
    matches!(dtype, DType::F16 | DType::F32)
}

fn is_integral(dtype: DType) -> bool {
    matches!(dtype, DType::Bool | DType::I32 | DType::I64)
}

pub fn eval_unary(op: UnaryOp, input: &HostTensor, out_dtype: DType) -> EvalResult<HostTensor> {
    let dims = input.dims().to_vec();
    match op {
        UnaryOp::IsNan | UnaryOp::IsInf | UnaryOp::IsFinite | UnaryOp::LogicalNot => {
            let wide = input.f64_values();
            let flags: Vec<bool> = wide
                .iter()
                .map(|&x| match op {
                    UnaryOp::IsNan => x.is_nan(),
                    UnaryOp::IsInf => x.is_infinite(),
                    UnaryOp::IsFinite => x.is_finite(),
                    _ => x == 0.0,
                })
                .collect();
            Ok(HostTensor::from_bool(dims, flags)?.cast(out_dtype))
        }
        UnaryOp::Neg | UnaryOp::Abs | UnaryOp::Sign if is_integral(input.dtype()) => {
            let values = input.cast(DType::I64).index_values()?;
            let out: Vec<i64> = values
                .iter()
                .map(|&x| match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Abs => x.abs(),
                    _ => x.signum(),
                })
                .collect();
            Ok(HostTensor::from_i64(dims, out)?.cast(out_dtype))
        }
        _ if is_single_precision(input.dtype()) => {
            let values = input.f32_values()?;
            let out: Vec<f32> = values.iter().map(|&x| unary_f32(op, x)).collect();
            from_wide_f32(dims, out, out_dtype)
        }
        _ => {
            let values = input.f64_values();
            let out: Vec<f64> = values.iter().map(|&x| unary_f64(op, x)).collect();
            from_wide(dims, out, out_dtype)
        }
    }
}

fn unary_f32(op: UnaryOp, x: f32) -> f32 {
    match op {
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Asin => x.asin(),
        UnaryOp::Acos => x.acos(),
        UnaryOp::Asinh => x.asinh(),
        UnaryOp::Acosh => x.acosh(),
        UnaryOp::Tanh => x.tanh(),
        UnaryOp::Rsqrt => x.sqrt().recip(),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Neg => -x,
        UnaryOp::Floor => x.floor(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Expm1 => x.exp_m1(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Reciprocal => x.recip(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Sign => {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                x
            }
        }
        UnaryOp::Erf => libm::erff(x),
        UnaryOp::IsNan | UnaryOp::IsInf | UnaryOp::IsFinite | UnaryOp::LogicalNot => {
            unreachable!("predicates take the bool path")
        }
    }
}

fn unary_f64(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Asin => x.asin(),
        UnaryOp::Acos => x.acos(),
        UnaryOp::Asinh => x.asinh(),
        UnaryOp::Acosh => x.acosh(),
        UnaryOp::Tanh => x.tanh(),
        UnaryOp::Rsqrt => x.sqrt().recip(),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Neg => -x,
        UnaryOp::Floor => x.floor(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Expm1 => x.exp_m1(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Reciprocal => x.recip(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Sign => {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                x
            }
        }
        UnaryOp::Erf => libm::erf(x),
        UnaryOp::IsNan | UnaryOp::IsInf | UnaryOp::IsFinite | UnaryOp::LogicalNot => {
            unreachable!("predicates take the bool path")
        }
    }
}

pub fn eval_binary(
    op: BinaryOp,
    lhs: &HostTensor,
    rhs: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let (lhs, rhs) = broadcast_pair(lhs, rhs)?;
    let dims = lhs.dims().to_vec();
    match op {
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            let a = lhs.f64_values();
            let b = rhs.f64_values();
            let flags: Vec<bool> = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| match op {
                    BinaryOp::LogicalAnd => x != 0.0 && y != 0.0,
                    _ => x != 0.0 || y != 0.0,
                })
                .collect();
            Ok(HostTensor::from_bool(dims, flags)?.cast(out_dtype))
        }
        _ if integer_binary(op) && is_integral(lhs.dtype()) && is_integral(rhs.dtype()) => {
            let a = lhs.cast(DType::I64).index_values()?;
            let b = rhs.cast(DType::I64).index_values()?;
            let out: Vec<i64> = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| binary_i64(op, x, y))
                .collect();
            Ok(HostTensor::from_i64(dims, out)?.cast(out_dtype))
        }
        _ if is_single_precision(lhs.dtype()) && is_single_precision(rhs.dtype()) => {
            let a = lhs.f32_values()?;
            let b = rhs.f32_values()?;
            let out: Vec<f32> = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| binary_f32(op, x, y))
                .collect();
            from_wide_f32(dims, out, out_dtype)
        }
        _ => {
            let a = lhs.f64_values();
            let b = rhs.f64_values();
            let out: Vec<f64> = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| binary_f64(op, x, y))
                .collect();
            from_wide(dims, out, out_dtype)
        }
    }
}

/// Ops whose integer semantics differ from the float formulas and must not
/// round-trip through floating point.
fn integer_binary(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::FloorDiv
            | BinaryOp::Mod
            | BinaryOp::FloorMod
            | BinaryOp::Minimum
            | BinaryOp::Maximum
    )
}

fn binary_i64(op: BinaryOp, x: i64, y: i64) -> i64 {
    match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        // Integer division by zero yields zero, matching the reference
        // oracle's tolerant behavior.
        BinaryOp::FloorDiv => {
            if y == 0 {
                0
            } else {
                let q = x / y;
                if x % y != 0 && (x < 0) != (y < 0) {
                    q - 1
                } else {
                    q
                }
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                0
            } else {
                x % y
            }
        }
        BinaryOp::FloorMod => {
            if y == 0 {
                0
            } else {
                ((x % y) + y) % y
            }
        }
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
        _ => unreachable!("float-only op routed to integer path"),
    }
}

fn binary_f32(op: BinaryOp, x: f32, y: f32) -> f32 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => x % y,
        BinaryOp::FloorMod => x - (x / y).floor() * y,
        BinaryOp::Pow => x.powf(y),
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
        BinaryOp::Atan2 => x.atan2(y),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            unreachable!("logical ops take the bool path")
        }
    }
}

fn binary_f64(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => x % y,
        BinaryOp::FloorMod => x - (x / y).floor() * y,
        BinaryOp::Pow => x.powf(y),
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
        BinaryOp::Atan2 => x.atan2(y),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            unreachable!("logical ops take the bool path")
        }
    }
}

pub fn eval_compare(
    op: CompareOp,
    lhs: &HostTensor,
    rhs: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let (lhs, rhs) = broadcast_pair(lhs, rhs)?;
    let dims = lhs.dims().to_vec();
    let flags: Vec<bool> = if is_integral(lhs.dtype()) && is_integral(rhs.dtype()) {
        let a = lhs.cast(DType::I64).index_values()?;
        let b = rhs.cast(DType::I64).index_values()?;
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| compare_ord(op, x.cmp(&y), x == y))
            .collect()
    } else {
        let a = lhs.f64_values();
        let b = rhs.f64_values();
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| match op {
                CompareOp::Equal => x == y,
                CompareOp::NotEqual => x != y,
                CompareOp::Less => x < y,
                CompareOp::LessEqual => x <= y,
                CompareOp::Greater => x > y,
                CompareOp::GreaterEqual => x >= y,
            })
            .collect()
    };
    Ok(HostTensor::from_bool(dims, flags)?.cast(out_dtype))
}

fn compare_ord(op: CompareOp, ord: std::cmp::Ordering, eq: bool) -> bool {
    use std::cmp::Ordering::*;
    match op {
        CompareOp::Equal => eq,
        CompareOp::NotEqual => !eq,
        CompareOp::Less => ord == Less,
        CompareOp::LessEqual => ord != Greater,
        CompareOp::Greater => ord == Greater,
        CompareOp::GreaterEqual => ord != Less,
    }
}

/// `where(cond, on_true, on_false)` with all three operands broadcast to a
/// common shape. Branches of the same storage class select natively; mixed
/// branches go through the wide path and narrow into the declared dtype.
pub fn eval_select(
    cond: &HostTensor,
    on_true: &HostTensor,
    on_false: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let shape = broadcast_shape(
        &broadcast_shape(cond.dims(), on_true.dims())?,
        on_false.dims(),
    )?;
    let cond = cond.broadcast_to(&shape)?;
    let on_true = on_true.broadcast_to(&shape)?;
    let on_false = on_false.broadcast_to(&shape)?;
    let mask: Vec<bool> = cond.f64_values().iter().map(|&x| x != 0.0).collect();
    select_masked(&mask, &on_true, &on_false, out_dtype)
}

/// `where(lhs > rhs, on_true, on_false)`.
pub fn eval_select_gt(
    lhs: &HostTensor,
    rhs: &HostTensor,
    on_true: &HostTensor,
    on_false: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let cond = eval_compare(CompareOp::Greater, lhs, rhs, DType::Bool)?;
    eval_select(&cond, on_true, on_false, out_dtype)
}

/// `where(lhs < rhs, on_true, on_false)`.
pub fn eval_select_lt(
    lhs: &HostTensor,
    rhs: &HostTensor,
    on_true: &HostTensor,
    on_false: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let cond = eval_compare(CompareOp::Less, lhs, rhs, DType::Bool)?;
    eval_select(&cond, on_true, on_false, out_dtype)
}

fn select_masked(
    mask: &[bool],
    on_true: &HostTensor,
    on_false: &HostTensor,
    out_dtype: DType,
) -> EvalResult<HostTensor> {
    let dims = on_true.dims().to_vec();
    if on_true.dtype() == DType::I64 && on_false.dtype() == DType::I64 {
        let a = on_true.index_values()?;
        let b = on_false.index_values()?;
        let out: Vec<i64> = mask
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(&m, (&x, &y))| if m { x } else { y })
            .collect();
        return Ok(HostTensor::from_i64(dims, out)?.cast(out_dtype));
    }
    let a = on_true.f64_values();
    let b = on_false.f64_values();
    let out: Vec<f64> = mask
        .iter()
        .zip(a.iter().zip(b.iter()))
        .map(|(&m, (&x, &y))| if m { x } else { y })
        .collect();
    from_wide(dims, out, out_dtype)
}
