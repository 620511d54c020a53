//! Operator registry and dispatch.
//!
//! Every supported operator name maps to a typed [`OpKind`]; evaluation is
//! a single exhaustive match, so adding a variant forces a dispatch arm.
//! Unknown names are a hard failure, never a silent pass-through.

use oracle_core::{
    Attrs, DType, EvalError, EvalResult, OperatorNode, TensorDescriptor, TensorFormat,
};

use crate::context::EvalContext;
use crate::elementwise::{
    eval_binary, eval_compare, eval_select, eval_select_gt, eval_select_lt, eval_unary, BinaryOp,
    CompareOp, UnaryOp,
};
use crate::indexing::{
    eval_gather, eval_gather_nd, eval_one_hot, eval_tensor_scatter_add, eval_unsorted_segment_sum,
};
use crate::layout::eval_trans_data;
use crate::matmul::{eval_conv2d, eval_matmul, Conv2dSpec, MatmulSpec};
use crate::random::standard_normal;
use crate::reduce::{eval_elem_any, eval_reduce, eval_scan, ReduceKind, ScanKind};
use crate::shape_ops::{eval_add_n, eval_concat, eval_expand_dims};
use crate::slice::{eval_strided_slice, SliceSpec};
use crate::sparse::{
    eval_csr_elementwise, eval_csr_gather, eval_csr_reduce_sum, eval_csrmm, eval_csrmv,
};
use crate::tensor::HostTensor;

/// Typed operator identity resolved from a node's kind string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareOp),
    Reduce(ReduceKind),
    Scan(ScanKind),
    Select,
    SelectGt,
    SelectLt,
    ZerosLike,
    AddN,
    Concat,
    Reshape,
    ExpandDims,
    EquivFormat,
    Tile,
    BroadcastTo,
    Transpose,
    Cast,
    ElemAny,
    OneHot,
    StridedSlice,
    TransData,
    MatMul,
    BatchMatMul,
    Conv2d,
    PadAkg,
    UnPadAkg,
    Gather,
    GatherNd,
    TensorScatterAdd,
    UnsortedSegmentSum,
    CsrMv,
    CsrMm,
    CsrReduceSum,
    CsrMul,
    CsrDiv,
    CsrGather,
    StandardNormal,
    Assign,
    InplaceAssign,
    Custom,
}

/// Maps an operator name onto its typed kind. Alias names (`TensorAdd`,
/// `RealDiv`) collapse onto the shared implementation.
pub fn op_kind(name: &str) -> Option<OpKind> {
    use BinaryOp as B;
    use CompareOp as C;
    use UnaryOp as U;
    let kind = match name {
        "Sin" => OpKind::Unary(U::Sin),
        "Cos" => OpKind::Unary(U::Cos),
        "Asin" => OpKind::Unary(U::Asin),
        "ACos" => OpKind::Unary(U::Acos),
        "Asinh" => OpKind::Unary(U::Asinh),
        "Acosh" => OpKind::Unary(U::Acosh),
        "Tanh" => OpKind::Unary(U::Tanh),
        "Rsqrt" => OpKind::Unary(U::Rsqrt),
        "Sqrt" => OpKind::Unary(U::Sqrt),
        "Neg" => OpKind::Unary(U::Neg),
        "Floor" => OpKind::Unary(U::Floor),
        "Exp" => OpKind::Unary(U::Exp),
        "Expm1" => OpKind::Unary(U::Expm1),
        "Log" => OpKind::Unary(U::Log),
        "Reciprocal" => OpKind::Unary(U::Reciprocal),
        "Abs" => OpKind::Unary(U::Abs),
        "Sign" => OpKind::Unary(U::Sign),
        "Erf" => OpKind::Unary(U::Erf),
        "IsNan" => OpKind::Unary(U::IsNan),
        "IsInf" => OpKind::Unary(U::IsInf),
        "IsFinite" => OpKind::Unary(U::IsFinite),
        "LogicalNot" => OpKind::Unary(U::LogicalNot),
        "Add" | "TensorAdd" => OpKind::Binary(B::Add),
        "Sub" => OpKind::Binary(B::Sub),
        "Mul" => OpKind::Binary(B::Mul),
        "Div" | "RealDiv" => OpKind::Binary(B::Div),
        "FloorDiv" => OpKind::Binary(B::FloorDiv),
        "Mod" => OpKind::Binary(B::Mod),
        "FloorMod" => OpKind::Binary(B::FloorMod),
        "Pow" => OpKind::Binary(B::Pow),
        "Minimum" => OpKind::Binary(B::Minimum),
        "Maximum" => OpKind::Binary(B::Maximum),
        "Atan2" => OpKind::Binary(B::Atan2),
        "LogicalAnd" => OpKind::Binary(B::LogicalAnd),
        "LogicalOr" => OpKind::Binary(B::LogicalOr),
        "Equal" => OpKind::Compare(C::Equal),
        "NotEqual" => OpKind::Compare(C::NotEqual),
        "Less" => OpKind::Compare(C::Less),
        "LessEqual" => OpKind::Compare(C::LessEqual),
        "Greater" => OpKind::Compare(C::Greater),
        "GreaterEqual" => OpKind::Compare(C::GreaterEqual),
        "ReduceSum" => OpKind::Reduce(ReduceKind::Sum),
        "ReduceMax" => OpKind::Reduce(ReduceKind::Max),
        "ReduceMin" => OpKind::Reduce(ReduceKind::Min),
        "ReduceProd" => OpKind::Reduce(ReduceKind::Prod),
        "CumSum" => OpKind::Scan(ScanKind::Sum),
        "CumProd" => OpKind::Scan(ScanKind::Prod),
        "Select" => OpKind::Select,
        "SelectGT" => OpKind::SelectGt,
        "SelectLT" => OpKind::SelectLt,
        "ZerosLike" => OpKind::ZerosLike,
        "AddN" => OpKind::AddN,
        "Concat" => OpKind::Concat,
        "Reshape" => OpKind::Reshape,
        "ExpandDims" => OpKind::ExpandDims,
        "EquivFormat" => OpKind::EquivFormat,
        "Tile" => OpKind::Tile,
        "BroadcastTo" => OpKind::BroadcastTo,
        "Transpose" => OpKind::Transpose,
        "Cast" => OpKind::Cast,
        "ElemAny" => OpKind::ElemAny,
        "OneHot" => OpKind::OneHot,
        "StridedSlice" => OpKind::StridedSlice,
        "TransData" => OpKind::TransData,
        "MatMul" => OpKind::MatMul,
        "BatchMatMul" => OpKind::BatchMatMul,
        "Conv2D" => OpKind::Conv2d,
        "PadAkg" => OpKind::PadAkg,
        "UnPadAkg" => OpKind::UnPadAkg,
        "Gather" => OpKind::Gather,
        "GatherNd" => OpKind::GatherNd,
        "TensorScatterAdd" => OpKind::TensorScatterAdd,
        "UnsortedSegmentSum" => OpKind::UnsortedSegmentSum,
        "CSRMV" => OpKind::CsrMv,
        "CSRMM" => OpKind::CsrMm,
        "CSRReduceSum" => OpKind::CsrReduceSum,
        "CSRMul" => OpKind::CsrMul,
        "CSRDiv" => OpKind::CsrDiv,
        "CSRGather" => OpKind::CsrGather,
        "StandardNormal" => OpKind::StandardNormal,
        "Assign" => OpKind::Assign,
        "InplaceAssign" => OpKind::InplaceAssign,
        "Custom" => OpKind::Custom,
        _ => return None,
    };
    Some(kind)
}

/// Evaluates one node against the context's bindings. The result is bound
/// under the output tensor's name before it is returned, so later nodes of
/// the same graph can refer to it.
pub fn evaluate(node: &OperatorNode, ctx: &mut EvalContext) -> EvalResult<HostTensor> {
    let kind = op_kind(&node.kind).ok_or_else(|| EvalError::UnsupportedOperator {
        kind: node.kind.clone(),
    })?;
    tracing::debug!(kind = %node.kind, "evaluating operator");
    let result = dispatch(kind, node, ctx)?;
    ctx.bind(node.output()?.tensor_name.clone(), result.clone());
    Ok(result)
}

fn operand(node: &OperatorNode, slot: usize) -> EvalResult<&TensorDescriptor> {
    node.inputs
        .get(slot)
        .and_then(|descs| descs.first())
        .ok_or_else(|| {
            EvalError::execution(format!("operator `{}` is missing operand {slot}", node.kind))
        })
}

fn resolve(node: &OperatorNode, ctx: &EvalContext, slot: usize) -> EvalResult<HostTensor> {
    ctx.resolve(operand(node, slot)?)
}

/// Multi-tensor operators carry every operand in the first slot.
fn multi_slot(node: &OperatorNode) -> EvalResult<&[TensorDescriptor]> {
    node.inputs
        .first()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            EvalError::execution(format!("operator `{}` has no operand slot", node.kind))
        })
}

fn usize_list(values: &[i64], what: &str) -> EvalResult<Vec<usize>> {
    values
        .iter()
        .map(|&v| {
            usize::try_from(v)
                .map_err(|_| EvalError::execution(format!("negative entry {v} in {what}")))
        })
        .collect()
}

fn dispatch(kind: OpKind, node: &OperatorNode, ctx: &mut EvalContext) -> EvalResult<HostTensor> {
    let attrs = node.attrs();
    let out = node.output()?;
    let out_dtype = out.data_type;
    match kind {
        OpKind::Unary(op) => eval_unary(op, &resolve(node, ctx, 0)?, out_dtype),
        OpKind::Binary(op) => eval_binary(
            op,
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            out_dtype,
        ),
        OpKind::Compare(op) => eval_compare(
            op,
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            out_dtype,
        ),
        OpKind::Reduce(op) => {
            let input = resolve(node, ctx, 0)?;
            let axes = attrs.axis_list("axis").filter(|list| !list.is_empty());
            let keep_dims = attrs.bool_or("keep_dims", false);
            let reduced = eval_reduce(op, &input, axes.as_deref(), keep_dims, out_dtype)?;
            conform_shape(reduced, out)
        }
        OpKind::Scan(op) => {
            let input = resolve(node, ctx, 0)?;
            let axis = attrs.require_int("axis")?;
            let exclusive = attrs.bool_or("exclusive", false);
            let reverse = attrs.bool_or("reverse", false);
            eval_scan(op, &input, axis, exclusive, reverse, out_dtype)
        }
        OpKind::Select => eval_select(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            out_dtype,
        ),
        OpKind::SelectGt => eval_select_gt(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &resolve(node, ctx, 3)?,
            out_dtype,
        ),
        OpKind::SelectLt => eval_select_lt(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &resolve(node, ctx, 3)?,
            out_dtype,
        ),
        OpKind::ZerosLike => {
            let input = resolve(node, ctx, 0)?;
            Ok(HostTensor::zeros(out_dtype, input.dims().to_vec()))
        }
        OpKind::AddN => {
            let operands = ctx.resolve_all(multi_slot(node)?)?;
            eval_add_n(&operands, out_dtype)
        }
        OpKind::Concat => {
            let operands = ctx.resolve_all(multi_slot(node)?)?;
            eval_concat(&operands, attrs.require_int("axis")?)
        }
        OpKind::Reshape => resolve(node, ctx, 0)?.reshaped(out.shape.clone()),
        OpKind::ExpandDims => {
            eval_expand_dims(&resolve(node, ctx, 0)?, attrs.require_int("axis")?)
        }
        OpKind::EquivFormat => Ok(resolve(node, ctx, 0)?),
        OpKind::Tile => {
            let multiples = usize_list(&attrs.require_int_list("multiples")?, "multiples")?;
            resolve(node, ctx, 0)?.tile(&multiples)
        }
        OpKind::BroadcastTo => {
            let shape = usize_list(&attrs.require_int_list("shape")?, "shape")?;
            resolve(node, ctx, 0)?.broadcast_to(&shape)
        }
        OpKind::Transpose => {
            let input = resolve(node, ctx, 0)?;
            let perm = match attrs.get("perm").and_then(|v| v.as_int_list()) {
                Some(perm) if !perm.is_empty() => usize_list(&perm, "perm")?,
                // Like the reference, a missing perm reverses the axes.
                _ => (0..input.rank()).rev().collect(),
            };
            input.permute(&perm)
        }
        OpKind::Cast => {
            let name = attrs.require_str("dst_type")?;
            let dst = DType::parse(name).ok_or_else(|| EvalError::AttributeType {
                name: "dst_type".to_string(),
                expected: "dtype name",
            })?;
            Ok(resolve(node, ctx, 0)?.cast(dst))
        }
        OpKind::ElemAny => eval_elem_any(&resolve(node, ctx, 0)?, out_dtype),
        OpKind::OneHot => {
            let depth = attrs.require_int("depth")?;
            let depth = usize::try_from(depth)
                .map_err(|_| EvalError::execution(format!("negative depth {depth}")))?;
            eval_one_hot(
                &resolve(node, ctx, 0)?,
                attrs.require_int("axis")?,
                depth,
                &resolve(node, ctx, 1)?,
                &resolve(node, ctx, 2)?,
                out_dtype,
            )
        }
        OpKind::StridedSlice => {
            let spec = SliceSpec {
                begin: attrs.require_int_list("begin")?,
                end: attrs.require_int_list("end")?,
                strides: attrs.require_int_list("strides")?,
                begin_mask: attrs.int_or("begin_mask", 0),
                end_mask: attrs.int_or("end_mask", 0),
                ellipsis_mask: attrs.int_or("ellipsis_mask", 0),
                new_axis_mask: attrs.int_or("new_axis_mask", 0),
                shrink_axis_mask: attrs.int_or("shrink_axis_mask", 0),
            };
            eval_strided_slice(&resolve(node, ctx, 0)?, &spec)
        }
        OpKind::TransData => {
            let src = parse_format(attrs.require_str("src_format")?)?;
            let dst = parse_format(attrs.require_str("dst_format")?)?;
            eval_trans_data(&resolve(node, ctx, 0)?, src, dst, &out.shape)
        }
        OpKind::MatMul | OpKind::BatchMatMul => {
            let spec = MatmulSpec {
                left_format: operand_format(&attrs, "left_format", operand(node, 0)?),
                right_format: operand_format(&attrs, "right_format", operand(node, 1)?),
                transpose_a: attrs.bool_or("transpose_a", false),
                transpose_b: attrs.bool_or("transpose_b", false),
                out_format: out.format,
                out_dtype,
            };
            let left = resolve(node, ctx, 0)?;
            let right = resolve(node, ctx, 1)?;
            let bias = match node.inputs.get(2).and_then(|slot| slot.first()) {
                Some(desc) => Some(ctx.resolve(desc)?),
                None => None,
            };
            eval_matmul(&left, &right, bias.as_ref(), &spec, ctx.next_seed())
        }
        OpKind::Conv2d => {
            let pad = usize_list(&attrs.require_int_list("pad_list")?, "pad_list")?;
            let stride = usize_list(&attrs.require_int_list("stride")?, "stride")?;
            let dilation = usize_list(&attrs.require_int_list("dilation")?, "dilation")?;
            let spec = Conv2dSpec {
                pad: four(&pad, "pad_list")?,
                stride: trailing_two(&stride, "stride")?,
                dilation: trailing_two(&dilation, "dilation")?,
                out_dtype,
            };
            eval_conv2d(&resolve(node, ctx, 0)?, &resolve(node, ctx, 1)?, &spec)
        }
        OpKind::PadAkg => {
            let head = usize_list(&attrs.require_int_list("head")?, "head")?;
            let tail = usize_list(&attrs.require_int_list("tail")?, "tail")?;
            let value = attrs.float_or("pad_val", 0.0);
            resolve(node, ctx, 0)?.pad(&head, &tail, value)
        }
        OpKind::UnPadAkg => {
            let input = resolve(node, ctx, 0)?;
            let tail = usize_list(&attrs.require_int_list("tail")?, "tail")?;
            if tail.len() > input.rank() {
                return Err(EvalError::execution(
                    "unpad widths exceed the tensor rank",
                ));
            }
            let offset = input.rank() - tail.len();
            let target: Vec<usize> = input
                .dims()
                .iter()
                .enumerate()
                .map(|(axis, &d)| {
                    if axis < offset {
                        d
                    } else {
                        d.saturating_sub(tail[axis - offset])
                    }
                })
                .collect();
            input.crop_to(&target)
        }
        OpKind::Gather => eval_gather(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            attrs.require_int("axis")?,
        ),
        OpKind::GatherNd => {
            eval_gather_nd(&resolve(node, ctx, 0)?, &resolve(node, ctx, 1)?)
        }
        OpKind::TensorScatterAdd => eval_tensor_scatter_add(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
        ),
        OpKind::UnsortedSegmentSum => {
            let num = attrs.require_int("num_segments")?;
            let num = usize::try_from(num)
                .map_err(|_| EvalError::execution(format!("negative num_segments {num}")))?;
            eval_unsorted_segment_sum(&resolve(node, ctx, 0)?, &resolve(node, ctx, 1)?, num)
        }
        OpKind::CsrMv => eval_csrmv(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &resolve(node, ctx, 3)?,
            &attrs.require_int_list("dense_shape")?,
            out_dtype,
        ),
        OpKind::CsrMm => eval_csrmm(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &resolve(node, ctx, 3)?,
            &attrs.require_int_list("dense_shape")?,
            out_dtype,
        ),
        OpKind::CsrReduceSum => eval_csr_reduce_sum(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &attrs.require_int_list("dense_shape")?,
            attrs.require_int("axis")?,
            out_dtype,
        ),
        OpKind::CsrMul | OpKind::CsrDiv => eval_csr_elementwise(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &resolve(node, ctx, 3)?,
            &attrs.require_int_list("dense_shape")?,
            kind == OpKind::CsrDiv,
            out_dtype,
        ),
        OpKind::CsrGather => eval_csr_gather(
            &resolve(node, ctx, 0)?,
            &resolve(node, ctx, 1)?,
            &resolve(node, ctx, 2)?,
            &attrs.require_int_list("dense_shape")?,
            out_dtype,
        ),
        OpKind::StandardNormal => {
            let shape = usize_list(&attrs.require_int_list("shape")?, "shape")?;
            standard_normal(shape, out_dtype, ctx.next_seed())
        }
        OpKind::Assign => {
            let target = operand(node, 0)?.tensor_name.clone();
            let value = resolve(node, ctx, 1)?;
            ctx.bind(target, value.clone());
            Ok(value)
        }
        OpKind::InplaceAssign => {
            let target = operand(node, 0)?.tensor_name.clone();
            let value = resolve(node, ctx, 1)?;
            ctx.bind(target, value);
            resolve(node, ctx, 2)
        }
        OpKind::Custom => {
            let func_name = attrs.require_str("func_name")?;
            let func = ctx.custom(func_name)?;
            let mut args = Vec::with_capacity(node.inputs.len());
            for slot in &node.inputs {
                let desc = slot.first().ok_or_else(|| {
                    EvalError::execution("custom operator has an empty operand slot")
                })?;
                args.push(ctx.resolve(desc)?);
            }
            func(&args)
        }
    }
}

/// Reduction results are reported in the declared output shape when the
/// element counts agree (the description may spell a full reduction as
/// `[1]` while the kernel produces a scalar).
fn conform_shape(tensor: HostTensor, out: &TensorDescriptor) -> EvalResult<HostTensor> {
    let declared: usize = out.shape.iter().product();
    if declared == tensor.len() && out.shape != tensor.dims() {
        return tensor.reshaped(out.shape.clone());
    }
    Ok(tensor)
}

fn four(values: &[usize], what: &str) -> EvalResult<[usize; 4]> {
    <[usize; 4]>::try_from(values)
        .map_err(|_| EvalError::execution(format!("{what} must carry four entries")))
}

/// `stride`/`dilation` arrive as 4-vectors over NCHW axes; only the
/// trailing spatial pair matters.
fn trailing_two(values: &[usize], what: &str) -> EvalResult<[usize; 2]> {
    if values.len() < 2 {
        return Err(EvalError::execution(format!(
            "{what} must carry at least two entries"
        )));
    }
    Ok([values[values.len() - 2], values[values.len() - 1]])
}

fn parse_format(name: &str) -> EvalResult<TensorFormat> {
    TensorFormat::parse(name).ok_or_else(|| EvalError::AttributeType {
        name: "format".to_string(),
        expected: "tensor format name",
    })
}

/// Operand formats fall back from the op-specific attribute to
/// `pri_format`, then to the descriptor's own format.
fn operand_format(attrs: &Attrs<'_>, name: &str, desc: &TensorDescriptor) -> TensorFormat {
    attrs
        .probe(name)
        .and_then(|v| v.as_str())
        .or_else(|| attrs.probe("pri_format").and_then(|v| v.as_str()))
        .and_then(TensorFormat::parse)
        .unwrap_or(desc.format)
}
