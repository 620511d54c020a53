mod common;

use common::{attr, desc, f32_tensor, node, values};
use oracle_core::{AttrValue, DType, EvalError, OperatorNode};
use oracle_ref_cpu::{evaluate, op_kind, EvalContext, HostTensor, OpKind};

#[test]
fn alias_names_collapse_onto_one_kind() {
    assert_eq!(op_kind("Add"), op_kind("TensorAdd"));
    assert_eq!(op_kind("Div"), op_kind("RealDiv"));
    assert_eq!(op_kind("Conv2D"), Some(OpKind::Conv2d));
    assert_eq!(op_kind("NoSuchOp"), None);
}

#[test]
fn unknown_kind_is_a_hard_failure() {
    let n = node(
        "NoSuchOp",
        vec![vec![desc("x", &[2], DType::F32)]],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2], &[1.0, 2.0]));
    let err = evaluate(&n, &mut ctx).expect_err("unknown kinds must not pass through");
    assert!(matches!(err, EvalError::UnsupportedOperator { kind } if kind == "NoSuchOp"));
}

#[test]
fn unbound_operand_is_reported_by_name() {
    let n = node(
        "Abs",
        vec![vec![desc("missing", &[2], DType::F32)]],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let err = evaluate(&n, &mut EvalContext::new()).expect_err("no binding for `missing`");
    assert!(matches!(err, EvalError::UnboundTensor { name } if name == "missing"));
}

#[test]
fn missing_required_attribute_is_named() {
    let n = node(
        "Concat",
        vec![vec![
            desc("a", &[1], DType::F32),
            desc("b", &[1], DType::F32),
        ]],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("a", f32_tensor(&[1], &[1.0]));
    ctx.bind("b", f32_tensor(&[1], &[2.0]));
    let err = evaluate(&n, &mut ctx).expect_err("concat needs an axis");
    assert!(matches!(err, EvalError::MissingAttribute { name } if name == "axis"));
}

#[test]
fn result_is_bound_under_the_output_name() {
    let n = node(
        "Add",
        vec![
            vec![desc("a", &[2], DType::F32)],
            vec![desc("b", &[2], DType::F32)],
        ],
        desc("sum", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("a", f32_tensor(&[2], &[1.0, 2.0]));
    ctx.bind("b", f32_tensor(&[2], &[10.0, 20.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![11.0, 22.0]);
    let bound = ctx.lookup("sum").unwrap_or_else(|| panic!("result not bound"));
    assert_eq!(values(bound), vec![11.0, 22.0]);
}

#[test]
fn inline_literal_value_wins_over_the_binding() {
    let n = node(
        "Mul",
        vec![
            vec![desc("x", &[2], DType::F32)],
            vec![desc("x", &[2], DType::F32).with_value(AttrValue::Float(3.0))],
        ],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2], &[1.0, 2.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![3.0, 6.0]);
}

#[test]
fn nodes_parse_from_their_json_form() {
    let json = r#"{
        "kind": "ReduceSum",
        "inputs": [[{"tensor_name": "x", "shape": [2, 3], "data_type": "float32"}]],
        "outputs": [{"tensor_name": "y", "shape": [2, 1], "data_type": "float32"}],
        "attrs": [
            {"name": "axis", "value": [1]},
            {"name": "keep_dims", "value": true}
        ]
    }"#;
    let n = OperatorNode::from_json_str(json).unwrap_or_else(|err| panic!("bad json: {err}"));
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1]);
    assert_eq!(values(&out), vec![6.0, 15.0]);
}

#[test]
fn reduction_conforms_to_the_declared_output_shape() {
    let n = node(
        "ReduceSum",
        vec![vec![desc("x", &[4], DType::F32)]],
        desc("y", &[1], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[4], &[1.0, 2.0, 3.0, 4.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[1]);
    assert_eq!(values(&out), vec![10.0]);
}

#[test]
fn zeros_like_matches_shape_and_output_dtype() {
    let n = node(
        "ZerosLike",
        vec![vec![desc("x", &[2, 2], DType::F32)]],
        desc("y", &[2, 2], DType::I32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2, 2], &[1.0, 2.0, 3.0, 4.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 2]);
    assert_eq!(out.dtype(), DType::I32);
    assert_eq!(values(&out), vec![0.0; 4]);
}

#[test]
fn reshape_reads_the_target_from_the_output_descriptor() {
    let n = node(
        "Reshape",
        vec![vec![desc("x", &[2, 3], DType::F32)]],
        desc("y", &[3, 2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[3, 2]);
}

#[test]
fn transpose_without_perm_reverses_the_axes() {
    let n = node(
        "Transpose",
        vec![vec![desc("x", &[2, 3], DType::F32)]],
        desc("y", &[3, 2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[3, 2]);
    assert_eq!(values(&out), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
}

#[test]
fn cast_follows_the_dst_type_attribute() {
    let n = node(
        "Cast",
        vec![vec![desc("x", &[2], DType::F32)]],
        desc("y", &[2], DType::I32),
        vec![attr("dst_type", AttrValue::Str("int32".to_string()))],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2], &[2.7, -2.7]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dtype(), DType::I32);
    assert_eq!(values(&out), vec![2.0, -2.0]);
}

#[test]
fn tile_and_broadcast_read_attribute_lists() {
    let tile = node(
        "Tile",
        vec![vec![desc("x", &[2], DType::F32)]],
        desc("y", &[4], DType::F32),
        vec![attr("multiples", AttrValue::IntList(vec![2]))],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2], &[1.0, 2.0]));
    let out = evaluate(&tile, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![1.0, 2.0, 1.0, 2.0]);

    let broadcast = node(
        "BroadcastTo",
        vec![vec![desc("x", &[2], DType::F32)]],
        desc("z", &[2, 2], DType::F32),
        vec![attr("shape", AttrValue::IntList(vec![2, 2]))],
    );
    let out =
        evaluate(&broadcast, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 2]);
    assert_eq!(values(&out), vec![1.0, 2.0, 1.0, 2.0]);
}

#[test]
fn assign_rebinds_the_target_name() {
    let n = node(
        "Assign",
        vec![
            vec![desc("target", &[2], DType::F32)],
            vec![desc("source", &[2], DType::F32)],
        ],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("target", f32_tensor(&[2], &[0.0, 0.0]));
    ctx.bind("source", f32_tensor(&[2], &[7.0, 8.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![7.0, 8.0]);
    let target = ctx.lookup("target").unwrap_or_else(|| panic!("target unbound"));
    assert_eq!(values(target), vec![7.0, 8.0]);
}

#[test]
fn inplace_assign_returns_the_third_operand() {
    let n = node(
        "InplaceAssign",
        vec![
            vec![desc("target", &[1], DType::F32)],
            vec![desc("source", &[1], DType::F32)],
            vec![desc("passthrough", &[2], DType::F32)],
        ],
        desc("y", &[2], DType::F32),
        vec![],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("source", f32_tensor(&[1], &[5.0]));
    ctx.bind("passthrough", f32_tensor(&[2], &[1.0, 2.0]));
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![1.0, 2.0]);
    let target = ctx.lookup("target").unwrap_or_else(|| panic!("target unbound"));
    assert_eq!(values(target), vec![5.0]);
}

#[test]
fn custom_dispatches_to_the_registered_closure() {
    let n = node(
        "Custom",
        vec![vec![desc("x", &[3], DType::F32)]],
        desc("y", &[3], DType::F32),
        vec![attr("func_name", AttrValue::Str("triple".to_string()))],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[3], &[1.0, 2.0, 3.0]));
    ctx.register_custom("triple", |args: &[HostTensor]| {
        let scaled: Vec<f32> = args[0].f32_values()?.iter().map(|v| v * 3.0).collect();
        HostTensor::from_f32(args[0].dims().to_vec(), scaled)
    });
    let out = evaluate(&n, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![3.0, 6.0, 9.0]);
}

#[test]
fn unregistered_custom_function_fails_by_name() {
    let n = node(
        "Custom",
        vec![vec![desc("x", &[1], DType::F32)]],
        desc("y", &[1], DType::F32),
        vec![attr("func_name", AttrValue::Str("absent".to_string()))],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[1], &[1.0]));
    let err = evaluate(&n, &mut ctx).expect_err("no such custom function");
    assert!(matches!(err, EvalError::UnknownCustomFunction { name } if name == "absent"));
}

#[test]
fn node_without_output_descriptor_is_an_error() {
    let n = OperatorNode {
        kind: "Abs".to_string(),
        inputs: vec![vec![desc("x", &[2], DType::F32)]],
        outputs: vec![],
        attrs: vec![],
    };
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2], &[1.0, -2.0]));
    let err = evaluate(&n, &mut ctx).expect_err("no output descriptor to evaluate into");
    assert!(matches!(err, EvalError::Execution(_)));
}

#[test]
fn consecutive_random_draws_differ_but_replay_across_contexts() {
    let first = node(
        "StandardNormal",
        vec![],
        desc("a", &[8], DType::F32),
        vec![attr("shape", AttrValue::IntList(vec![8]))],
    );
    let second = node(
        "StandardNormal",
        vec![],
        desc("b", &[8], DType::F32),
        vec![attr("shape", AttrValue::IntList(vec![8]))],
    );
    let mut ctx = EvalContext::with_seed(7);
    let a = evaluate(&first, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let b = evaluate(&second, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_ne!(values(&a), values(&b));

    let mut replay = EvalContext::with_seed(7);
    let a2 = evaluate(&first, &mut replay).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let b2 = evaluate(&second, &mut replay).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&a), values(&a2));
    assert_eq!(values(&b), values(&b2));
}

#[test]
fn standard_normal_is_reproducible_for_a_seed() {
    let n = node(
        "StandardNormal",
        vec![],
        desc("y", &[8], DType::F32),
        vec![attr("shape", AttrValue::IntList(vec![8]))],
    );
    let mut first = EvalContext::with_seed(7);
    let a = evaluate(&n, &mut first).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let mut second = EvalContext::with_seed(7);
    let b = evaluate(&n, &mut second).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(a.dims(), &[8]);
    assert_eq!(values(&a), values(&b));
}

#[test]
fn pad_and_unpad_round_trip() {
    let pad = node(
        "PadAkg",
        vec![vec![desc("x", &[2, 2], DType::F32)]],
        desc("padded", &[3, 4], DType::F32),
        vec![
            attr("head", AttrValue::IntList(vec![0, 1])),
            attr("tail", AttrValue::IntList(vec![1, 1])),
            attr("pad_val", AttrValue::Float(9.0)),
        ],
    );
    let mut ctx = EvalContext::new();
    ctx.bind("x", f32_tensor(&[2, 2], &[1.0, 2.0, 3.0, 4.0]));
    let padded = evaluate(&pad, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(padded.dims(), &[3, 4]);
    assert_eq!(
        values(&padded),
        vec![9.0, 1.0, 2.0, 9.0, 9.0, 3.0, 4.0, 9.0, 9.0, 9.0, 9.0, 9.0]
    );

    let unpad = node(
        "UnPadAkg",
        vec![vec![desc("padded", &[3, 4], DType::F32)]],
        desc("cropped", &[2, 3], DType::F32),
        vec![attr("tail", AttrValue::IntList(vec![1, 1]))],
    );
    let cropped =
        evaluate(&unpad, &mut ctx).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(cropped.dims(), &[2, 3]);
    assert_eq!(values(&cropped), vec![9.0, 1.0, 2.0, 9.0, 3.0, 4.0]);
}
