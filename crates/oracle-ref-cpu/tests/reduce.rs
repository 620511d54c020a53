mod common;

use common::{f32_tensor, i32_tensor, values};
use half::f16;
use oracle_core::DType;
use oracle_ref_cpu::reduce::{
    eval_elem_any, eval_reduce, eval_scan, ReduceKind, ScanKind,
};
use oracle_ref_cpu::HostTensor;

#[test]
fn reduce_sum_over_one_axis() {
    let input = f32_tensor(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
    let out = eval_reduce(ReduceKind::Sum, &input, Some(&[0]), false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2]);
    assert_eq!(values(&out), vec![4.0, 6.0]);
}

#[test]
fn reduce_max_keep_dims_keeps_unit_axis() {
    let input = f32_tensor(&[2, 3], &[1.0, 5.0, 2.0, 4.0, 0.0, 3.0]);
    let out = eval_reduce(ReduceKind::Max, &input, Some(&[1]), true, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1]);
    assert_eq!(values(&out), vec![5.0, 4.0]);
}

#[test]
fn reduce_without_axes_collapses_everything() {
    let input = i32_tensor(&[2, 2], &[1, 2, 3, 4]);
    let out = eval_reduce(ReduceKind::Prod, &input, None, false, DType::I32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[] as &[usize]);
    assert_eq!(values(&out), vec![24.0]);
}

#[test]
fn half_inputs_accumulate_in_single_precision() {
    // 1024 + 0.25 + 0.25 stays 1024 under stepwise f16 rounding; the f32
    // accumulator preserves the 0.5, visible through an f32 output.
    let input = HostTensor::from_f16(
        vec![3],
        vec![
            f16::from_f32(1024.0),
            f16::from_f32(0.25),
            f16::from_f32(0.25),
        ],
    )
    .unwrap_or_else(|err| panic!("bad tensor literal: {err}"));
    let out = eval_reduce(ReduceKind::Sum, &input, None, false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![1024.5]);
}

#[test]
fn cumsum_exclusive_shifts_in_a_zero() {
    let input = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    let out = eval_scan(ScanKind::Sum, &input, 0, true, false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![0.0, 1.0, 3.0]);
}

#[test]
fn cumsum_reverse_runs_from_the_tail() {
    let input = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    let out = eval_scan(ScanKind::Sum, &input, 0, false, true, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![6.0, 5.0, 3.0]);
}

#[test]
fn cumsum_exclusive_reverse_combines_both() {
    let input = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    let out = eval_scan(ScanKind::Sum, &input, 0, true, true, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![5.0, 3.0, 0.0]);
}

#[test]
fn cumprod_exclusive_seeds_one() {
    let input = f32_tensor(&[3], &[2.0, 3.0, 4.0]);
    let out = eval_scan(ScanKind::Prod, &input, 0, true, false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![1.0, 2.0, 6.0]);
}

#[test]
fn cumsum_respects_the_axis() {
    let input = f32_tensor(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
    let out = eval_scan(ScanKind::Sum, &input, 1, false, false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&out), vec![1.0, 3.0, 3.0, 7.0]);
}

#[test]
fn elem_any_is_on_only_when_all_elements_are_nonzero() {
    let all_on = f32_tensor(&[2], &[1.0, 2.0]);
    let has_zero = f32_tensor(&[2], &[1.0, 0.0]);
    let on = eval_elem_any(&all_on, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let off = eval_elem_any(&has_zero, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(on.dims(), &[1]);
    assert_eq!(values(&on), vec![1.0]);
    assert_eq!(values(&off), vec![0.0]);
}

#[test]
fn out_of_range_axis_is_an_error() {
    let input = f32_tensor(&[2], &[1.0, 2.0]);
    eval_reduce(ReduceKind::Sum, &input, Some(&[2]), false, DType::F32)
        .expect_err("axis beyond rank should fail");
}
