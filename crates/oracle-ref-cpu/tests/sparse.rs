mod common;

use common::{f32_tensor, i32_tensor, values};
use oracle_core::DType;
use oracle_ref_cpu::matmul::matmul;
use oracle_ref_cpu::sparse::{
    eval_csr_elementwise, eval_csr_gather, eval_csr_reduce_sum, eval_csrmm, eval_csrmv,
};
use oracle_ref_cpu::HostTensor;

// Pattern for the 2x3 matrix [[1, 0, 2], [0, 3, 0]].
fn pattern() -> (HostTensor, HostTensor, HostTensor) {
    let indptr = i32_tensor(&[3], &[0, 2, 3]);
    let indices = i32_tensor(&[3], &[0, 2, 1]);
    let data = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    (indptr, indices, data)
}

#[test]
fn csrmv_multiplies_a_dense_vector() {
    let (indptr, indices, data) = pattern();
    let weight = f32_tensor(&[3, 1], &[1.0, 2.0, 3.0]);
    let out = eval_csrmv(&indptr, &indices, &data, &weight, &[2, 3], DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1]);
    assert_eq!(values(&out), vec![7.0, 6.0]);
}

#[test]
fn csrmm_matches_the_dense_product() {
    let (indptr, indices, data) = pattern();
    let weight = f32_tensor(&[3, 2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let out = eval_csrmm(&indptr, &indices, &data, &weight, &[2, 3], DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));

    let dense = f32_tensor(&[2, 3], &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
    let expected = matmul(&dense, &weight).unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(values(&out), values(&expected));
}

#[test]
fn reduce_sum_over_columns_yields_row_totals() {
    let (indptr, indices, data) = pattern();
    let out = eval_csr_reduce_sum(&indptr, &indices, &data, &[2, 3], 1, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1]);
    assert_eq!(values(&out), vec![3.0, 3.0]);
}

#[test]
fn reduce_sum_over_rows_yields_column_totals() {
    let (indptr, indices, data) = pattern();
    let out = eval_csr_reduce_sum(&indptr, &indices, &data, &[2, 3], 0, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[1, 3]);
    assert_eq!(values(&out), vec![1.0, 3.0, 2.0]);
}

#[test]
fn reduce_sum_accepts_a_negative_axis() {
    let (indptr, indices, data) = pattern();
    let out = eval_csr_reduce_sum(&indptr, &indices, &data, &[2, 3], -1, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1]);
    assert_eq!(values(&out), vec![3.0, 3.0]);
}

#[test]
fn mul_and_div_evaluate_only_at_stored_coordinates() {
    let (indptr, indices, data) = pattern();
    let dense = f32_tensor(&[2, 3], &[1.0, 2.0, 4.0, 8.0, 16.0, 32.0]);
    let product = eval_csr_elementwise(&indptr, &indices, &data, &dense, &[2, 3], false, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(product.dims(), &[3]);
    assert_eq!(values(&product), vec![1.0, 8.0, 48.0]);

    let quotient = eval_csr_elementwise(&indptr, &indices, &data, &dense, &[2, 3], true, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(values(&quotient), vec![1.0, 0.5, 0.1875]);
}

#[test]
fn gather_reads_the_dense_operand_at_the_pattern() {
    let (indptr, indices, _) = pattern();
    let dense = f32_tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let out = eval_csr_gather(&indptr, &indices, &dense, &[2, 3], DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[3]);
    assert_eq!(values(&out), vec![1.0, 3.0, 5.0]);
}

#[test]
fn batch_channels_share_the_sparsity_pattern() {
    let (indptr, indices, _) = pattern();
    let data = f32_tensor(&[3, 2], &[1.0, 10.0, 2.0, 20.0, 4.0, 40.0]);
    let out = eval_csr_reduce_sum(&indptr, &indices, &data, &[2, 3, 2], 1, DType::F32)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(out.dims(), &[2, 1, 2]);
    assert_eq!(values(&out), vec![3.0, 30.0, 4.0, 40.0]);
}

#[test]
fn inconsistent_indptr_is_rejected() {
    let indptr = i32_tensor(&[3], &[0, 2, 5]);
    let indices = i32_tensor(&[3], &[0, 2, 1]);
    let data = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    let weight = f32_tensor(&[3, 1], &[1.0, 1.0, 1.0]);
    eval_csrmv(&indptr, &indices, &data, &weight, &[2, 3], DType::F32)
        .expect_err("indptr terminating past nnz should fail");
}
