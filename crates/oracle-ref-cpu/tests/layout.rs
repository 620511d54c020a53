mod common;

use common::{f32_tensor, values};
use oracle_core::TensorFormat;
use oracle_ref_cpu::layout::{
    convert_fractal_shape, dense_to_fractal, eval_trans_data, fractal_to_dense, Fractal,
};

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 + 1.0).collect()
}

#[test]
fn packing_pads_and_tiles_the_trailing_axes() {
    let dense = f32_tensor(&[2, 3], &ramp(6));
    let packed = dense_to_fractal(&dense).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(packed.dims(), &[1, 1, 16, 16]);
    let flat = values(&packed);
    // packed[n1, m1, m0, n0] reads the padded dense at (m1*16+m0, n1*16+n0).
    assert_eq!(flat[0], 1.0);
    assert_eq!(flat[1], 2.0);
    assert_eq!(flat[2], 3.0);
    assert_eq!(flat[3], 0.0);
    assert_eq!(flat[16], 4.0);
    assert_eq!(flat[17], 5.0);
}

#[test]
fn round_trip_restores_the_original_exactly() {
    let dense = f32_tensor(&[5, 19], &ramp(95));
    let packed = dense_to_fractal(&dense).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(packed.dims(), &[2, 1, 16, 16]);
    let back = fractal_to_dense(&packed, &[5, 19])
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(back, dense);
}

#[test]
fn batch_axes_pass_through_packing() {
    let dense = f32_tensor(&[2, 16, 16], &ramp(512));
    let packed = dense_to_fractal(&dense).unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(packed.dims(), &[2, 1, 1, 16, 16]);
    let back = fractal_to_dense(&packed, &[2, 16, 16])
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(back, dense);
}

#[test]
fn trans_data_rejects_unsupported_pairs() {
    let dense = f32_tensor(&[16, 16], &ramp(256));
    eval_trans_data(&dense, TensorFormat::Nhwc, TensorFormat::Nchw, &[16, 16])
        .expect_err("only fractal conversions are supported");
}

#[test]
fn trans_data_crops_with_the_declared_shape() {
    let dense = f32_tensor(&[2, 3], &ramp(6));
    let packed = eval_trans_data(
        &dense,
        TensorFormat::Default,
        TensorFormat::FractalNz,
        &[1, 1, 16, 16],
    )
    .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let back = eval_trans_data(
        &packed,
        TensorFormat::FractalNz,
        TensorFormat::Default,
        &[2, 3],
    )
    .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(back, dense);
}

#[test]
fn fractal_shape_recovery_for_both_orderings() {
    let dims = [2usize, 3, 16, 16];
    let zn = convert_fractal_shape(&dims, Fractal::ZN)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    let zz = convert_fractal_shape(&dims, Fractal::ZZ)
        .unwrap_or_else(|err| panic!("unexpected error: {err}"));
    assert_eq!(zn, vec![48, 32]);
    assert_eq!(zz, vec![32, 48]);
}
