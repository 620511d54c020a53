#![allow(dead_code)]

use oracle_core::{AttrEntry, AttrValue, DType, OperatorNode, TensorDescriptor};
use oracle_ref_cpu::HostTensor;

pub fn desc(name: &str, shape: &[usize], dtype: DType) -> TensorDescriptor {
    TensorDescriptor::new(name, shape.to_vec(), dtype)
}

pub fn attr(name: &str, value: AttrValue) -> AttrEntry {
    AttrEntry {
        name: name.to_string(),
        value,
    }
}

pub fn node(
    kind: &str,
    inputs: Vec<Vec<TensorDescriptor>>,
    output: TensorDescriptor,
    attrs: Vec<AttrEntry>,
) -> OperatorNode {
    OperatorNode {
        kind: kind.to_string(),
        inputs,
        outputs: vec![output],
        attrs,
    }
}

pub fn f32_tensor(shape: &[usize], values: &[f32]) -> HostTensor {
    HostTensor::from_f32(shape.to_vec(), values.to_vec())
        .unwrap_or_else(|err| panic!("bad tensor literal: {err}"))
}

pub fn i32_tensor(shape: &[usize], values: &[i32]) -> HostTensor {
    HostTensor::from_i32(shape.to_vec(), values.to_vec())
        .unwrap_or_else(|err| panic!("bad tensor literal: {err}"))
}

pub fn i64_tensor(shape: &[usize], values: &[i64]) -> HostTensor {
    HostTensor::from_i64(shape.to_vec(), values.to_vec())
        .unwrap_or_else(|err| panic!("bad tensor literal: {err}"))
}

/// Every element widened to f64 for comparison against expected vectors.
pub fn values(tensor: &HostTensor) -> Vec<f64> {
    tensor.f64_values()
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "element {i}: {a} differs from {e} by more than {tol}"
        );
    }
}
