//! Seeded random tensor sources.

use oracle_core::{DType, EvalResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, StandardNormal};

use crate::tensor::HostTensor;

/// Standard-normal samples for the declared shape, deterministic for a
/// given seed.
pub fn standard_normal(dims: Vec<usize>, out_dtype: DType, seed: u64) -> EvalResult<HostTensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len: usize = dims.iter().product();
    let values: Vec<f64> = (0..len).map(|_| rng.sample(StandardNormal)).collect();
    Ok(HostTensor::from_f64(dims, values)?.cast(out_dtype))
}

/// Gaussian vector used to repair a mis-shaped matmul bias operand.
pub fn gaussian_vector(
    len: usize,
    mean: f64,
    sigma: f64,
    out_dtype: DType,
    seed: u64,
) -> EvalResult<HostTensor> {
    let normal = Normal::new(mean, sigma)
        .map_err(|err| oracle_core::EvalError::execution(err.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..len).map(|_| rng.sample(normal)).collect();
    Ok(HostTensor::from_f64(vec![len], values)?.cast(out_dtype))
}
