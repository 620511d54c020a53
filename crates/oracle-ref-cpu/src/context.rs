use std::collections::HashMap;
use std::sync::Arc;

use half::f16;
use oracle_core::{AttrValue, DType, EvalError, EvalResult, TensorDescriptor};

use crate::tensor::HostTensor;

/// Natively-implemented custom operator body. Receives the node's resolved
/// inputs positionally and produces the single output tensor.
pub type CustomFn = dyn Fn(&[HostTensor]) -> EvalResult<HostTensor> + Send + Sync;

/// Mutable evaluation state shared across a sequence of node evaluations.
///
/// Holds the named runtime bindings tensors are read from and written back
/// to, the registered custom-function table, and the seed used by the
/// random-operand paths so repeated runs reproduce bit-identical results.
pub struct EvalContext {
    bindings: HashMap<String, HostTensor>,
    customs: HashMap<String, Arc<CustomFn>>,
    rng_seed: u64,
    draws: u64,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            customs: HashMap::new(),
            rng_seed: 0,
            draws: 0,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng_seed: seed,
            ..Self::new()
        }
    }

    /// Seed for the next random draw. Consecutive draws within one context
    /// get distinct streams, while a fresh context with the same seed
    /// replays the same sequence of draws.
    pub fn next_seed(&mut self) -> u64 {
        let draw = self.draws;
        self.draws += 1;
        self.rng_seed ^ draw.wrapping_mul(0x9e37_79b9_7f4a_7c15)
    }

    /// Binds a runtime array under a tensor name, replacing any previous
    /// binding.
    pub fn bind(&mut self, name: impl Into<String>, tensor: HostTensor) {
        self.bindings.insert(name.into(), tensor);
    }

    pub fn lookup(&self, name: &str) -> Option<&HostTensor> {
        self.bindings.get(name)
    }

    /// Registers a native closure under a custom-function name for the
    /// `Custom` operator.
    pub fn register_custom<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[HostTensor]) -> EvalResult<HostTensor> + Send + Sync + 'static,
    {
        self.customs.insert(name.into(), Arc::new(func));
    }

    pub fn custom(&self, name: &str) -> EvalResult<Arc<CustomFn>> {
        self.customs
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownCustomFunction {
                name: name.to_string(),
            })
    }

    /// Resolves an operand descriptor to a concrete tensor. An inline
    /// literal `value` takes precedence over the binding table; a descriptor
    /// with neither is an unbound-tensor failure.
    pub fn resolve(&self, desc: &TensorDescriptor) -> EvalResult<HostTensor> {
        if let Some(value) = &desc.value {
            return literal_tensor(desc, value);
        }
        self.lookup(&desc.tensor_name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundTensor {
                name: desc.tensor_name.clone(),
            })
    }

    pub fn resolve_all(&self, slot: &[TensorDescriptor]) -> EvalResult<Vec<HostTensor>> {
        slot.iter().map(|desc| self.resolve(desc)).collect()
    }
}

/// Materializes an inline literal into a tensor of the descriptor's dtype
/// and shape. Scalars fill the whole shape; lists must match it exactly.
fn literal_tensor(desc: &TensorDescriptor, value: &AttrValue) -> EvalResult<HostTensor> {
    let wide: Vec<f64> = match value {
        AttrValue::Bool(v) => vec![*v as i64 as f64],
        AttrValue::Int(v) => vec![*v as f64],
        AttrValue::Float(v) => vec![*v],
        AttrValue::BoolList(v) => v.iter().map(|&b| b as i64 as f64).collect(),
        AttrValue::IntList(v) => v.iter().map(|&x| x as f64).collect(),
        AttrValue::FloatList(v) => v.clone(),
        AttrValue::Str(_) | AttrValue::StrList(_) => {
            return Err(EvalError::execution(format!(
                "tensor `{}` carries a non-numeric literal",
                desc.tensor_name
            )))
        }
    };
    let count: usize = desc.shape.iter().product();
    if wide.len() == 1 {
        return Ok(HostTensor::full(desc.data_type, desc.shape.clone(), wide[0]));
    }
    if wide.len() != count {
        return Err(EvalError::execution(format!(
            "literal for tensor `{}` has {} elements but shape {:?}",
            desc.tensor_name,
            wide.len(),
            desc.shape
        )));
    }
    let dims = desc.shape.clone();
    match desc.data_type {
        DType::Bool => HostTensor::from_bool(dims, wide.iter().map(|&x| x != 0.0).collect()),
        DType::I32 => HostTensor::from_i32(dims, wide.iter().map(|&x| x as i32).collect()),
        DType::I64 => HostTensor::from_i64(dims, wide.iter().map(|&x| x as i64).collect()),
        DType::F16 => HostTensor::from_f16(dims, wide.iter().map(|&x| f16::from_f64(x)).collect()),
        DType::F32 => HostTensor::from_f32(dims, wide.iter().map(|&x| x as f32).collect()),
        DType::F64 => HostTensor::from_f64(dims, wide),
    }
}
