use serde::{Deserialize, Serialize};

use crate::attrs::{AttrEntry, AttrValue, Attrs};
use crate::dtype::DType;
use crate::error::{EvalError, EvalResult};
use crate::format::TensorFormat;

/// Identifies one operand or result tensor: either a named runtime tensor
/// or an inline literal scalar (when `value` is present it wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorDescriptor {
    pub tensor_name: String,
    pub shape: Vec<usize>,
    pub data_type: DType,
    #[serde(default)]
    pub format: TensorFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttrValue>,
}

impl TensorDescriptor {
    pub fn new(tensor_name: impl Into<String>, shape: Vec<usize>, data_type: DType) -> Self {
        Self {
            tensor_name: tensor_name.into(),
            shape,
            data_type,
            format: TensorFormat::Default,
            value: None,
        }
    }

    pub fn with_format(mut self, format: TensorFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_value(mut self, value: AttrValue) -> Self {
        self.value = Some(value);
        self
    }
}

/// A single described computation: kind, operand slots, results, attributes.
///
/// `inputs` is a sequence of slots; most operators use one descriptor per
/// slot, while multi-tensor slots (`AddN`, `Concat`) put every operand in
/// the first slot. Nodes are produced by the harness from a serialized
/// operator graph and are read-only to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorNode {
    pub kind: String,
    pub inputs: Vec<Vec<TensorDescriptor>>,
    pub outputs: Vec<TensorDescriptor>,
    #[serde(default)]
    pub attrs: Vec<AttrEntry>,
}

impl OperatorNode {
    pub fn attrs(&self) -> Attrs<'_> {
        Attrs::new(&self.attrs)
    }

    /// The primary output descriptor; nearly every operator has exactly
    /// one, but a parseable node may still arrive without any.
    pub fn output(&self) -> EvalResult<&TensorDescriptor> {
        self.outputs.first().ok_or_else(|| {
            EvalError::execution(format!(
                "operator `{}` has no output descriptor",
                self.kind
            ))
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
