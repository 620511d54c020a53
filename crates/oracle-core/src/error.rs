use thiserror::Error;

use crate::dtype::DType;
use crate::format::TensorFormat;

/// Failure surfaced by a single operator evaluation.
///
/// Every variant is local to the node being evaluated; there is no retry and
/// no partial-result recovery. The harness treats any error as a test
/// failure for that case.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A semantically required attribute was absent from the node.
    #[error("required attribute `{name}` is missing")]
    MissingAttribute { name: String },

    /// An attribute was present but carried an unexpected value type.
    #[error("attribute `{name}` has unexpected type (expected {expected})")]
    AttributeType { name: String, expected: &'static str },

    /// Layout conversion was requested for a pair outside the supported set.
    #[error("layout conversion {src} -> {dst} is not supported")]
    UnsupportedLayout { src: TensorFormat, dst: TensorFormat },

    /// The registry has no entry for the node's kind. Hard failure, never a
    /// silent no-op.
    #[error("operator kind `{kind}` is not supported")]
    UnsupportedOperator { kind: String },

    /// An operand named a runtime tensor with no bound array.
    #[error("no runtime array bound to tensor `{name}`")]
    UnboundTensor { name: String },

    /// A custom-operator node referenced an unregistered function name.
    #[error("custom function `{name}` is not registered")]
    UnknownCustomFunction { name: String },

    #[error("dtype {dtype} not supported for {op}")]
    DTypeNotSupported { op: &'static str, dtype: DType },

    /// Shape/length mismatch or similar failure inside a kernel. These
    /// propagate as-is; the evaluator adds no validation layer of its own.
    #[error("evaluation failure: {0}")]
    Execution(String),
}

impl EvalError {
    pub fn execution(message: impl Into<String>) -> Self {
        EvalError::Execution(message.into())
    }

    pub fn dtype(op: &'static str, dtype: DType) -> Self {
        EvalError::DTypeNotSupported { op, dtype }
    }
}

/// Convenience alias for results returned by evaluator routines.
pub type EvalResult<T> = Result<T, EvalError>;
