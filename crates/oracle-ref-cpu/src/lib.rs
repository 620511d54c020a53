//! Reference CPU evaluator for operator nodes.
//!
//! Given an [`oracle_core::OperatorNode`] and concrete input arrays bound
//! in an [`EvalContext`], [`evaluate`] produces the numerically faithful
//! reference output an optimized kernel is compared against. Kernels are
//! straightforward host loops; clarity and fidelity beat speed here.

pub mod context;
pub mod elementwise;
pub mod indexing;
pub mod layout;
pub mod matmul;
pub mod random;
pub mod reduce;
pub mod registry;
pub mod shape_ops;
pub mod slice;
pub mod sparse;
pub mod tensor;

pub use context::{CustomFn, EvalContext};
pub use registry::{evaluate, op_kind, OpKind};
pub use tensor::{HostTensor, TensorData};
