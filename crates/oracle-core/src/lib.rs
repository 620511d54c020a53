//! Operator node model and contracts shared by the reference evaluator.
//!
//! This crate carries the data model an external test harness uses to
//! describe a single operator evaluation: tensor descriptors, attribute
//! lists, and the node itself, plus the error taxonomy every evaluator
//! routine reports through. It deliberately contains no numeric code.

pub mod attrs;
pub mod dtype;
pub mod error;
pub mod format;
pub mod node;

pub use attrs::{AttrEntry, AttrValue, Attrs};
pub use dtype::DType;
pub use error::{EvalError, EvalResult};
pub use format::TensorFormat;
pub use node::{OperatorNode, TensorDescriptor};
