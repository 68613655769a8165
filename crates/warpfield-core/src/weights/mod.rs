//! B-spline weight evaluation.
//!
//! This module provides the 1-D kernels, the tensor-product weight evaluator
//! for value, first-derivative and second-derivative weights, and the
//! caller-owned scratch buffers the evaluator writes into.

pub mod kernel;
pub mod function;
pub mod context;

pub use kernel::{AxisBasis, DerivativeOrder, SplineOrder, MAX_SPLINE_ORDER};
pub use function::{BSplineWeights, SupportRegion};
pub use context::EvaluationContext;
