//! Caller-owned scratch space for weight evaluation.

use super::kernel::AxisBasis;

/// Per-query scratch buffers for one execution context.
///
/// Every query that needs more than the transformed point writes its weights
/// and parameter indices here. A context must not be shared
/// between threads while queries run; give every worker its own (see
/// [`AdvancedTransform::new_context`](crate::transform::AdvancedTransform::new_context)).
///
/// After a query returns, [`weights`](Self::weights) and
/// [`parameter_indices`](Self::parameter_indices) describe the last evaluated
/// point until the next query overwrites them.
#[derive(Debug, Clone)]
pub struct EvaluationContext<const D: usize> {
    pub(crate) inside: bool,
    pub(crate) basis: [AxisBasis; D],
    pub(crate) weights: Vec<f64>,
    pub(crate) derivative_weights: [Vec<f64>; D],
    /// Second-order weights for `d1 <= d2`, packed row by row.
    pub(crate) second_order_weights: Vec<Vec<f64>>,
    pub(crate) indices: Vec<usize>,
}

impl<const D: usize> EvaluationContext<D> {
    /// Allocate buffers for `number_of_weights` weights.
    pub fn new(number_of_weights: usize) -> Self {
        Self {
            inside: false,
            basis: [AxisBasis::zeros(); D],
            weights: vec![0.0; number_of_weights],
            derivative_weights: std::array::from_fn(|_| vec![0.0; number_of_weights]),
            second_order_weights: vec![vec![0.0; number_of_weights]; D * (D + 1) / 2],
            indices: vec![0; number_of_weights],
        }
    }

    /// Resize the buffers if the context was built for another spline order.
    pub(crate) fn prepare(&mut self, number_of_weights: usize) {
        if self.weights.len() != number_of_weights {
            *self = Self::new(number_of_weights);
        }
    }

    /// Weights of the last evaluated point, in lattice enumeration order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Dimension-0 parameter indices of the last evaluated point, aligned
    /// with [`weights`](Self::weights). Indices for dimension `d` are these
    /// plus `d * points_per_dimension`.
    pub fn parameter_indices(&self) -> &[usize] {
        &self.indices
    }

    /// Whether the last evaluated point had full support.
    pub fn inside(&self) -> bool {
        self.inside
    }
}

/// Position of the pair `(d1, d2)`, `d1 <= d2`, in the packed upper triangle.
#[inline]
pub(crate) fn packed_pair_index<const D: usize>(d1: usize, d2: usize) -> usize {
    let (a, b) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
    a * D - a * (a + 1) / 2 + b
}
