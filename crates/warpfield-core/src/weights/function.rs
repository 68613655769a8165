//! Tensor-product B-spline weights over a support region.
//!
//! Weights are enumerated in lattice order with axis 0 fastest: entry `i`
//! belongs to the control point `start + offsets[i]`. The same enumeration is
//! used by the support-region indexer, so weights and parameter indices always
//! line up positionally.

use super::kernel::{AxisBasis, DerivativeOrder, SplineOrder};
use crate::geometry::ContinuousIndex;

/// Support region of a query point, identified by its minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportRegion<const D: usize> {
    pub start: [i64; D],
    pub size: usize,
}

impl<const D: usize> SupportRegion<D> {
    /// Last lattice index of the region along `axis`.
    pub fn upper_index(&self, axis: usize) -> i64 {
        self.start[axis] + self.size as i64 - 1
    }
}

/// Evaluator of 0th, 1st and 2nd order tensor-product B-spline weights for a
/// fixed spline order.
///
/// Holds only immutable tables; all per-query data lives in caller-owned
/// buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineWeights<const D: usize> {
    order: SplineOrder,
    offsets: Vec<[usize; D]>,
}

impl<const D: usize> BSplineWeights<D> {
    pub fn new(order: SplineOrder) -> Self {
        let n = order.support_size();
        let count = n.pow(D as u32);
        let offsets = (0..count)
            .map(|i| {
                let mut rest = i;
                std::array::from_fn(|_| {
                    let k = rest % n;
                    rest /= n;
                    k
                })
            })
            .collect();
        Self { order, offsets }
    }

    pub fn spline_order(&self) -> SplineOrder {
        self.order
    }

    /// Number of weights, `(order + 1)^D`.
    pub fn number_of_weights(&self) -> usize {
        self.offsets.len()
    }

    /// Offset of every weight from the support region start, axis 0 fastest.
    pub fn offsets(&self) -> &[[usize; D]] {
        &self.offsets
    }

    /// Support region of a continuous index, or `None` when the input is
    /// non-finite or its start index is not representable as `i64` with room
    /// for the whole support.
    pub fn support_region(&self, cindex: &ContinuousIndex<D>) -> Option<SupportRegion<D>> {
        let shift = self.order.start_offset();
        let size = self.order.support_size();
        let mut start = [0i64; D];
        for (s, c) in start.iter_mut().zip(cindex.iter()) {
            let first = (c - shift).floor();
            // NaN and infinities fail both comparisons.
            if !(first > i64::MIN as f64 && first + (size as f64) < i64::MAX as f64) {
                return None;
            }
            *s = first as i64;
        }
        Some(SupportRegion { start, size })
    }

    /// Evaluate the 1-D kernels along every axis of `support`.
    pub fn evaluate_basis(
        &self,
        cindex: &ContinuousIndex<D>,
        support: &SupportRegion<D>,
        derivatives: DerivativeOrder,
        basis: &mut [AxisBasis; D],
    ) {
        for (j, axis) in basis.iter_mut().enumerate() {
            axis.evaluate(self.order, cindex[j], support.start[j], derivatives);
        }
    }

    /// Value weights: the tensor product of the 1-D kernel values.
    pub fn compute_weights(&self, basis: &[AxisBasis; D], weights: &mut [f64]) {
        debug_assert_eq!(weights.len(), self.offsets.len());
        for (w, offset) in weights.iter_mut().zip(&self.offsets) {
            *w = (0..D).map(|j| basis[j].value[offset[j]]).product();
        }
    }

    /// First-derivative weights along `direction`: the kernel along that
    /// axis is replaced by its derivative.
    pub fn compute_derivative_weights(
        &self,
        basis: &[AxisBasis; D],
        direction: usize,
        weights: &mut [f64],
    ) {
        debug_assert_eq!(weights.len(), self.offsets.len());
        for (w, offset) in weights.iter_mut().zip(&self.offsets) {
            *w = (0..D)
                .map(|j| {
                    if j == direction {
                        basis[j].first[offset[j]]
                    } else {
                        basis[j].value[offset[j]]
                    }
                })
                .product();
        }
    }

    /// Second-derivative weights for the axis pair `(d1, d2)`.
    ///
    /// Symmetric in its arguments: along a repeated axis the kernel is
    /// replaced by its second derivative, along two distinct axes each is
    /// replaced by its first derivative.
    pub fn compute_second_order_weights(
        &self,
        basis: &[AxisBasis; D],
        d1: usize,
        d2: usize,
        weights: &mut [f64],
    ) {
        debug_assert_eq!(weights.len(), self.offsets.len());
        for (w, offset) in weights.iter_mut().zip(&self.offsets) {
            *w = (0..D)
                .map(|j| {
                    let k = offset[j];
                    if j == d1 && j == d2 {
                        basis[j].second[k]
                    } else if j == d1 || j == d2 {
                        basis[j].first[k]
                    } else {
                        basis[j].value[k]
                    }
                })
                .product();
        }
    }
}
