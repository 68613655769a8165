//! Transform traits.
//!
//! [`AdvancedTransform`] is the per-point query interface an optimizer or
//! metric drives: point mapping plus spatial and parameter derivatives.
//! [`Transform`] maps whole tensor batches of points at once.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::geometry::{Point, SparseJacobian, SpatialHessian, SpatialJacobian};
use crate::weights::EvaluationContext;

/// Result of mapping one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedPoint<const D: usize> {
    pub point: Point<D>,
    /// `false` when the point has no full support; `point` is then the
    /// undeformed sentinel.
    pub inside: bool,
}

/// Point-wise evaluation of a parametric transform and its derivatives.
///
/// Every query is read-only on the transform. Queries that need scratch
/// space take an [`EvaluationContext`], which must be exclusive to the
/// calling thread; create one per worker with [`new_context`](Self::new_context).
///
/// Points outside the support of the transform are not errors: results fall
/// back to the undeformed sentinel (zero deformation, zero parameter
/// derivatives) and the returned `inside` flag is `false`.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality
pub trait AdvancedTransform<const D: usize>: Sync {
    /// Total number of parameters.
    fn number_of_parameters(&self) -> usize;

    /// Length of the full nonzero parameter index list of one point.
    fn number_of_nonzero_jacobian_indices(&self) -> usize;

    /// Allocate scratch space sized for this transform.
    fn new_context(&self) -> EvaluationContext<D>;

    /// Map a point.
    fn transform_point(&self, point: &Point<D>) -> TransformedPoint<D>;

    /// Map a point and leave its weights and dimension-0 parameter indices in
    /// `ctx` for sparse-Jacobian bookkeeping.
    fn transform_point_with_weights(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
    ) -> TransformedPoint<D>;

    /// Parameter Jacobian as a dense `D x number_of_parameters` matrix.
    fn jacobian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> nalgebra::DMatrix<f64>;

    /// Parameter Jacobian in compact form: weights and dimension-0 indices
    /// are left in `ctx`. Returns the `inside` flag.
    fn jacobian_weights(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> bool;

    /// Parameter Jacobian restricted to its nonzero columns, with the global
    /// parameter index of every column. Returns the `inside` flag.
    fn jacobian_sparse(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jacobian: &mut SparseJacobian<D>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool;

    /// Derivative of the mapped point with respect to the input point.
    fn spatial_jacobian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> SpatialJacobian<D>;

    /// Second derivative of the mapped point, one matrix per output dimension.
    fn spatial_hessian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> SpatialHessian<D>;

    /// Derivative of the spatial Jacobian with respect to every nonzero
    /// parameter. Returns the `inside` flag.
    fn jacobian_of_spatial_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsj: &mut Vec<SpatialJacobian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool;

    /// Spatial Jacobian together with its parameter derivative, sharing one
    /// weight evaluation.
    fn spatial_jacobian_and_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsj: &mut Vec<SpatialJacobian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> SpatialJacobian<D>;

    /// Derivative of the spatial Hessian with respect to every nonzero
    /// parameter. Returns the `inside` flag.
    fn jacobian_of_spatial_hessian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsh: &mut Vec<SpatialHessian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool;

    /// Spatial Hessian together with its parameter derivative, sharing one
    /// weight evaluation.
    fn spatial_hessian_and_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsh: &mut Vec<SpatialHessian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> SpatialHessian<D>;
}

/// Transform trait for batches of points held in tensors.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
