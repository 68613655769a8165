//! Parallel evaluation over point batches.
//!
//! Every rayon worker gets its own [`EvaluationContext`] through
//! `map_init`; the transform itself is only read. Output order always matches
//! input order.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rayon::prelude::*;

use super::bspline::BSplineDeformableTransform;
use super::trait_::{AdvancedTransform, Transform, TransformedPoint};
use crate::geometry::{Point, SpatialHessian, SpatialJacobian};

/// Map every point in parallel.
pub fn transform_points<T, const D: usize>(transform: &T, points: &[Point<D>]) -> Vec<TransformedPoint<D>>
where
    T: AdvancedTransform<D>,
{
    points
        .par_iter()
        .map(|point| transform.transform_point(point))
        .collect()
}

/// Spatial Jacobian of every point, in parallel.
pub fn spatial_jacobians<T, const D: usize>(transform: &T, points: &[Point<D>]) -> Vec<SpatialJacobian<D>>
where
    T: AdvancedTransform<D>,
{
    points
        .par_iter()
        .map_init(
            || transform.new_context(),
            |ctx, point| transform.spatial_jacobian(point, ctx),
        )
        .collect()
}

/// Spatial Hessian of every point, in parallel.
pub fn spatial_hessians<T, const D: usize>(transform: &T, points: &[Point<D>]) -> Vec<SpatialHessian<D>>
where
    T: AdvancedTransform<D>,
{
    points
        .par_iter()
        .map_init(
            || transform.new_context(),
            |ctx, point| transform.spatial_hessian(point, ctx),
        )
        .collect()
}

impl<B: Backend, const D: usize> Transform<B, D> for BSplineDeformableTransform<'_, D> {
    /// Points are evaluated on the host in `f64` and returned in the
    /// backend's float element type. Points without full support come back
    /// undeformed.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let [count, dims] = points.dims();
        assert_eq!(dims, D, "point tensor must have shape [Batch, {}]", D);

        let coords: Vec<f64> = points.into_data().iter::<f64>().collect();
        let input: Vec<Point<D>> = coords
            .chunks_exact(D)
            .map(|c| Point::from(std::array::from_fn::<f64, D, _>(|j| c[j])))
            .collect();

        let values: Vec<f64> = transform_points(self, &input)
            .iter()
            .flat_map(|mapped| mapped.point.coords.iter().copied())
            .collect();
        let data = TensorData::new(values, [count, D]).convert::<B::FloatElem>();
        Tensor::from_data(data, &device)
    }
}
