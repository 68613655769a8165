//! B-spline deformable transform.
//!
//! The deformation at a physical point `x` is the tensor-product B-spline
//! interpolation of `D` coefficient fields laid out over a control-point
//! lattice:
//!
//! `y = B(x) + Σ_i w_i(x) c_i`
//!
//! where `B` is an optional bulk transform (identity if absent), `w_i` are
//! the `(order + 1)^D` weights of the support region of `x` and `c_i` the
//! coefficient vectors of the matching control points.
//!
//! Derivatives with respect to `x` are computed in lattice index space and
//! carried to physical space with `M = (direction * diag(spacing))^-1`.

use nalgebra::{Const, DMatrix, Dyn, SMatrix};
use tracing::{debug, warn};

use super::bulk::BulkTransform;
use super::support::SupportRegionIndexer;
use super::trait_::{AdvancedTransform, TransformedPoint};
use crate::error::{Result, TransformError};
use crate::geometry::{
    zero_hessian, Direction, Point, Spacing, SparseJacobian, SpatialHessian, SpatialJacobian,
};
use crate::grid::{CoefficientImage, CoefficientSource, CoefficientView, GridRegion, Lattice};
use crate::weights::context::packed_pair_index;
use crate::weights::{AxisBasis, BSplineWeights, DerivativeOrder, EvaluationContext, SplineOrder};

/// B-spline free-form deformation over a regular control-point lattice.
///
/// Coefficients are borrowed for `'a`, either as one flat parameter buffer
/// (`D` blocks of `points` values, axis 0 fastest) or as `D` coefficient
/// images. Binding takes `&mut self` and queries take `&self`, so a bound
/// transform can be shared between threads as long as every thread brings
/// its own [`EvaluationContext`].
#[derive(Debug)]
pub struct BSplineDeformableTransform<'a, const D: usize> {
    lattice: Lattice<D>,
    weights: BSplineWeights<D>,
    indexer: SupportRegionIndexer<D>,
    coefficients: Option<CoefficientView<'a, D>>,
    parameters: Option<&'a [f64]>,
    bulk: Option<Box<dyn BulkTransform<D>>>,
}

impl<'a, const D: usize> BSplineDeformableTransform<'a, D> {
    /// Create an unbound transform with an empty grid region.
    pub fn new(order: SplineOrder) -> Self {
        let weights = BSplineWeights::new(order);
        let lattice = Lattice::default();
        let indexer = SupportRegionIndexer::new(*lattice.region(), weights.offsets());
        Self {
            lattice,
            weights,
            indexer,
            coefficients: None,
            parameters: None,
            bulk: None,
        }
    }

    /// Create an unbound transform over `lattice`.
    pub fn with_lattice(order: SplineOrder, lattice: Lattice<D>) -> Result<Self> {
        validate_region(order, lattice.region())?;
        let mut transform = Self::new(order);
        transform.indexer = SupportRegionIndexer::new(*lattice.region(), transform.weights.offsets());
        transform.lattice = lattice;
        Ok(transform)
    }

    pub fn spline_order(&self) -> SplineOrder {
        self.weights.spline_order()
    }

    pub fn lattice(&self) -> &Lattice<D> {
        &self.lattice
    }

    pub fn grid_region(&self) -> &GridRegion<D> {
        self.lattice.region()
    }

    /// Set the control-point region.
    ///
    /// Every axis needs at least `order + 1` points. When coefficients are
    /// bound, the new region must keep the number of points they cover.
    pub fn set_grid_region(&mut self, region: GridRegion<D>) -> Result<()> {
        validate_region(self.spline_order(), &region)?;
        if let Some(view) = &self.coefficients {
            let bound = view.points_per_dimension();
            if bound != region.number_of_points() {
                return Err(TransformError::invalid_configuration(format!(
                    "grid region has {} points but the bound coefficients cover {}",
                    region.number_of_points(),
                    bound
                )));
            }
        }
        debug!(
            index = ?region.index(),
            size = ?region.size(),
            points = region.number_of_points(),
            "grid region set"
        );
        self.lattice.set_region(region);
        self.indexer = SupportRegionIndexer::new(region, self.weights.offsets());
        Ok(())
    }

    pub fn set_grid_origin(&mut self, origin: Point<D>) {
        debug!(origin = ?origin.coords.as_slice(), "grid origin set");
        self.lattice.set_origin(origin);
    }

    /// Set the control-point spacing; every component must be positive.
    pub fn set_grid_spacing(&mut self, spacing: Spacing<D>) -> Result<()> {
        self.lattice.set_spacing(spacing)?;
        debug!(spacing = ?spacing.as_slice(), "grid spacing set");
        Ok(())
    }

    /// Set the grid direction cosines; the matrix must be invertible.
    pub fn set_grid_direction(&mut self, direction: Direction<D>) -> Result<()> {
        self.lattice.set_direction(direction)?;
        debug!("grid direction set");
        Ok(())
    }

    /// Bind a flat parameter buffer of length `D * points`.
    ///
    /// The grid region must be set first. The buffer is borrowed, not
    /// copied, and is read by every subsequent query.
    pub fn set_parameters(&mut self, parameters: &'a [f64]) -> Result<()> {
        if self.lattice.region().is_empty() {
            return Err(TransformError::invalid_configuration(
                "grid region must be set before binding parameters",
            ));
        }
        let view = CoefficientView::from_parameters(parameters, self.lattice.number_of_points())?;
        if self.coefficient_source() == Some(CoefficientSource::Images) {
            warn!("parameter buffer replaces bound coefficient images");
        }
        debug!(parameters = parameters.len(), "parameters bound");
        self.coefficients = Some(view);
        self.parameters = Some(parameters);
        Ok(())
    }

    /// Bind `D` coefficient images that share one geometry.
    ///
    /// The lattice (region, origin, spacing, direction) is taken from the
    /// first image.
    pub fn set_coefficient_images(&mut self, images: [CoefficientImage<'a, D>; D]) -> Result<()> {
        let view = CoefficientView::from_images(&images)?;
        let Some(first) = images.first() else {
            return Err(TransformError::invalid_configuration(
                "zero-dimensional coefficient images",
            ));
        };
        validate_region(self.spline_order(), first.lattice().region())?;
        if self.coefficient_source() == Some(CoefficientSource::Parameters) {
            warn!("coefficient images replace bound parameter buffer");
        }
        debug!(
            size = ?first.lattice().region().size(),
            points = view.points_per_dimension(),
            "coefficient images bound"
        );
        self.lattice = first.lattice().clone();
        self.indexer = SupportRegionIndexer::new(*self.lattice.region(), self.weights.offsets());
        self.coefficients = Some(view);
        self.parameters = None;
        Ok(())
    }

    /// Set or clear the bulk transform added to the deformation.
    pub fn set_bulk_transform(&mut self, bulk: Option<Box<dyn BulkTransform<D>>>) {
        debug!(present = bulk.is_some(), "bulk transform set");
        self.bulk = bulk;
    }

    pub fn bulk_transform(&self) -> Option<&dyn BulkTransform<D>> {
        self.bulk.as_deref()
    }

    /// Bound parameter buffer, if coefficients were bound that way.
    pub fn parameters(&self) -> Option<&'a [f64]> {
        self.parameters
    }

    pub fn coefficient_source(&self) -> Option<CoefficientSource> {
        self.coefficients.map(|view| view.source())
    }

    pub fn number_of_parameters_per_dimension(&self) -> usize {
        self.lattice.number_of_points()
    }

    /// Number of weights per point, `(order + 1)^D`.
    pub fn number_of_weights(&self) -> usize {
        self.weights.number_of_weights()
    }

    pub fn has_nonzero_spatial_hessian(&self) -> bool {
        self.spline_order().get() >= 2
            || self.bulk.as_ref().is_some_and(|bulk| bulk.has_nonzero_spatial_hessian())
    }

    pub fn has_nonzero_jacobian_of_spatial_hessian(&self) -> bool {
        self.spline_order().get() >= 2
    }

    fn bulk_point(&self, point: &Point<D>) -> Point<D> {
        match &self.bulk {
            Some(bulk) => bulk.transform_point(point),
            None => *point,
        }
    }

    fn bulk_spatial_jacobian(&self, point: &Point<D>) -> SpatialJacobian<D> {
        match &self.bulk {
            Some(bulk) => bulk.spatial_jacobian(point),
            None => SpatialJacobian::identity(),
        }
    }

    fn bulk_spatial_hessian(&self, point: &Point<D>) -> SpatialHessian<D> {
        match &self.bulk {
            Some(bulk) => bulk.spatial_hessian(point),
            None => zero_hessian(),
        }
    }

    /// Locate the support region of `point` and evaluate the 1-D kernels up
    /// to `derivatives`. Fills the support, basis and dimension-0 indices of
    /// `ctx`; on the outside the indices become `0..number_of_weights`.
    fn locate(
        &self,
        point: &Point<D>,
        derivatives: DerivativeOrder,
        ctx: &mut EvaluationContext<D>,
    ) -> bool {
        ctx.prepare(self.weights.number_of_weights());
        let cindex = self.lattice.transform_point_to_continuous_index(point);
        let support = self
            .weights
            .support_region(&cindex)
            .filter(|support| self.indexer.is_inside(support));
        match support {
            Some(support) => {
                self.weights
                    .evaluate_basis(&cindex, &support, derivatives, &mut ctx.basis);
                self.indexer.compute_indices(&support, &mut ctx.indices);
                ctx.inside = true;
            }
            None => {
                for (i, index) in ctx.indices.iter_mut().enumerate() {
                    *index = i;
                }
                ctx.inside = false;
            }
        }
        ctx.inside
    }

    fn compute_value_weights(&self, ctx: &mut EvaluationContext<D>) {
        self.weights.compute_weights(&ctx.basis, &mut ctx.weights);
    }

    fn compute_derivative_weights(&self, ctx: &mut EvaluationContext<D>) {
        for (direction, weights) in ctx.derivative_weights.iter_mut().enumerate() {
            self.weights
                .compute_derivative_weights(&ctx.basis, direction, weights);
        }
    }

    /// Second-order weights for `d1 <= d2`; the lower triangle is implied.
    fn compute_second_order_weights(&self, ctx: &mut EvaluationContext<D>) {
        for d1 in 0..D {
            for d2 in d1..D {
                let slot = packed_pair_index::<D>(d1, d2);
                self.weights.compute_second_order_weights(
                    &ctx.basis,
                    d1,
                    d2,
                    &mut ctx.second_order_weights[slot],
                );
            }
        }
    }

    /// `Σ_i weights[i] * c_d[indices[i]]`, accumulated in enumeration order.
    fn accumulate(&self, dimension: usize, weights: &[f64], indices: &[usize]) -> f64 {
        match &self.coefficients {
            Some(view) => {
                let field = view.field(dimension);
                weights
                    .iter()
                    .zip(indices)
                    .fold(0.0, |acc, (w, &i)| acc + w * field[i])
            }
            None => 0.0,
        }
    }

    /// Index-space spatial Jacobian of the deformation, row `d` holding the
    /// gradient of output dimension `d`.
    fn index_spatial_jacobian(&self, ctx: &EvaluationContext<D>) -> SpatialJacobian<D> {
        SMatrix::from_fn(|d, e| self.accumulate(d, &ctx.derivative_weights[e], &ctx.indices))
    }

    /// Physical spatial Hessian of the deformation.
    fn deformation_spatial_hessian(&self, ctx: &EvaluationContext<D>) -> SpatialHessian<D> {
        let m = self.lattice.point_to_index_matrix();
        std::array::from_fn(|d| {
            let index_hessian = SMatrix::<f64, D, D>::from_fn(|a, b| {
                let slot = packed_pair_index::<D>(a, b);
                self.accumulate(d, &ctx.second_order_weights[slot], &ctx.indices)
            });
            symmetric(m.transpose() * index_hessian * m)
        })
    }

    /// Per-weight matrix `Mᵀ S_i M`, `S_i` the second-order weights at `i`.
    fn weight_hessian(&self, ctx: &EvaluationContext<D>, i: usize) -> SMatrix<f64, D, D> {
        let m = self.lattice.point_to_index_matrix();
        let s = SMatrix::<f64, D, D>::from_fn(|a, b| {
            ctx.second_order_weights[packed_pair_index::<D>(a, b)][i]
        });
        symmetric(m.transpose() * s * m)
    }

    fn fill_jacobian_of_spatial_jacobian(
        &self,
        inside: bool,
        ctx: &EvaluationContext<D>,
        jsj: &mut Vec<SpatialJacobian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) {
        let nw = self.number_of_weights();
        jsj.clear();
        jsj.resize(D * nw, SpatialJacobian::zeros());
        if !inside {
            nonzero_indices.clear();
            nonzero_indices.extend(0..D * nw);
            return;
        }
        let m = self.lattice.point_to_index_matrix();
        for i in 0..nw {
            let gradient =
                SMatrix::<f64, 1, D>::from_fn(|_, e| ctx.derivative_weights[e][i]) * m;
            for d in 0..D {
                jsj[d * nw + i].set_row(d, &gradient);
            }
        }
        self.indexer
            .expand_to_all_dimensions(&ctx.indices, nonzero_indices);
    }

    fn fill_jacobian_of_spatial_hessian(
        &self,
        inside: bool,
        ctx: &EvaluationContext<D>,
        jsh: &mut Vec<SpatialHessian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) {
        let nw = self.number_of_weights();
        jsh.clear();
        jsh.resize(D * nw, zero_hessian());
        if !inside {
            nonzero_indices.clear();
            nonzero_indices.extend(0..D * nw);
            return;
        }
        if self.has_nonzero_jacobian_of_spatial_hessian() {
            for i in 0..nw {
                let hessian = self.weight_hessian(ctx, i);
                for d in 0..D {
                    jsh[d * nw + i][d] = hessian;
                }
            }
        }
        self.indexer
            .expand_to_all_dimensions(&ctx.indices, nonzero_indices);
    }
}

impl<const D: usize> AdvancedTransform<D> for BSplineDeformableTransform<'_, D> {
    fn number_of_parameters(&self) -> usize {
        D * self.lattice.number_of_points()
    }

    fn number_of_nonzero_jacobian_indices(&self) -> usize {
        D * self.weights.number_of_weights()
    }

    fn new_context(&self) -> EvaluationContext<D> {
        EvaluationContext::new(self.weights.number_of_weights())
    }

    /// Map a point without caller scratch.
    ///
    /// Kernels live on the stack and the coefficient sum runs straight over
    /// the weight enumeration, so this form never allocates. It performs the
    /// same floating-point operations in the same order as
    /// [`transform_point_with_weights`](AdvancedTransform::transform_point_with_weights).
    fn transform_point(&self, point: &Point<D>) -> TransformedPoint<D> {
        let mut output = self.bulk_point(point);
        let cindex = self.lattice.transform_point_to_continuous_index(point);
        let Some(support) = self
            .weights
            .support_region(&cindex)
            .filter(|support| self.indexer.is_inside(support))
        else {
            return TransformedPoint {
                point: output,
                inside: false,
            };
        };
        let Some(view) = &self.coefficients else {
            return TransformedPoint {
                point: output,
                inside: true,
            };
        };

        let mut basis = [AxisBasis::zeros(); D];
        self.weights
            .evaluate_basis(&cindex, &support, DerivativeOrder::Value, &mut basis);
        let base = self.indexer.base_offset(&support);
        let mut displacement = [0.0; D];
        for (offset, relative) in self
            .weights
            .offsets()
            .iter()
            .zip(self.indexer.relative_offsets())
        {
            let w: f64 = (0..D).map(|j| basis[j].value[offset[j]]).product();
            let index = base + relative;
            for (d, value) in displacement.iter_mut().enumerate() {
                *value += w * view.field(d)[index];
            }
        }
        for d in 0..D {
            output[d] += displacement[d];
        }
        TransformedPoint {
            point: output,
            inside: true,
        }
    }

    fn transform_point_with_weights(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
    ) -> TransformedPoint<D> {
        let mut output = self.bulk_point(point);
        if !self.locate(point, DerivativeOrder::Value, ctx) {
            ctx.weights.fill(0.0);
            return TransformedPoint {
                point: output,
                inside: false,
            };
        }
        self.compute_value_weights(ctx);
        if self.coefficients.is_some() {
            for d in 0..D {
                output[d] += self.accumulate(d, &ctx.weights, &ctx.indices);
            }
        }
        TransformedPoint {
            point: output,
            inside: true,
        }
    }

    fn jacobian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> DMatrix<f64> {
        let points = self.lattice.number_of_points();
        let mut jacobian = DMatrix::zeros(D, D * points);
        if self.jacobian_weights(point, ctx) {
            for (w, &index) in ctx.weights.iter().zip(&ctx.indices) {
                for d in 0..D {
                    jacobian[(d, d * points + index)] = *w;
                }
            }
        }
        jacobian
    }

    fn jacobian_weights(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> bool {
        if !self.locate(point, DerivativeOrder::Value, ctx) {
            ctx.weights.fill(0.0);
            return false;
        }
        self.compute_value_weights(ctx);
        true
    }

    fn jacobian_sparse(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jacobian: &mut SparseJacobian<D>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool {
        let nw = self.number_of_weights();
        if jacobian.ncols() == D * nw {
            jacobian.fill(0.0);
        } else {
            *jacobian = SparseJacobian::zeros_generic(Const::<D>, Dyn(D * nw));
        }
        if !self.jacobian_weights(point, ctx) {
            nonzero_indices.clear();
            nonzero_indices.extend(0..D * nw);
            return false;
        }
        for (i, w) in ctx.weights.iter().enumerate() {
            for d in 0..D {
                jacobian[(d, d * nw + i)] = *w;
            }
        }
        self.indexer
            .expand_to_all_dimensions(&ctx.indices, nonzero_indices);
        true
    }

    fn spatial_jacobian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> SpatialJacobian<D> {
        let bulk = self.bulk_spatial_jacobian(point);
        if !self.locate(point, DerivativeOrder::First, ctx) || self.coefficients.is_none() {
            return bulk;
        }
        self.compute_derivative_weights(ctx);
        bulk + self.index_spatial_jacobian(ctx) * self.lattice.point_to_index_matrix()
    }

    fn spatial_hessian(&self, point: &Point<D>, ctx: &mut EvaluationContext<D>) -> SpatialHessian<D> {
        let mut hessian = self.bulk_spatial_hessian(point);
        if !self.locate(point, DerivativeOrder::Second, ctx)
            || self.coefficients.is_none()
            || self.spline_order().get() < 2
        {
            return hessian;
        }
        self.compute_second_order_weights(ctx);
        for (total, deformation) in hessian
            .iter_mut()
            .zip(self.deformation_spatial_hessian(ctx))
        {
            *total += deformation;
        }
        hessian
    }

    fn jacobian_of_spatial_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsj: &mut Vec<SpatialJacobian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool {
        let inside = self.locate(point, DerivativeOrder::First, ctx);
        if inside {
            self.compute_derivative_weights(ctx);
        }
        self.fill_jacobian_of_spatial_jacobian(inside, ctx, jsj, nonzero_indices);
        inside
    }

    fn spatial_jacobian_and_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsj: &mut Vec<SpatialJacobian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> SpatialJacobian<D> {
        let mut sj = self.bulk_spatial_jacobian(point);
        let inside = self.locate(point, DerivativeOrder::First, ctx);
        if inside {
            self.compute_derivative_weights(ctx);
            if self.coefficients.is_some() {
                sj += self.index_spatial_jacobian(ctx) * self.lattice.point_to_index_matrix();
            }
        }
        self.fill_jacobian_of_spatial_jacobian(inside, ctx, jsj, nonzero_indices);
        sj
    }

    fn jacobian_of_spatial_hessian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsh: &mut Vec<SpatialHessian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> bool {
        let inside = self.locate(point, DerivativeOrder::Second, ctx);
        if inside && self.has_nonzero_jacobian_of_spatial_hessian() {
            self.compute_second_order_weights(ctx);
        }
        self.fill_jacobian_of_spatial_hessian(inside, ctx, jsh, nonzero_indices);
        inside
    }

    fn spatial_hessian_and_jacobian(
        &self,
        point: &Point<D>,
        ctx: &mut EvaluationContext<D>,
        jsh: &mut Vec<SpatialHessian<D>>,
        nonzero_indices: &mut Vec<usize>,
    ) -> SpatialHessian<D> {
        let mut hessian = self.bulk_spatial_hessian(point);
        let inside = self.locate(point, DerivativeOrder::Second, ctx);
        if inside && self.has_nonzero_jacobian_of_spatial_hessian() {
            self.compute_second_order_weights(ctx);
            if self.coefficients.is_some() {
                for (total, deformation) in hessian
                    .iter_mut()
                    .zip(self.deformation_spatial_hessian(ctx))
                {
                    *total += deformation;
                }
            }
        }
        self.fill_jacobian_of_spatial_hessian(inside, ctx, jsh, nonzero_indices);
        hessian
    }
}

/// `(m + mᵀ) / 2`, exactly symmetric.
fn symmetric<const D: usize>(m: SMatrix<f64, D, D>) -> SMatrix<f64, D, D> {
    (m + m.transpose()) * 0.5
}

/// Every axis of a non-empty region needs room for one full support.
fn validate_region<const D: usize>(order: SplineOrder, region: &GridRegion<D>) -> Result<()> {
    let needed = order.support_size();
    if let Some(axis) = (0..D).find(|&j| region.size()[j] < needed) {
        return Err(TransformError::invalid_configuration(format!(
            "grid axis {} has {} points, spline order {} needs at least {}",
            axis,
            region.size()[axis],
            order,
            needed
        )));
    }
    Ok(())
}
