//! Bulk transforms composed additively with the B-spline deformation.
//!
//! With a bulk transform `B` the deformed point is `y = B(x) + D(x)`, where
//! `D` is the B-spline deformation. Without one, `B` is the identity.

use std::fmt::Debug;

use nalgebra::SMatrix;

use crate::geometry::{zero_hessian, Point, SpatialHessian, SpatialJacobian, Vector};

/// Global transform added to the deformation field.
///
/// Implementations must be thread-safe: the engine evaluates them from many
/// queries at once.
pub trait BulkTransform<const D: usize>: Debug + Send + Sync {
    /// Map a point.
    fn transform_point(&self, point: &Point<D>) -> Point<D>;

    /// Derivative of [`transform_point`](Self::transform_point) with respect
    /// to the input point.
    fn spatial_jacobian(&self, point: &Point<D>) -> SpatialJacobian<D>;

    /// Second derivative, one matrix per output dimension.
    fn spatial_hessian(&self, _point: &Point<D>) -> SpatialHessian<D> {
        zero_hessian()
    }

    /// Whether [`spatial_hessian`](Self::spatial_hessian) can be nonzero.
    fn has_nonzero_spatial_hessian(&self) -> bool {
        false
    }
}

/// Affine transform with a fixed center:
/// `T(x) = A(x - c) + c + t`
///
/// where
/// * A is a D×D matrix (rotation, scale, shear)
/// * t is a translation vector
/// * c is the fixed center of rotation/scaling
#[derive(Debug, Clone, PartialEq)]
pub struct AffineBulkTransform<const D: usize> {
    matrix: SMatrix<f64, D, D>,
    translation: Vector<D>,
    center: Point<D>,
}

impl<const D: usize> AffineBulkTransform<D> {
    pub fn new(matrix: SMatrix<f64, D, D>, translation: Vector<D>, center: Point<D>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    /// Identity affine transform about the origin.
    pub fn identity() -> Self {
        Self::new(SMatrix::identity(), Vector::zeros(), Point::origin())
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    pub fn translation(&self) -> &Vector<D> {
        &self.translation
    }

    pub fn center(&self) -> &Point<D> {
        &self.center
    }
}

impl<const D: usize> BulkTransform<D> for AffineBulkTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        self.center + self.matrix * (point - self.center) + self.translation
    }

    fn spatial_jacobian(&self, _point: &Point<D>) -> SpatialJacobian<D> {
        self.matrix
    }
}

/// Translates points by a fixed offset vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationBulkTransform<const D: usize> {
    translation: Vector<D>,
}

impl<const D: usize> TranslationBulkTransform<D> {
    pub fn new(translation: Vector<D>) -> Self {
        Self { translation }
    }

    pub fn translation(&self) -> &Vector<D> {
        &self.translation
    }
}

impl<const D: usize> BulkTransform<D> for TranslationBulkTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        point + self.translation
    }

    fn spatial_jacobian(&self, _point: &Point<D>) -> SpatialJacobian<D> {
        SpatialJacobian::identity()
    }
}
