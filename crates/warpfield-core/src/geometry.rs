use nalgebra::{Const, Dyn, OMatrix, Point as NaPoint, SMatrix, SVector};

pub type Point<const D: usize> = NaPoint<f64, D>;
pub type Vector<const D: usize> = SVector<f64, D>;
pub type Spacing<const D: usize> = SVector<f64, D>;
pub type Direction<const D: usize> = SMatrix<f64, D, D>;

/// Position in lattice index space, fractional along every axis.
pub type ContinuousIndex<const D: usize> = NaPoint<f64, D>;

/// Derivative of the output point with respect to the input point.
pub type SpatialJacobian<const D: usize> = SMatrix<f64, D, D>;

/// One second-derivative matrix per output dimension.
pub type SpatialHessian<const D: usize> = [SMatrix<f64, D, D>; D];

/// `D x n` block of the parameter Jacobian restricted to its nonzero columns.
pub type SparseJacobian<const D: usize> = OMatrix<f64, Const<D>, Dyn>;

// Common aliases
pub type Point2 = Point<2>;
pub type Point3 = Point<3>;
pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Spacing2 = Spacing<2>;
pub type Spacing3 = Spacing<3>;
pub type Direction2 = Direction<2>;
pub type Direction3 = Direction<3>;

/// All-zero spatial Hessian.
pub fn zero_hessian<const D: usize>() -> SpatialHessian<D> {
    [SMatrix::zeros(); D]
}
