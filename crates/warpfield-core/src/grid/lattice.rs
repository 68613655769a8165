//! Control-point lattice geometry.
//!
//! A lattice couples a [`GridRegion`] with the physical placement of its
//! points (origin, spacing, direction cosines) and caches the matrices that
//! map between physical space and continuous lattice indices.

use nalgebra::SMatrix;

use super::region::GridRegion;
use crate::error::{Result, TransformError};
use crate::geometry::{ContinuousIndex, Direction, Point, Spacing};

/// Regular control-point lattice in physical space.
///
/// # Coordinate Systems
/// * **Index Space**: continuous lattice indices, integral at control points
/// * **Physical Space**: coordinates of the points being deformed
///
/// The mapping is `point = origin + direction * diag(spacing) * index`, with
/// the origin located at lattice index zero (not at the region start).
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice<const D: usize> {
    region: GridRegion<D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    index_to_point: SMatrix<f64, D, D>,
    point_to_index: SMatrix<f64, D, D>,
}

impl<const D: usize> Lattice<D> {
    /// Create a lattice over `region` with zero origin, unit spacing and
    /// identity direction.
    pub fn new(region: GridRegion<D>) -> Self {
        Self {
            region,
            origin: Point::origin(),
            spacing: Spacing::repeat(1.0),
            direction: Direction::identity(),
            index_to_point: SMatrix::identity(),
            point_to_index: SMatrix::identity(),
        }
    }

    /// Create a lattice with full geometry, validating spacing and direction.
    pub fn with_geometry(
        region: GridRegion<D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        let mut lattice = Self::new(region);
        lattice.origin = origin;
        lattice.spacing = spacing;
        lattice.direction = direction;
        lattice.update_matrices()?;
        Ok(lattice)
    }

    pub fn region(&self) -> &GridRegion<D> {
        &self.region
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Matrix `(direction * diag(spacing))^-1` taking physical offsets to
    /// index offsets.
    pub fn point_to_index_matrix(&self) -> &SMatrix<f64, D, D> {
        &self.point_to_index
    }

    pub fn number_of_points(&self) -> usize {
        self.region.number_of_points()
    }

    pub(crate) fn set_region(&mut self, region: GridRegion<D>) {
        self.region = region;
    }

    pub(crate) fn set_origin(&mut self, origin: Point<D>) {
        self.origin = origin;
    }

    /// Set the spacing; every component must be positive and finite.
    pub(crate) fn set_spacing(&mut self, spacing: Spacing<D>) -> Result<()> {
        let previous = self.spacing;
        self.spacing = spacing;
        self.update_matrices().inspect_err(|_| self.spacing = previous)
    }

    /// Set the direction cosines; the matrix must be invertible.
    pub(crate) fn set_direction(&mut self, direction: Direction<D>) -> Result<()> {
        let previous = self.direction;
        self.direction = direction;
        self.update_matrices().inspect_err(|_| self.direction = previous)
    }

    fn update_matrices(&mut self) -> Result<()> {
        if let Some(j) = (0..D).find(|&j| !(self.spacing[j].is_finite() && self.spacing[j] > 0.0)) {
            return Err(TransformError::invalid_configuration(format!(
                "grid spacing along axis {} must be positive, got {}",
                j, self.spacing[j]
            )));
        }
        let index_to_point = self.direction * SMatrix::from_diagonal(&self.spacing);
        let point_to_index = index_to_point.try_inverse().ok_or_else(|| {
            TransformError::invalid_configuration("grid direction matrix is singular")
        })?;
        self.index_to_point = index_to_point;
        self.point_to_index = point_to_index;
        Ok(())
    }

    /// Map a physical point to its continuous lattice index.
    ///
    /// `index = (direction * diag(spacing))^-1 * (point - origin)`
    pub fn transform_point_to_continuous_index(&self, point: &Point<D>) -> ContinuousIndex<D> {
        ContinuousIndex::from(self.point_to_index * (point - self.origin))
    }

    /// Map a continuous lattice index to its physical point.
    ///
    /// `point = origin + direction * diag(spacing) * index`
    pub fn transform_continuous_index_to_point(&self, index: &ContinuousIndex<D>) -> Point<D> {
        self.origin + self.index_to_point * index.coords
    }

    /// Whether another lattice has identical region and geometry.
    pub fn same_geometry(&self, other: &Self, tolerance: f64) -> bool {
        self.region == other.region
            && (self.origin - other.origin).amax() <= tolerance
            && (self.spacing - other.spacing).amax() <= tolerance
            && (self.direction - other.direction).amax() <= tolerance
    }
}

impl<const D: usize> Default for Lattice<D> {
    fn default() -> Self {
        Self::new(GridRegion::empty())
    }
}
