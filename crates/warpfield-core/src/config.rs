//! Serializable transform configuration.
//!
//! Grid geometry is stored as plain vectors so that one configuration type
//! serves every dimension; lengths are checked against `D` when the
//! configuration is turned into a lattice or a transform.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::geometry::{Direction, Point, Spacing};
use crate::grid::{GridRegion, Lattice};
use crate::transform::BSplineDeformableTransform;
use crate::weights::SplineOrder;

/// B-spline transform configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BSplineTransformConfig {
    /// Spline order, 0 to 3.
    pub spline_order: usize,
    /// Number of control points along each axis.
    pub grid_size: Vec<usize>,
    /// First lattice index along each axis; zero if absent.
    pub grid_index: Option<Vec<i64>>,
    /// Physical position of lattice index zero; the origin if absent.
    pub grid_origin: Option<Vec<f64>>,
    /// Control-point spacing; unit spacing if absent.
    pub grid_spacing: Option<Vec<f64>>,
    /// Direction cosines, row-major `D x D`; identity if absent.
    pub grid_direction: Option<Vec<f64>>,
}

impl Default for BSplineTransformConfig {
    fn default() -> Self {
        Self {
            spline_order: SplineOrder::CUBIC.get(),
            grid_size: Vec::new(),
            grid_index: None,
            grid_origin: None,
            grid_spacing: None,
            grid_direction: None,
        }
    }
}

impl BSplineTransformConfig {
    /// Create a config with `grid_size` points per axis and default geometry.
    pub fn new(grid_size: Vec<usize>) -> Self {
        Self {
            grid_size,
            ..Self::default()
        }
    }

    /// Set the spline order.
    pub fn with_spline_order(mut self, order: usize) -> Self {
        self.spline_order = order;
        self
    }

    /// Set the first lattice index of the grid region.
    pub fn with_grid_index(mut self, index: Vec<i64>) -> Self {
        self.grid_index = Some(index);
        self
    }

    /// Set the grid origin.
    pub fn with_grid_origin(mut self, origin: Vec<f64>) -> Self {
        self.grid_origin = Some(origin);
        self
    }

    /// Set the grid spacing.
    pub fn with_grid_spacing(mut self, spacing: Vec<f64>) -> Self {
        self.grid_spacing = Some(spacing);
        self
    }

    /// Set the grid direction, row-major.
    pub fn with_grid_direction(mut self, direction: Vec<f64>) -> Self {
        self.grid_direction = Some(direction);
        self
    }

    pub fn order(&self) -> Result<SplineOrder> {
        SplineOrder::new(self.spline_order)
    }

    /// Validated lattice of dimension `D`.
    pub fn lattice<const D: usize>(&self) -> Result<Lattice<D>> {
        let size: [usize; D] = fixed(&self.grid_size, D)?;
        let index: [i64; D] = match &self.grid_index {
            Some(index) => fixed(index, D)?,
            None => [0; D],
        };
        let origin = match &self.grid_origin {
            Some(origin) => Point::from(fixed::<f64, D>(origin, D)?),
            None => Point::origin(),
        };
        let spacing = match &self.grid_spacing {
            Some(spacing) => Spacing::from(fixed::<f64, D>(spacing, D)?),
            None => Spacing::repeat(1.0),
        };
        let direction = match &self.grid_direction {
            Some(direction) => {
                if direction.len() != D * D {
                    return Err(TransformError::dimension_mismatch(D * D, direction.len()));
                }
                Direction::from_row_slice(direction)
            }
            None => Direction::identity(),
        };
        Lattice::with_geometry(GridRegion::new(index, size), origin, spacing, direction)
    }

    /// Unbound transform over the configured lattice.
    pub fn build<'a, const D: usize>(&self) -> Result<BSplineDeformableTransform<'a, D>> {
        BSplineDeformableTransform::with_lattice(self.order()?, self.lattice::<D>()?)
    }
}

fn fixed<T: Copy, const D: usize>(values: &[T], expected: usize) -> Result<[T; D]> {
    <[T; D]>::try_from(values).map_err(|_| TransformError::dimension_mismatch(expected, values.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::AdvancedTransform;

    #[test]
    fn test_default_config() {
        let config = BSplineTransformConfig::default();
        assert_eq!(config.spline_order, 3);
        assert!(config.grid_size.is_empty());
    }

    #[test]
    fn test_build_with_geometry() {
        let config = BSplineTransformConfig::new(vec![6, 5])
            .with_spline_order(2)
            .with_grid_index(vec![-1, 0])
            .with_grid_origin(vec![10.0, -4.0])
            .with_grid_spacing(vec![2.0, 0.5])
            .with_grid_direction(vec![0.0, -1.0, 1.0, 0.0]);
        let transform = config.build::<2>().unwrap();
        assert_eq!(transform.spline_order(), SplineOrder::QUADRATIC);
        assert_eq!(transform.number_of_parameters(), 60);
        let lattice = transform.lattice();
        assert_eq!(lattice.region().index(), [-1, 0]);
        assert_eq!(lattice.origin(), &Point::<2>::new(10.0, -4.0));
        // Row-major: first row is (0, -1).
        assert_eq!(lattice.direction()[(0, 1)], -1.0);
        assert_eq!(lattice.direction()[(1, 0)], 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let config = BSplineTransformConfig::new(vec![4, 4, 4]);
        assert_eq!(
            config.lattice::<2>().unwrap_err(),
            TransformError::dimension_mismatch(2, 3)
        );

        let config = BSplineTransformConfig::new(vec![4, 4]).with_grid_direction(vec![1.0; 3]);
        assert_eq!(
            config.lattice::<2>().unwrap_err(),
            TransformError::dimension_mismatch(4, 3)
        );
    }

    #[test]
    fn test_invalid_order_and_geometry() {
        let config = BSplineTransformConfig::new(vec![8, 8]).with_spline_order(5);
        assert!(matches!(
            config.build::<2>(),
            Err(TransformError::InvalidConfiguration(_))
        ));

        let config = BSplineTransformConfig::new(vec![8, 8]).with_grid_spacing(vec![1.0, 0.0]);
        assert!(config.build::<2>().is_err());

        let config = BSplineTransformConfig::new(vec![3, 8]);
        assert!(config.build::<2>().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = BSplineTransformConfig::new(vec![7, 7, 7])
            .with_spline_order(1)
            .with_grid_spacing(vec![1.5, 1.5, 3.0]);
        let json = serde_json::to_string(&config).unwrap();
        let restored: BSplineTransformConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_json_missing_fields_use_defaults() {
        let config: BSplineTransformConfig = serde_json::from_str(r#"{"grid_size": [5, 5]}"#).unwrap();
        assert_eq!(config.spline_order, 3);
        assert_eq!(config.grid_index, None);
        assert!(config.build::<2>().is_ok());
    }
}
