pub mod geometry;
pub mod error;
pub mod config;
pub mod grid;
pub mod weights;
pub mod transform;

pub use config::BSplineTransformConfig;
pub use error::{Result, TransformError};
pub use geometry::{Point, Vector, Spacing, Direction};
pub use grid::{CoefficientImage, GridRegion, Lattice};
pub use transform::{AdvancedTransform, BSplineDeformableTransform, BulkTransform};
pub use weights::{EvaluationContext, SplineOrder};
