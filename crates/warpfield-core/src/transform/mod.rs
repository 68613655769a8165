//! Transform types and operations.
//!
//! This module provides the B-spline deformable transform, the bulk
//! transforms it can be composed with, the capability traits it implements,
//! and parallel batch evaluation.

pub mod trait_;
pub mod support;
pub mod bulk;
pub mod bspline;
pub mod batch;

pub use trait_::{AdvancedTransform, Transform, TransformedPoint};
pub use support::SupportRegionIndexer;
pub use bulk::{AffineBulkTransform, BulkTransform, TranslationBulkTransform};
pub use bspline::BSplineDeformableTransform;
pub use batch::{spatial_hessians, spatial_jacobians, transform_points};
