//! Error types for binding and configuring deformation fields.
//!
//! Only binding and configuration mistakes are errors. A query point outside
//! the support of the lattice is ordinary data and is reported through the
//! `inside` flag of the query result instead.

use thiserror::Error;

/// Main error type for transform configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Grid region, geometry or spline order is unusable, or a binding was
    /// attempted in the wrong sequence.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A buffer or configuration vector has the wrong length.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Coefficient images do not share one lattice geometry.
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),
}

/// Result type for transform configuration.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }
}
