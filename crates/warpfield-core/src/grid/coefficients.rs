//! Borrowed views of B-spline coefficients.
//!
//! Coefficients are never copied. A flat parameter buffer of length
//! `D * points` is reinterpreted as `D` consecutive scalar fields laid out
//! over the lattice region, or `D` separate coefficient images are borrowed
//! directly. Either way the caller keeps the memory alive and unchanged for
//! the lifetime `'a`.

use super::lattice::Lattice;
use crate::error::{Result, TransformError};

/// Tolerance used when comparing the geometry of coefficient images.
const GEOMETRY_TOLERANCE: f64 = 1e-9;

/// One scalar coefficient field over a lattice.
#[derive(Debug, Clone)]
pub struct CoefficientImage<'a, const D: usize> {
    lattice: Lattice<D>,
    data: &'a [f64],
}

impl<'a, const D: usize> CoefficientImage<'a, D> {
    /// Borrow `data` as a scalar field over `lattice`.
    ///
    /// The buffer must hold exactly one value per lattice point, axis 0
    /// fastest.
    pub fn new(lattice: Lattice<D>, data: &'a [f64]) -> Result<Self> {
        let expected = lattice.number_of_points();
        if data.len() != expected {
            return Err(TransformError::geometry_mismatch(format!(
                "coefficient image holds {} values but its region has {} points",
                data.len(),
                expected
            )));
        }
        Ok(Self { lattice, data })
    }

    pub fn lattice(&self) -> &Lattice<D> {
        &self.lattice
    }

    pub fn data(&self) -> &'a [f64] {
        self.data
    }
}

/// Where the bound coefficients came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientSource {
    Parameters,
    Images,
}

/// `D` read-only coefficient fields sharing one lattice.
#[derive(Debug, Clone, Copy)]
pub struct CoefficientView<'a, const D: usize> {
    fields: [&'a [f64]; D],
    source: CoefficientSource,
}

impl<'a, const D: usize> CoefficientView<'a, D> {
    /// Split a flat parameter buffer into `D` fields of `points` values each.
    pub fn from_parameters(parameters: &'a [f64], points: usize) -> Result<Self> {
        let expected = D * points;
        if parameters.len() != expected {
            return Err(TransformError::dimension_mismatch(expected, parameters.len()));
        }
        let fields = std::array::from_fn(move |d| &parameters[d * points..(d + 1) * points]);
        Ok(Self {
            fields,
            source: CoefficientSource::Parameters,
        })
    }

    /// Borrow `D` coefficient images that must share one geometry.
    pub fn from_images(images: &[CoefficientImage<'a, D>; D]) -> Result<Self> {
        let Some(reference) = images.first() else {
            return Err(TransformError::invalid_configuration(
                "zero-dimensional coefficient images",
            ));
        };
        for (d, image) in images.iter().enumerate().skip(1) {
            if !image.lattice.same_geometry(&reference.lattice, GEOMETRY_TOLERANCE) {
                return Err(TransformError::geometry_mismatch(format!(
                    "coefficient image {} differs from image 0 in region, spacing, origin or direction",
                    d
                )));
            }
        }
        Ok(Self {
            fields: std::array::from_fn(|d| images[d].data),
            source: CoefficientSource::Images,
        })
    }

    /// Coefficient field for output dimension `dimension`.
    #[inline]
    pub fn field(&self, dimension: usize) -> &'a [f64] {
        self.fields[dimension]
    }

    pub fn source(&self) -> CoefficientSource {
        self.source
    }

    /// Number of lattice points per field.
    pub fn points_per_dimension(&self) -> usize {
        self.fields.first().map_or(0, |f| f.len())
    }
}
