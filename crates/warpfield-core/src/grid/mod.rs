//! Control-point lattice model.
//!
//! This module provides the lattice geometry and the borrowed coefficient
//! views that together describe where control points live and what they hold.

pub mod region;
pub mod lattice;
pub mod coefficients;

pub use region::GridRegion;
pub use lattice::Lattice;
pub use coefficients::{CoefficientImage, CoefficientSource, CoefficientView};
