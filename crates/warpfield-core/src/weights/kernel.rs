//! One-dimensional centred B-spline kernels.
//!
//! The kernel of order `n` is supported on `(-(n+1)/2, (n+1)/2)`. Derivatives
//! are obtained from lower-order kernels:
//!
//! - `β'_n(u)  = β_{n-1}(u + 1/2) - β_{n-1}(u - 1/2)`
//! - `β''_n(u) = β_{n-2}(u + 1) - 2 β_{n-2}(u) + β_{n-2}(u - 1)`
//!
//! so a derivative of an order the spline cannot carry is exactly zero.

use crate::error::{Result, TransformError};

/// Largest supported spline order.
pub const MAX_SPLINE_ORDER: usize = 3;

/// Largest number of control points along one axis of a support region.
pub const MAX_SUPPORT_SIZE: usize = MAX_SPLINE_ORDER + 1;

/// Validated B-spline order in `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SplineOrder(usize);

impl SplineOrder {
    pub const CONSTANT: Self = Self(0);
    pub const LINEAR: Self = Self(1);
    pub const QUADRATIC: Self = Self(2);
    pub const CUBIC: Self = Self(3);

    pub fn new(order: usize) -> Result<Self> {
        if order > MAX_SPLINE_ORDER {
            return Err(TransformError::invalid_configuration(format!(
                "spline order {} is not supported (0..={})",
                order, MAX_SPLINE_ORDER
            )));
        }
        Ok(Self(order))
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Control points per axis with nonzero basis value at a point.
    pub fn support_size(self) -> usize {
        self.0 + 1
    }

    /// Offset subtracted from a continuous index before flooring it to the
    /// first index of the support region.
    pub(crate) fn start_offset(self) -> f64 {
        (self.0 as f64 - 1.0) / 2.0
    }
}

impl Default for SplineOrder {
    fn default() -> Self {
        Self::CUBIC
    }
}

impl std::fmt::Display for SplineOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// B-spline kernel value.
///
/// Order 0 is the half-open box `[-1/2, 1/2)`, which keeps the partition of
/// unity exact at half-integer coordinates.
pub fn value(order: usize, u: f64) -> f64 {
    let a = u.abs();
    match order {
        0 => {
            if (-0.5..0.5).contains(&u) {
                1.0
            } else {
                0.0
            }
        }
        1 => {
            if a < 1.0 {
                1.0 - a
            } else {
                0.0
            }
        }
        2 => {
            if a < 0.5 {
                0.75 - a * a
            } else if a < 1.5 {
                (9.0 - 12.0 * a + 4.0 * a * a) / 8.0
            } else {
                0.0
            }
        }
        3 => {
            if a < 1.0 {
                (4.0 - 6.0 * a * a + 3.0 * a * a * a) / 6.0
            } else if a < 2.0 {
                let t = 2.0 - a;
                t * t * t / 6.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// First derivative of the kernel of the given order.
pub fn derivative(order: usize, u: f64) -> f64 {
    if order == 0 {
        return 0.0;
    }
    value(order - 1, u + 0.5) - value(order - 1, u - 0.5)
}

/// Second derivative of the kernel of the given order.
pub fn second_derivative(order: usize, u: f64) -> f64 {
    if order < 2 {
        return 0.0;
    }
    value(order - 2, u + 1.0) - 2.0 * value(order - 2, u) + value(order - 2, u - 1.0)
}

/// Kernel values and derivatives along one axis of a support region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBasis {
    pub value: [f64; MAX_SUPPORT_SIZE],
    pub first: [f64; MAX_SUPPORT_SIZE],
    pub second: [f64; MAX_SUPPORT_SIZE],
}

impl AxisBasis {
    pub const fn zeros() -> Self {
        Self {
            value: [0.0; MAX_SUPPORT_SIZE],
            first: [0.0; MAX_SUPPORT_SIZE],
            second: [0.0; MAX_SUPPORT_SIZE],
        }
    }

    /// Fill the basis for continuous coordinate `x` and support start `start`.
    ///
    /// Entry `k` belongs to the control point at `start + k`.
    pub fn evaluate(&mut self, order: SplineOrder, x: f64, start: i64, derivatives: DerivativeOrder) {
        let n = order.get();
        for k in 0..order.support_size() {
            let u = x - (start + k as i64) as f64;
            self.value[k] = value(n, u);
            if derivatives >= DerivativeOrder::First {
                self.first[k] = derivative(n, u);
            }
            if derivatives >= DerivativeOrder::Second {
                self.second[k] = second_derivative(n, u);
            }
        }
    }
}

impl Default for AxisBasis {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Highest derivative a query needs from the 1-D kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivativeOrder {
    Value,
    First,
    Second,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_spline_order_validation() {
        assert_eq!(SplineOrder::new(3).unwrap(), SplineOrder::CUBIC);
        assert!(matches!(
            SplineOrder::new(4),
            Err(TransformError::InvalidConfiguration(_))
        ));
        assert_eq!(SplineOrder::CUBIC.support_size(), 4);
        assert_eq!(SplineOrder::default(), SplineOrder::CUBIC);
    }

    #[test]
    fn test_cubic_values() {
        assert!((value(3, 0.0) - 2.0 / 3.0).abs() < EPS);
        assert!((value(3, 1.0) - 1.0 / 6.0).abs() < EPS);
        assert!((value(3, 0.5) - 23.0 / 48.0).abs() < EPS);
        assert!((value(3, 1.5) - 1.0 / 48.0).abs() < EPS);
        assert_eq!(value(3, 2.0), 0.0);
        assert_eq!(value(3, -2.5), 0.0);
        assert!((value(3, 0.7) - value(3, -0.7)).abs() < EPS);
    }

    #[test]
    fn test_quadratic_continuity() {
        let left = value(2, 0.5 - 1e-12);
        let right = value(2, 0.5 + 1e-12);
        assert!((left - right).abs() < 1e-9);
        assert!((value(2, 0.5) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_constant_kernel_half_open() {
        assert_eq!(value(0, -0.5), 1.0);
        assert_eq!(value(0, 0.5), 0.0);
        assert_eq!(value(0, 0.0), 1.0);
    }

    #[test]
    fn test_cubic_derivative_matches_closed_form() {
        for &u in &[-1.7f64, -1.2, -0.6, -0.1, 0.0, 0.3, 0.9, 1.4, 1.9] {
            let a = u.abs();
            let expected = if a < 1.0 {
                -2.0 * u + 1.5 * u * a
            } else {
                -u.signum() * (2.0 - a) * (2.0 - a) / 2.0
            };
            assert!((derivative(3, u) - expected).abs() < EPS, "u = {}", u);
        }
    }

    #[test]
    fn test_derivatives_vs_finite_differences() {
        let h = 1e-6;
        for order in 1..=3 {
            for &u in &[-1.3, -0.8, -0.2, 0.15, 0.6, 1.1] {
                let fd = (value(order, u + h) - value(order, u - h)) / (2.0 * h);
                assert!((derivative(order, u) - fd).abs() < 1e-6, "order {} u {}", order, u);
            }
        }
        for &u in &[-1.6, -0.9, -0.3, 0.2, 0.7, 1.3] {
            let fd = (derivative(3, u + h) - derivative(3, u - h)) / (2.0 * h);
            assert!((second_derivative(3, u) - fd).abs() < 1e-5, "u {}", u);
        }
    }

    #[test]
    fn test_low_order_derivatives_are_zero() {
        for &u in &[-0.4, 0.0, 0.3] {
            assert_eq!(derivative(0, u), 0.0);
            assert_eq!(second_derivative(0, u), 0.0);
            assert_eq!(second_derivative(1, u), 0.0);
        }
    }

    #[test]
    fn test_axis_basis_partition_of_unity() {
        for order in 0..=3 {
            let order = SplineOrder::new(order).unwrap();
            let x = 2.37;
            let start = (x - order.start_offset()).floor() as i64;
            let mut basis = AxisBasis::zeros();
            basis.evaluate(order, x, start, DerivativeOrder::Second);
            let n = order.support_size();
            let sum: f64 = basis.value[..n].iter().sum();
            let first: f64 = basis.first[..n].iter().sum();
            let second: f64 = basis.second[..n].iter().sum();
            assert!((sum - 1.0).abs() < EPS, "order {}", order);
            assert!(first.abs() < EPS, "order {}", order);
            assert!(second.abs() < EPS, "order {}", order);
        }
    }
}
