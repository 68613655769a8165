//! Rectangular index regions of the control-point lattice.

/// Axis-aligned block of lattice indices.
///
/// `index` is the first (minimum) lattice index along each axis and `size`
/// the number of lattice points along each axis. Flat buffers laid out over a
/// region run fastest along axis 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRegion<const D: usize> {
    index: [i64; D],
    size: [usize; D],
}

impl<const D: usize> GridRegion<D> {
    /// Create a region starting at `index` with `size` points per axis.
    pub fn new(index: [i64; D], size: [usize; D]) -> Self {
        Self { index, size }
    }

    /// Create a region starting at lattice index zero.
    pub fn from_size(size: [usize; D]) -> Self {
        Self { index: [0; D], size }
    }

    /// Region with no points.
    pub fn empty() -> Self {
        Self { index: [0; D], size: [0; D] }
    }

    /// First lattice index along each axis.
    pub fn index(&self) -> [i64; D] {
        self.index
    }

    /// Number of lattice points along each axis.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Total number of lattice points.
    pub fn number_of_points(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_points() == 0
    }

    /// Last lattice index along `axis`.
    pub fn upper_index(&self, axis: usize) -> i64 {
        self.index[axis] + self.size[axis] as i64 - 1
    }

    /// Strides of the flat buffer layout, axis 0 fastest.
    pub fn strides(&self) -> [usize; D] {
        let mut strides = [1usize; D];
        for j in 1..D {
            strides[j] = strides[j - 1] * self.size[j - 1];
        }
        strides
    }
}

impl<const D: usize> Default for GridRegion<D> {
    fn default() -> Self {
        Self::empty()
    }
}
