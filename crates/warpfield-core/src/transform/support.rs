//! Mapping of support regions to flat parameter indices.
//!
//! Boundary policy: reject. The engine only asks for indices of support
//! regions that lie completely inside the grid region, a condition decided on
//! the same integer start index that is enumerated here. Floating-point edge
//! coordinates therefore never produce indices past the last lattice point,
//! and no clamping takes place.

use crate::grid::GridRegion;
use crate::weights::SupportRegion;

/// Converts support regions into dimension-0 parameter indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportRegionIndexer<const D: usize> {
    region: GridRegion<D>,
    strides: [usize; D],
    /// Flat offset of every support entry relative to the support start.
    relative: Vec<usize>,
}

impl<const D: usize> SupportRegionIndexer<D> {
    /// Build an indexer for `region` and the weight enumeration `offsets`.
    pub fn new(region: GridRegion<D>, offsets: &[[usize; D]]) -> Self {
        let strides = region.strides();
        let relative = offsets
            .iter()
            .map(|offset| (0..D).map(|j| offset[j] * strides[j]).sum())
            .collect();
        Self {
            region,
            strides,
            relative,
        }
    }

    /// Whether the whole support region lies inside the grid region.
    pub fn is_inside(&self, support: &SupportRegion<D>) -> bool {
        (0..D).all(|j| {
            support.start[j] >= self.region.index()[j]
                && support.upper_index(j) <= self.region.upper_index(j)
        })
    }

    /// Flat offset of every support entry relative to the support start,
    /// aligned with the weight enumeration.
    pub fn relative_offsets(&self) -> &[usize] {
        &self.relative
    }

    /// Flat parameter index of the support start.
    ///
    /// `support` must satisfy [`is_inside`](Self::is_inside).
    pub fn base_offset(&self, support: &SupportRegion<D>) -> usize {
        debug_assert!(self.is_inside(support));
        (0..D)
            .map(|j| (support.start[j] - self.region.index()[j]) as usize * self.strides[j])
            .sum()
    }

    /// Write the dimension-0 parameter indices of `support` into `indices`,
    /// in the enumeration order of the weights.
    ///
    /// `support` must satisfy [`is_inside`](Self::is_inside).
    pub fn compute_indices(&self, support: &SupportRegion<D>, indices: &mut [usize]) {
        debug_assert_eq!(indices.len(), self.relative.len());
        let base = self.base_offset(support);
        for (index, relative) in indices.iter_mut().zip(&self.relative) {
            *index = base + relative;
        }
    }

    /// Write the full nonzero parameter index list, dimension blocks
    /// concatenated, given the dimension-0 indices.
    pub fn expand_to_all_dimensions(&self, base: &[usize], all: &mut Vec<usize>) {
        let points = self.region.number_of_points();
        all.clear();
        all.extend((0..D).flat_map(|d| base.iter().map(move |&i| i + d * points)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{BSplineWeights, SplineOrder};

    fn indexer(region: GridRegion<2>, order: SplineOrder) -> SupportRegionIndexer<2> {
        SupportRegionIndexer::new(region, BSplineWeights::<2>::new(order).offsets())
    }

    #[test]
    fn test_indices_follow_weight_order() {
        let indexer = indexer(GridRegion::from_size([5, 4]), SplineOrder::LINEAR);
        let support = SupportRegion { start: [2, 1], size: 2 };
        let mut indices = vec![0; 4];
        indexer.compute_indices(&support, &mut indices);
        // (2,1), (3,1), (2,2), (3,2) on a row length of 5
        assert_eq!(indices, vec![7, 8, 12, 13]);
    }

    #[test]
    fn test_indices_with_region_offset() {
        let indexer = indexer(GridRegion::new([-1, -1], [4, 4]), SplineOrder::LINEAR);
        let support = SupportRegion { start: [-1, -1], size: 2 };
        let mut indices = vec![0; 4];
        indexer.compute_indices(&support, &mut indices);
        assert_eq!(indices, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_inside_rejects_partial_support() {
        let indexer = indexer(GridRegion::from_size([4, 4]), SplineOrder::CUBIC);
        assert!(indexer.is_inside(&SupportRegion { start: [0, 0], size: 4 }));
        assert!(!indexer.is_inside(&SupportRegion { start: [1, 0], size: 4 }));
        assert!(!indexer.is_inside(&SupportRegion { start: [0, -1], size: 4 }));
    }

    #[test]
    fn test_expand_to_all_dimensions() {
        let indexer = indexer(GridRegion::from_size([3, 3]), SplineOrder::CONSTANT);
        let mut all = Vec::new();
        indexer.expand_to_all_dimensions(&[4], &mut all);
        assert_eq!(all, vec![4, 13]);
    }
}
