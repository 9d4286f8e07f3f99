//! Axis-aligned index regions.

/// Box of voxel indices `[index, index + size)` in `(x, y[, z])` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<const D: usize> {
    index: [usize; D],
    size: [usize; D],
}

impl<const D: usize> Region<D> {
    pub fn new(index: [usize; D], size: [usize; D]) -> Self {
        Self { index, size }
    }

    /// Region starting at the first voxel.
    pub fn from_size(size: [usize; D]) -> Self {
        Self {
            index: [0; D],
            size,
        }
    }

    /// Region spanning the inclusive corner indices `lower ..= upper`.
    pub fn from_bounds(lower: [usize; D], upper: [usize; D]) -> Option<Self> {
        if lower.iter().zip(&upper).any(|(l, u)| l > u) {
            return None;
        }
        Some(Self {
            index: lower,
            size: std::array::from_fn(|a| upper[a] - lower[a] + 1),
        })
    }

    pub fn index(&self) -> [usize; D] {
        self.index
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Exclusive upper corner.
    pub fn upper(&self) -> [usize; D] {
        std::array::from_fn(|a| self.index[a] + self.size[a])
    }

    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size.iter().any(|&s| s == 0)
    }

    pub fn contains(&self, index: &[usize; D]) -> bool {
        (0..D).all(|a| index[a] >= self.index[a] && index[a] < self.index[a] + self.size[a])
    }

    /// Whether the region lies inside an image of the given size.
    pub fn is_inside(&self, image_size: &[usize; D]) -> bool {
        (0..D).all(|a| self.index[a] + self.size[a] <= image_size[a])
    }

    /// Overlap of two regions, `None` when they do not intersect.
    pub fn intersect(&self, other: &Region<D>) -> Option<Region<D>> {
        let lower: [usize; D] = std::array::from_fn(|a| self.index[a].max(other.index[a]));
        let upper: [usize; D] = std::array::from_fn(|a| self.upper()[a].min(other.upper()[a]));
        if (0..D).any(|a| upper[a] <= lower[a]) {
            return None;
        }
        Some(Self {
            index: lower,
            size: std::array::from_fn(|a| upper[a] - lower[a]),
        })
    }

    /// Linear offset of `index` inside an image of `image_size`, x fastest.
    pub fn linear_offset(index: &[usize; D], image_size: &[usize; D]) -> usize {
        (0..D).rev().fold(0, |acc, a| acc * image_size[a] + index[a])
    }

    /// Position of `index` in this region's own iteration order.
    pub fn local_offset(&self, index: &[usize; D]) -> usize {
        (0..D)
            .rev()
            .fold(0, |acc, a| acc * self.size[a] + (index[a] - self.index[a]))
    }

    /// Iterate voxel indices with x fastest.
    pub fn iter(&self) -> RegionIter<D> {
        RegionIter {
            region: *self,
            next: if self.is_empty() { None } else { Some(self.index) },
        }
    }
}

impl<const D: usize> IntoIterator for &Region<D> {
    type Item = [usize; D];
    type IntoIter = RegionIter<D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the voxel indices of a [`Region`].
#[derive(Debug, Clone)]
pub struct RegionIter<const D: usize> {
    region: Region<D>,
    next: Option<[usize; D]>,
}

impl<const D: usize> Iterator for RegionIter<D> {
    type Item = [usize; D];

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut following = current;
        let upper = self.region.upper();
        self.next = None;
        for a in 0..D {
            following[a] += 1;
            if following[a] < upper[a] {
                self.next = Some(following);
                break;
            }
            following[a] = self.region.index[a];
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_order() {
        let region = Region::new([1, 2], [2, 2]);
        let visited: Vec<[usize; 2]> = region.iter().collect();
        assert_eq!(visited, vec![[1, 2], [2, 2], [1, 3], [2, 3]]);
        for (i, index) in visited.iter().enumerate() {
            assert_eq!(region.local_offset(index), i);
        }
    }

    #[test]
    fn test_empty_region() {
        let region = Region::new([0, 0, 0], [3, 0, 2]);
        assert!(region.is_empty());
        assert_eq!(region.iter().count(), 0);
    }

    #[test]
    fn test_intersect() {
        let a = Region::new([0, 0], [4, 4]);
        let b = Region::new([2, 3], [5, 5]);
        assert_eq!(a.intersect(&b), Some(Region::new([2, 3], [2, 1])));
        let c = Region::new([4, 0], [1, 1]);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_bounds_and_offsets() {
        let region = Region::from_bounds([1, 1, 1], [2, 3, 1]).unwrap();
        assert_eq!(region.size(), [2, 3, 1]);
        assert_eq!(region.num_voxels(), 6);
        assert!(Region::from_bounds([2, 0], [1, 0]).is_none());
        assert_eq!(Region::linear_offset(&[1, 2, 3], &[4, 5, 6]), 1 + 4 * (2 + 5 * 3));
        assert!(region.is_inside(&[3, 4, 2]));
        assert!(!region.is_inside(&[3, 3, 2]));
        assert!(region.contains(&[2, 3, 1]));
        assert!(!region.contains(&[0, 3, 1]));
    }
}
