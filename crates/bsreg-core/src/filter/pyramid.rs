use burn::tensor::backend::Backend;

use super::downsample::DownsampleFilter;
use super::gaussian::GaussianFilter;
use crate::error::{Result, SplineError};
use crate::image::Image;

/// Multi-resolution image pyramid.
///
/// Level 0 is the input image. Level `k + 1` is level `k` smoothed with a
/// Gaussian whose sigma equals the level-`k` spacing, then downsampled by two
/// along every axis.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Build a smoothed pyramid with `levels` levels.
    pub fn new(input: &Image<B, D>, levels: usize) -> Result<Self> {
        Self::build(input, levels, true)
    }

    /// Build a pyramid without smoothing, for binary masks.
    pub fn without_smoothing(input: &Image<B, D>, levels: usize) -> Result<Self> {
        Self::build(input, levels, false)
    }

    fn build(input: &Image<B, D>, levels: usize, smooth: bool) -> Result<Self> {
        if levels == 0 {
            return Err(SplineError::dimension_mismatch("pyramid needs at least one level"));
        }

        let downsampler = DownsampleFilter::new(vec![2; D]);
        let mut images = Vec::with_capacity(levels);
        images.push(input.clone());

        for level in 1..levels {
            let previous = &images[level - 1];
            let smoothed = if smooth {
                let sigmas = previous.spacing().iter().copied().collect();
                GaussianFilter::new(sigmas).apply(previous)?
            } else {
                previous.clone()
            };
            let next = downsampler.apply(&smoothed)?;
            tracing::debug!("Pyramid level {}: size {:?}", level, next.size());
            images.push(next);
        }

        Ok(Self { images })
    }

    /// Image at `level` (0 is full resolution).
    pub fn level(&self, level: usize) -> Option<&Image<B, D>> {
        self.images.get(level)
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.images.len()
    }

    /// Coarsest level.
    pub fn coarsest(&self) -> &Image<B, D> {
        &self.images[self.images.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn ramp(size: [usize; 2]) -> Image<Backend, 2> {
        let device = Default::default();
        let values = (0..size[0] * size[1]).map(|i| (i % size[0]) as f32).collect();
        Image::from_values(
            values,
            size,
            Point::from([-3.0, 4.0]),
            Spacing::from([1.0, 1.5]),
            Direction::identity(),
            &device,
        )
        .unwrap()
    }

    #[test]
    fn test_levels_halve_size() {
        let image = ramp([16, 12]);
        let pyramid = MultiResolutionPyramid::new(&image, 3).unwrap();
        assert_eq!(pyramid.levels(), 3);
        assert_eq!(pyramid.level(0).unwrap().size(), [16, 12]);
        assert_eq!(pyramid.level(1).unwrap().size(), [8, 6]);
        assert_eq!(pyramid.coarsest().size(), [4, 3]);
        assert_eq!(pyramid.coarsest().spacing()[0], 4.0);
        assert_eq!(pyramid.coarsest().spacing()[1], 6.0);
        assert_eq!(pyramid.coarsest().origin(), image.origin());
        assert!(pyramid.level(3).is_none());
    }

    #[test]
    fn test_mask_pyramid_keeps_values() {
        let device = Default::default();
        let mut values = vec![0.0f32; 8 * 8];
        for v in values.iter_mut().take(32) {
            *v = 1.0;
        }
        let mask = Image::<Backend, 2>::from_values(
            values,
            [8, 8],
            Point::from([0.0, 0.0]),
            Spacing::from([1.0, 1.0]),
            Direction::identity(),
            &device,
        )
        .unwrap();
        let pyramid = MultiResolutionPyramid::without_smoothing(&mask, 2).unwrap();
        let coarse = pyramid.coarsest().values();
        assert!(coarse.iter().all(|&v| v == 0.0 || v == 1.0));
        assert_eq!(coarse.iter().filter(|&&v| v == 1.0).count(), 8);
    }

    #[test]
    fn test_zero_levels_rejected() {
        assert!(MultiResolutionPyramid::new(&ramp([4, 4]), 0).is_err());
    }
}
