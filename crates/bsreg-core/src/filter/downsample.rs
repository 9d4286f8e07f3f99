use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::error::Result;
use crate::image::Image;

/// Downsample filter.
///
/// Keeps every Nth voxel along each axis, starting at index 0, so the origin
/// is unchanged and the spacing is multiplied by the factor.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    /// Create a new downsample filter.
    ///
    /// # Arguments
    /// * `factors` - Factor per axis `(x, y[, z])`; a single value applies to
    ///   every axis. Factors of 0 or 1 leave the axis untouched.
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let mut data = image.data().clone();
        let device = data.device();
        let shape = image.shape();
        let mut spacing = *image.spacing();

        for axis in 0..D {
            let factor = self.factors.get(axis).or(self.factors.first()).copied().unwrap_or(1);
            if factor <= 1 {
                continue;
            }

            let dim = D - 1 - axis;
            let kept: Vec<i32> = (0..shape[dim]).step_by(factor).map(|i| i as i32).collect();
            let indices = Tensor::<B, 1, Int>::from_ints(kept.as_slice(), &device);
            data = data.select(dim, indices);
            spacing[axis] *= factor as f64;
        }

        Image::new(data, *image.origin(), spacing, *image.direction())
    }
}
