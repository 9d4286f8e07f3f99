use std::ops::Range;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;
use crate::image::Image;

/// Image derivative filter.
///
/// Central differences in index space (one-sided on the borders), converted
/// to derivatives along the physical axes:
/// `grad_physical = Direction^-T * (grad_index / spacing)`.
pub struct GradientImageFilter<B: Backend> {
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> Default for GradientImageFilter<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> GradientImageFilter<B> {
    pub fn new() -> Self {
        Self {
            _b: std::marker::PhantomData,
        }
    }

    /// Compute one derivative image per physical axis `(x, y[, z])`.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Vec<Image<B, D>>> {
        let index_gradients: Vec<Tensor<B, D>> = (0..D)
            .map(|axis| Self::index_difference(image.data().clone(), D - 1 - axis))
            .collect();

        let inverse = image.inverse_direction();
        let spacing = image.spacing();
        (0..D)
            .map(|j| {
                // d/dp_j = sum_a (D^-1)[a, j] / s_a * d/di_a
                let mut derivative = index_gradients[0].clone().mul_scalar(inverse[(0, j)] / spacing[0]);
                for a in 1..D {
                    derivative = derivative + index_gradients[a].clone().mul_scalar(inverse[(a, j)] / spacing[a]);
                }
                image.with_data(derivative)
            })
            .collect()
    }

    /// Finite difference along tensor dimension `dim`.
    fn index_difference<const D: usize>(data: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = data.dims();
        let n = dims[dim];
        if n < 2 {
            return data.zeros_like();
        }

        let along = |range: Range<usize>| -> Tensor<B, D> {
            let mut ranges: [Range<usize>; D] = std::array::from_fn(|i| 0..dims[i]);
            ranges[dim] = range;
            data.clone().slice(ranges)
        };

        let first = along(1..2) - along(0..1);
        let last = along(n - 1..n) - along(n - 2..n - 1);
        if n == 2 {
            return Tensor::cat(vec![first, last], dim);
        }
        let interior = (along(2..n) - along(0..n - 2)).mul_scalar(0.5);
        Tensor::cat(vec![first, interior, last], dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_linear_ramp_gradient() {
        let device = Default::default();
        // f = 3x - 2y + xy on a 6 x 5 grid, spacing (0.5, 2.0)
        let (nx, ny) = (6, 5);
        let mut values = Vec::with_capacity(nx * ny);
        for y in 0..ny {
            for x in 0..nx {
                let (px, py) = (x as f32 * 0.5, y as f32 * 2.0);
                values.push(3.0 * px - 2.0 * py + px * py);
            }
        }
        let image = Image::<Backend, 2>::from_values(
            values,
            [nx, ny],
            Point::from([0.0, 0.0]),
            Spacing::from([0.5, 2.0]),
            Direction::identity(),
            &device,
        )
        .unwrap();

        let gradients = GradientImageFilter::new().apply(&image).unwrap();
        assert_eq!(gradients.len(), 2);
        let gx = gradients[0].values();
        let gy = gradients[1].values();
        for y in 0..ny {
            for x in 0..nx {
                let (px, py) = (x as f64 * 0.5, y as f64 * 2.0);
                let i = y * nx + x;
                assert!((gx[i] - (3.0 + py)).abs() < 1e-4, "gx at ({}, {})", x, y);
                assert!((gy[i] - (-2.0 + px)).abs() < 1e-4, "gy at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_rotated_direction() {
        let device = Default::default();
        // Image axes swapped: index x runs along physical y.
        let direction = Direction::<2>::new(0.0, 1.0, 1.0, 0.0);
        let values: Vec<f32> = (0..16).map(|i| (i % 4) as f32).collect();
        let image = Image::<Backend, 2>::from_values(
            values,
            [4, 4],
            Point::from([0.0, 0.0]),
            Spacing::from([1.0, 1.0]),
            direction,
            &device,
        )
        .unwrap();
        let gradients = GradientImageFilter::new().apply(&image).unwrap();
        assert!(gradients[0].values().iter().all(|v| v.abs() < 1e-6));
        assert!(gradients[1].values().iter().all(|v| (v - 1.0).abs() < 1e-6));
    }
}
