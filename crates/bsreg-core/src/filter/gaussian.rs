use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor};

use crate::error::Result;
use crate::image::Image;
use crate::spatial::Spacing;

/// Gaussian smoothing filter.
///
/// Separable 1D convolutions along each axis, with the standard deviation
/// given in physical units so anisotropic spacing is respected.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter.
    ///
    /// # Arguments
    /// * `sigmas` - Standard deviation per axis `(x, y[, z])` in physical
    ///   units. A single value applies to every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 33,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        image.with_data(data)
    }

    /// Apply the filter to a tensor laid out slowest axis first.
    ///
    /// # Arguments
    /// * `input` - Input tensor
    /// * `spacing` - Physical spacing in `(x, y[, z])` order
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for dim in 0..D {
            // Tensor dimension `dim` holds image axis `D - 1 - dim`.
            let axis = D - 1 - dim;
            let sigma = self.sigmas.get(axis).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 {
                continue;
            }

            let pixel_sigma = sigma / spacing[axis];
            let max_radius = (self.max_kernel_width - 1) / 2;
            let radius = ((3.0 * pixel_sigma).ceil() as usize).min(max_radius);
            if radius == 0 {
                continue;
            }

            let kernel = Self::generate_kernel(pixel_sigma, radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = Self::convolve_1d::<D>(data, kernel_tensor, dim);
        }
        data
    }

    fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
        let two_sigma2 = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (0..=2 * radius)
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-x * x / two_sigma2).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.iter().map(|v| (v / sum) as f32).collect()
    }

    fn convolve_1d<const D: usize>(input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = input.dims();

        // Move the filtered dimension last and fold the rest into the batch.
        let mut permutation = [0isize; D];
        let mut next = 0;
        for i in (0..D).filter(|&i| i != dim) {
            permutation[next] = i as isize;
            next += 1;
        }
        permutation[D - 1] = dim as isize;

        let length = dims[dim];
        let batch: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
        let reshaped = input.permute(permutation).reshape([batch, 1, length]);

        let kernel_size = kernel.dims()[0];
        let kernel = kernel.reshape([1, 1, kernel_size]);
        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let output = burn::tensor::module::conv1d(reshaped, kernel, None, options);

        let mut permuted_shape = [0usize; D];
        for (p, &i) in permutation.iter().enumerate() {
            permuted_shape[p] = dims[i as usize];
        }
        let output = output.reshape(Shape::new(permuted_shape));

        let mut inverse = [0isize; D];
        for (new_pos, &old_pos) in permutation.iter().enumerate() {
            inverse[old_pos as usize] = new_pos as isize;
        }
        output.permute(inverse)
    }
}
