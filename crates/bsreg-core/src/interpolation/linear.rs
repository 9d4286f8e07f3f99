//! Linear interpolation (bilinear in 2D, trilinear in 3D).
//!
//! Indices outside the image are clamped to the border voxels.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use super::trait_::Interpolator;

/// Linear Interpolator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }

    /// Interpolate host-side values laid out x fastest.
    ///
    /// `size` is in `(x, y[, z])` order and `index` is a continuous index,
    /// clamped to `[0, size - 1]` per axis.
    pub fn sample<const D: usize>(&self, values: &[f64], size: &[usize; D], index: &[f64; D]) -> f64 {
        let mut lower = [0usize; D];
        let mut upper = [0usize; D];
        let mut frac = [0.0f64; D];
        for a in 0..D {
            let last = size[a] - 1;
            let c = index[a].clamp(0.0, last as f64);
            let f = c.floor();
            lower[a] = f as usize;
            upper[a] = (lower[a] + 1).min(last);
            frac[a] = c - f;
        }

        let mut result = 0.0;
        for corner in 0..(1usize << D) {
            let mut offset = 0;
            let mut stride = 1;
            let mut weight = 1.0;
            for a in 0..D {
                if corner & (1 << a) != 0 {
                    offset += upper[a] * stride;
                    weight *= frac[a];
                } else {
                    offset += lower[a] * stride;
                    weight *= 1.0 - frac[a];
                }
                stride *= size[a];
            }
            if weight != 0.0 {
                result += weight * values[offset];
            }
        }
        result
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape: [usize; D] = data.dims();
        let mut size = shape;
        size.reverse();
        let batch_size = indices.dims()[0];
        let device = indices.device();

        let flat_data = data.clone().reshape([shape.iter().product::<usize>()]);

        // Per-axis floor/ceil voxel indices and fractional weights.
        let mut lower: Vec<Tensor<B, 1, Int>> = Vec::with_capacity(D);
        let mut upper: Vec<Tensor<B, 1, Int>> = Vec::with_capacity(D);
        let mut frac: Vec<Tensor<B, 1>> = Vec::with_capacity(D);
        for (a, &extent) in size.iter().enumerate() {
            let last = (extent - 1) as f64;
            let c = indices.clone().narrow(1, a, 1).squeeze::<1>(1).clamp(0.0, last);
            let f = c.clone().floor();
            frac.push(c - f.clone());
            upper.push((f.clone() + 1.0).clamp(0.0, last).int());
            lower.push(f.int());
        }

        let mut strides = [1i32; D];
        for a in 1..D {
            strides[a] = strides[a - 1] * size[a - 1] as i32;
        }

        let mut result = Tensor::<B, 1>::zeros([batch_size], &device);
        for corner in 0..(1usize << D) {
            let mut offset = Tensor::<B, 1, Int>::zeros([batch_size], &device);
            let mut weight = Tensor::<B, 1>::ones([batch_size], &device);
            for a in 0..D {
                if corner & (1 << a) != 0 {
                    offset = offset + upper[a].clone() * strides[a];
                    weight = weight * frac[a].clone();
                } else {
                    offset = offset + lower[a].clone() * strides[a];
                    weight = weight * (frac[a].clone().neg() + 1.0);
                }
            }
            result = result + flat_data.clone().gather(0, offset) * weight;
        }
        result
    }
}
