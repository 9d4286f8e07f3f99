//! Resampling of a moving image through a B-spline deformation.
//!
//! Spline parameters are physical coordinates of the reference image: a
//! reference voxel is mapped to its physical position, deformed by the
//! spline, converted to a continuous index of the moving image and sampled
//! with linear interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use bsreg_core::image::generate_grid;
use bsreg_core::interpolation::{Interpolator, LinearInterpolator};
use bsreg_core::spline::BasisEvaluation;
use bsreg_core::transform::Transform;
use bsreg_core::{BSpline, Image, Point, Region, SplineError};

use crate::error::Result;
use crate::validation::validate_mask_geometry;

/// Mask values at or above this count as inside the mask.
pub const MASK_THRESHOLD: f64 = 0.5;

/// Deformed moving image (and mask) in reference geometry.
#[derive(Debug, Clone)]
pub struct SampledImage<B: Backend, const D: usize> {
    pub image: Image<B, D>,
    pub mask: Option<Image<B, D>>,
}

/// Per-voxel spline evaluation data from one resampling pass.
///
/// Entry `i` belongs to the `i`-th voxel of [`BasisCache::region`] in its
/// iteration order (x fastest).
#[derive(Debug, Clone)]
pub struct BasisCache<const D: usize> {
    region: Region<D>,
    degrees: [usize; D],
    basis_stride: usize,
    spans: Vec<[usize; D]>,
    basis: Vec<f64>,
    moving_indices: Vec<[f64; D]>,
    in_bounds: Vec<[bool; D]>,
    values: Vec<f64>,
    mask_values: Option<Vec<f64>>,
}

impl<const D: usize> BasisCache<D> {
    fn with_capacity(region: Region<D>, degrees: [usize; D], masked: bool) -> Self {
        let n = region.num_voxels();
        let basis_stride = degrees.iter().map(|p| p + 1).sum();
        Self {
            region,
            degrees,
            basis_stride,
            spans: Vec::with_capacity(n),
            basis: Vec::with_capacity(n * basis_stride),
            moving_indices: Vec::with_capacity(n),
            in_bounds: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            mask_values: masked.then(|| Vec::with_capacity(n)),
        }
    }

    pub fn region(&self) -> &Region<D> {
        &self.region
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn span(&self, voxel: usize) -> &[usize; D] {
        &self.spans[voxel]
    }

    /// Non-zero basis values of `voxel` along `axis`.
    pub fn basis(&self, voxel: usize, axis: usize) -> &[f64] {
        let start = voxel * self.basis_stride
            + self.degrees[..axis].iter().map(|p| p + 1).sum::<usize>();
        &self.basis[start..=start + self.degrees[axis]]
    }

    /// Clamped continuous index into the moving image.
    pub fn moving_index(&self, voxel: usize) -> &[f64; D] {
        &self.moving_indices[voxel]
    }

    /// Per axis, whether the deformed index of `voxel` fell inside the
    /// moving image before clamping. Clamped axes do not move with the
    /// control points.
    pub fn in_bounds(&self, voxel: usize) -> &[bool; D] {
        &self.in_bounds[voxel]
    }

    /// Deformed moving image values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Deformed mask values, when a mask is configured.
    pub fn mask_values(&self) -> Option<&[f64]> {
        self.mask_values.as_deref()
    }

    pub fn is_masked(&self) -> bool {
        self.mask_values.is_some()
    }

    /// Whether `voxel` takes part in the cost.
    pub fn is_inlier(&self, voxel: usize) -> bool {
        self.mask_values
            .as_ref()
            .map_or(true, |mask| mask[voxel] >= MASK_THRESHOLD)
    }

    /// Tensor-product basis weight of control point `index` at `voxel`, zero
    /// outside its support.
    pub fn weight_of(&self, voxel: usize, index: &[usize; D]) -> f64 {
        let span = &self.spans[voxel];
        let mut weight = 1.0;
        for axis in 0..D {
            let first = span[axis] - self.degrees[axis];
            if index[axis] < first || index[axis] > span[axis] {
                return 0.0;
            }
            weight *= self.basis(voxel, axis)[index[axis] - first];
        }
        weight
    }
}

/// Resamples a moving image through a [`BSpline`] deformation.
#[derive(Debug, Clone)]
pub struct DeformationSampler<B: Backend, const D: usize> {
    spline: BSpline<D>,
    moving: Image<B, D>,
    moving_values: Vec<f64>,
    mask: Option<Image<B, D>>,
    mask_values: Option<Vec<f64>>,
    region: Option<Region<D>>,
    interpolator: LinearInterpolator,
}

impl<B: Backend, const D: usize> DeformationSampler<B, D> {
    /// Create a sampler over the whole reference image.
    pub fn new(spline: BSpline<D>, moving: Image<B, D>) -> Self {
        let moving_values = moving.values();
        Self {
            spline,
            moving,
            moving_values,
            mask: None,
            mask_values: None,
            region: None,
            interpolator: LinearInterpolator::new(),
        }
    }

    /// Restrict sampling to `region` of the reference image.
    pub fn with_region(mut self, region: Region<D>) -> Self {
        self.region = Some(region);
        self
    }

    pub fn spline(&self) -> &BSpline<D> {
        &self.spline
    }

    pub fn spline_mut(&mut self) -> &mut BSpline<D> {
        &mut self.spline
    }

    pub fn set_spline(&mut self, spline: BSpline<D>) {
        self.spline = spline;
    }

    pub fn into_spline(self) -> BSpline<D> {
        self.spline
    }

    pub fn moving(&self) -> &Image<B, D> {
        &self.moving
    }

    pub fn mask(&self) -> Option<&Image<B, D>> {
        self.mask.as_ref()
    }

    pub fn region(&self) -> Option<&Region<D>> {
        self.region.as_ref()
    }

    /// Restrict sampling to `region`, or the whole reference with `None`.
    pub fn set_region(&mut self, region: Option<Region<D>>) {
        self.region = region;
    }

    /// Set a mask in moving-image geometry; non-zero values are inside.
    pub fn set_mask(&mut self, mask: Option<Image<B, D>>) -> Result<()> {
        if let Some(mask) = &mask {
            validate_mask_geometry(mask, &self.moving)?;
        }
        self.mask_values = mask.as_ref().map(Image::values);
        self.mask = mask;
        Ok(())
    }

    /// Replace the moving image and its mask together.
    pub fn set_moving(&mut self, moving: Image<B, D>, mask: Option<Image<B, D>>) -> Result<()> {
        if let Some(mask) = &mask {
            validate_mask_geometry(mask, &moving)?;
        }
        self.moving_values = moving.values();
        self.moving = moving;
        self.mask_values = mask.as_ref().map(Image::values);
        self.mask = mask;
        Ok(())
    }

    /// Region of `reference` that is sampled.
    ///
    /// # Errors
    /// Returns [`SplineError::OutOfRangeIndex`] if the configured region
    /// does not fit inside the reference image.
    pub fn resolve_region(&self, reference: &Image<B, D>) -> Result<Region<D>> {
        let size = reference.size();
        match self.region {
            None => Ok(Region::from_size(size)),
            Some(region) if region.is_inside(&size) => Ok(region),
            Some(region) => Err(SplineError::out_of_range(format!(
                "region {:?} + {:?} exceeds reference size {:?}",
                region.index(),
                region.size(),
                size
            ))
            .into()),
        }
    }

    /// Resample the moving image (and mask) onto `reference`.
    ///
    /// Runs as a batched tensor pipeline. Voxels outside the sampled region
    /// are zero.
    pub fn transform(&self, reference: &Image<B, D>) -> Result<SampledImage<B, D>> {
        let region = self.resolve_region(reference)?;
        let device = reference.data().device();

        let indices = generate_grid::<B, D>(&region, &device);
        let physical = reference.index_to_world_tensor(indices);
        let deformed = Transform::<B, D>::transform_points(&self.spline, physical);
        let moving_indices = self.moving.world_to_index_tensor(deformed);

        let values = self
            .interpolator
            .interpolate(self.moving.data(), moving_indices.clone());
        let image = Self::scatter(reference, &region, values)?;
        let mask = match &self.mask {
            Some(mask) => {
                let values = self.interpolator.interpolate(mask.data(), moving_indices);
                Some(Self::scatter(reference, &region, values)?)
            }
            None => None,
        };

        Ok(SampledImage { image, mask })
    }

    /// Resample like [`transform`](Self::transform) and keep the per-voxel
    /// spline evaluation for gradient computation.
    pub fn transform_and_cache_basis(
        &self,
        reference: &Image<B, D>,
    ) -> Result<(SampledImage<B, D>, BasisCache<D>)> {
        let cache = self.cache_basis(reference)?;
        let image = Self::scatter_host(reference, cache.region(), cache.values())?;
        let mask = match cache.mask_values() {
            Some(values) => Some(Self::scatter_host(reference, cache.region(), values)?),
            None => None,
        };
        Ok((SampledImage { image, mask }, cache))
    }

    /// Host-side resampling pass without building output images.
    pub fn cache_basis(&self, reference: &Image<B, D>) -> Result<BasisCache<D>> {
        let region = self.resolve_region(reference)?;
        let moving_size = self.moving.size();
        let mut cache = BasisCache::with_capacity(region, self.spline.degrees(), self.mask.is_some());
        let mut evaluation = BasisEvaluation::default();

        for index in &region {
            let physical = reference.index_to_physical_point(&index);
            let params: [f64; D] = std::array::from_fn(|a| physical[a]);
            let deformed = self.spline.point_at_with_basis(&params, &mut evaluation).to_point();

            let unclamped = self.moving.transform_physical_point_to_continuous_index(&deformed);
            let continuous = self.moving.clamp_continuous_index(&unclamped);
            let moving_index: [f64; D] = std::array::from_fn(|a| continuous[a]);
            let in_bounds: [bool; D] = std::array::from_fn(|a| continuous[a] == unclamped[a]);

            cache.spans.push(*evaluation.spans());
            for axis in 0..D {
                cache.basis.extend_from_slice(evaluation.basis(axis));
            }
            cache
                .values
                .push(self.interpolator.sample(&self.moving_values, &moving_size, &moving_index));
            if let (Some(out), Some(mask)) = (cache.mask_values.as_mut(), self.mask_values.as_ref()) {
                out.push(self.interpolator.sample(mask, &moving_size, &moving_index));
            }
            cache.moving_indices.push(moving_index);
            cache.in_bounds.push(in_bounds);
        }

        Ok(cache)
    }

    /// Index-space region of `reference` covered by the parametric box
    /// `start ..= end`, intersected with the sampled region.
    ///
    /// Infinite bounds reach to the image border.
    ///
    /// # Errors
    /// Returns [`SplineError::DegenerateRegion`] if no voxel is covered.
    pub fn compute_region(
        &self,
        reference: &Image<B, D>,
        start: &[f64; D],
        end: &[f64; D],
    ) -> Result<Region<D>> {
        const EPSILON: f64 = 1e-9;
        let sampled = self.resolve_region(reference)?;
        let size = reference.size();
        let (bbox_min, bbox_extent) = reference.physical_bounding_box();

        let mut low = [0.0; D];
        let mut high = [0.0; D];
        for a in 0..D {
            low[a] = start[a].max(bbox_min[a]);
            high[a] = end[a].min(bbox_min[a] + bbox_extent[a]);
            if low[a] > high[a] + EPSILON {
                return Err(SplineError::degenerate_region(format!(
                    "axis {}: [{}, {}] misses the image",
                    a, start[a], end[a]
                ))
                .into());
            }
        }

        // Index-space bounds of the box corners.
        let mut index_min = [f64::INFINITY; D];
        let mut index_max = [f64::NEG_INFINITY; D];
        for corner in 0..(1usize << D) {
            let point: Point<D> = Point::from(std::array::from_fn(|a| {
                if corner & (1 << a) != 0 {
                    high[a]
                } else {
                    low[a]
                }
            }));
            let index = reference.transform_physical_point_to_continuous_index(&point);
            for a in 0..D {
                index_min[a] = index_min[a].min(index[a]);
                index_max[a] = index_max[a].max(index[a]);
            }
        }

        let mut lower = [0usize; D];
        let mut upper = [0usize; D];
        for a in 0..D {
            let last = (size[a] - 1) as f64;
            let lo = (index_min[a] - EPSILON).ceil().max(0.0);
            let hi = (index_max[a] + EPSILON).floor().min(last);
            if lo > hi {
                return Err(SplineError::degenerate_region(format!(
                    "axis {}: [{}, {}] holds no voxel centre",
                    a, start[a], end[a]
                ))
                .into());
            }
            lower[a] = lo as usize;
            upper[a] = hi as usize;
        }

        Region::from_bounds(lower, upper)
            .and_then(|region| region.intersect(&sampled))
            .ok_or_else(|| {
                SplineError::degenerate_region(format!(
                    "box {:?} .. {:?} lies outside the sampled region",
                    start, end
                ))
                .into()
            })
    }

    fn scatter(reference: &Image<B, D>, region: &Region<D>, values: Tensor<B, 1>) -> Result<Image<B, D>> {
        if *region == reference.largest_region() {
            let data = values.reshape(Shape::new(reference.shape()));
            return Ok(reference.with_data(data)?);
        }
        let host: Vec<f64> = values.into_data().iter::<f64>().collect();
        Self::scatter_host(reference, region, &host)
    }

    fn scatter_host(reference: &Image<B, D>, region: &Region<D>, values: &[f64]) -> Result<Image<B, D>> {
        let size = reference.size();
        let mut out = vec![0.0f32; reference.num_voxels()];
        for (index, &value) in region.iter().zip(values) {
            out[Region::linear_offset(&index, &size)] = value as f32;
        }
        let data = Tensor::<B, D>::from_data(
            TensorData::new(out, Shape::new(reference.shape())),
            &reference.data().device(),
        );
        Ok(reference.with_data(data)?)
    }
}
