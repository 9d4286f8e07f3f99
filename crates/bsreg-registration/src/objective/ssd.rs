//! Mean squared difference between a fixed image and a B-spline deformed
//! moving image.

use burn::tensor::backend::Backend;

use bsreg_core::filter::GradientImageFilter;
use bsreg_core::interpolation::LinearInterpolator;
use bsreg_core::spatial::Vector;
use bsreg_core::{BSpline, Image, Region};

use super::trait_::CostFunction;
use crate::error::{RegistrationError, Result};
use crate::regularization::{LatticeRegularizer, Regularizer};
use crate::sampler::{BasisCache, DeformationSampler};
use crate::validation::{validate_finite, validate_regularization_weight};

/// Where the objective stands relative to its current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    /// Parameters changed since the last evaluation.
    Idle,
    /// Cost and per-voxel cache are valid for the current parameters.
    ForwardEvaluated,
    /// The gradient has also been computed for the current parameters.
    GradientEvaluated,
}

/// Registration cost over the control points of a [`BSpline`].
///
/// The cost is `Σ (fixed − deformedMoving)² / n` over the inlier voxels of
/// the fixed image region. The gradient is the descent direction of that
/// cost, plus `α` times the lattice regularization pull, scaled by the
/// share of in-mask voxels under each control point. Regularization is not
/// part of the cost value.
#[derive(Debug, Clone)]
pub struct RegistrationObjective<B: Backend, const D: usize> {
    fixed: Image<B, D>,
    fixed_values: Vec<f64>,
    sampler: DeformationSampler<B, D>,
    /// Moving image derivatives along each physical axis, x fastest.
    moving_gradients: Vec<Vec<f64>>,
    regularizer: LatticeRegularizer<D>,
    interpolator: LinearInterpolator,
    state: EvaluationState,
    cache: Option<BasisCache<D>>,
    differences: Vec<f64>,
    /// Moving image derivatives at each deformed voxel position.
    derivatives: Vec<[f64; D]>,
    inliers: usize,
    value: f64,
}

impl<B: Backend, const D: usize> RegistrationObjective<B, D> {
    /// Create an objective over the whole fixed image.
    ///
    /// The lattice spacing used by the regularizer is measured from
    /// `spline` here and kept for the lifetime of the objective.
    ///
    /// # Errors
    /// Returns [`RegistrationError::InvalidConfiguration`] if
    /// `regularization_weight` lies outside `[0, 1]`.
    pub fn new(
        fixed: Image<B, D>,
        moving: Image<B, D>,
        spline: BSpline<D>,
        regularization_weight: f64,
    ) -> Result<Self> {
        validate_regularization_weight(regularization_weight)?;
        let regularizer = LatticeRegularizer::from_grid(spline.grid(), regularization_weight);
        let moving_gradients = Self::gradient_values(&moving)?;
        let fixed_values = fixed.values();

        Ok(Self {
            fixed,
            fixed_values,
            sampler: DeformationSampler::new(spline, moving),
            moving_gradients,
            regularizer,
            interpolator: LinearInterpolator::new(),
            state: EvaluationState::Idle,
            cache: None,
            differences: Vec::new(),
            derivatives: Vec::new(),
            inliers: 0,
            value: 0.0,
        })
    }

    /// Restrict the cost to `region` of the fixed image.
    pub fn with_region(mut self, region: Region<D>) -> Self {
        self.set_region(Some(region));
        self
    }

    pub fn set_region(&mut self, region: Option<Region<D>>) {
        self.sampler.set_region(region);
        self.invalidate();
    }

    /// Set a mask in moving-image geometry.
    pub fn set_mask(&mut self, mask: Option<Image<B, D>>) -> Result<()> {
        self.sampler.set_mask(mask)?;
        self.invalidate();
        Ok(())
    }

    /// Point the objective at another pair of images, e.g. the next pyramid
    /// level. Control points and lattice spacing are kept.
    pub fn retarget(
        &mut self,
        fixed: Image<B, D>,
        moving: Image<B, D>,
        mask: Option<Image<B, D>>,
        region: Option<Region<D>>,
    ) -> Result<()> {
        self.moving_gradients = Self::gradient_values(&moving)?;
        self.sampler.set_moving(moving, mask)?;
        self.sampler.set_region(region);
        self.fixed_values = fixed.values();
        self.fixed = fixed;
        self.invalidate();
        Ok(())
    }

    /// Write a control-point-major, axis-minor parameter vector into the
    /// spline.
    ///
    /// # Errors
    /// Returns [`RegistrationError::DimensionMismatch`] if the length does
    /// not match the control grid.
    pub fn set_parameters_from_flat_vector(&mut self, parameters: &[f64]) -> Result<()> {
        let expected = self.number_of_parameters();
        if parameters.len() != expected {
            return Err(RegistrationError::dimension_mismatch(format!(
                "expected {} parameters, got {}",
                expected,
                parameters.len()
            )));
        }
        validate_finite(parameters, "parameters")?;
        self.sampler.spline_mut().set_parameters(parameters)?;
        self.invalidate();
        Ok(())
    }

    pub fn parameters(&self) -> Vec<f64> {
        self.sampler.spline().parameters()
    }

    pub fn spline(&self) -> &BSpline<D> {
        self.sampler.spline()
    }

    pub fn into_spline(self) -> BSpline<D> {
        self.sampler.into_spline()
    }

    pub fn sampler(&self) -> &DeformationSampler<B, D> {
        &self.sampler
    }

    pub fn fixed(&self) -> &Image<B, D> {
        &self.fixed
    }

    pub fn state(&self) -> EvaluationState {
        self.state
    }

    /// Cost from the last forward pass, if still valid.
    pub fn value(&self) -> Option<f64> {
        (self.state != EvaluationState::Idle).then_some(self.value)
    }

    /// Number of voxels that entered the last cost.
    pub fn inlier_count(&self) -> usize {
        self.inliers
    }

    pub fn regularization_weight(&self) -> f64 {
        self.regularizer.weight()
    }

    /// Lattice regularization energy of the current control grid.
    pub fn regularization_energy(&self) -> f64 {
        self.regularizer.energy(self.sampler.spline().grid())
    }

    fn invalidate(&mut self) {
        self.state = EvaluationState::Idle;
        self.cache = None;
    }

    fn gradient_values(moving: &Image<B, D>) -> Result<Vec<Vec<f64>>> {
        let gradients = GradientImageFilter::new().apply(moving)?;
        Ok(gradients.iter().map(Image::values).collect())
    }

    /// Physical derivative of the moving image at the deformed position of
    /// `voxel`. Index axes that were clamped to the image border are held
    /// fixed and contribute no derivative.
    fn moving_derivative(&self, cache: &BasisCache<D>, voxel: usize) -> [f64; D] {
        let moving = self.sampler.moving();
        let size = moving.size();
        let position = cache.moving_index(voxel);
        let physical: [f64; D] = std::array::from_fn(|axis| {
            self.interpolator
                .sample(&self.moving_gradients[axis], &size, position)
        });
        let in_bounds = cache.in_bounds(voxel);
        if in_bounds.iter().all(|&inside| inside) {
            return physical;
        }

        // physical = Direction^-T * (index / spacing)
        let spacing = moving.spacing();
        let mut index = (moving.direction().transpose() * Vector::<D>::from(physical)).component_mul(spacing);
        for (axis, &inside) in in_bounds.iter().enumerate() {
            if !inside {
                index[axis] = 0.0;
            }
        }
        let projected = moving.inverse_direction().transpose() * index.component_div(spacing);
        std::array::from_fn(|axis| projected[axis])
    }

    /// Parametric support of control point `index`. Supports that reach a
    /// domain boundary extend to infinity, since parameters outside the
    /// domain are evaluated on the boundary spans.
    fn support(&self, index: &[usize; D]) -> Result<([f64; D], [f64; D])> {
        let spline = self.sampler.spline();
        let mut start = [0.0; D];
        let mut end = [0.0; D];
        for axis in 0..D {
            let knots = spline.knot_vector(axis);
            let (low, high) = knots.find_range(index[axis])?;
            let (first, last) = knots.domain();
            start[axis] = if low <= first { f64::NEG_INFINITY } else { low };
            end[axis] = if high >= last { f64::INFINITY } else { high };
        }
        Ok((start, end))
    }

    /// Data term of control point `index` over `region`, and the share of
    /// in-mask voxels in `region`.
    fn data_term(&self, cache: &BasisCache<D>, region: &Region<D>, index: &[usize; D]) -> ([f64; D], f64) {
        let mut sum = [0.0; D];
        let mut in_mask = 0usize;

        for voxel_index in region {
            let voxel = cache.region().local_offset(&voxel_index);
            if !cache.is_inlier(voxel) {
                continue;
            }
            in_mask += 1;

            let weight = cache.weight_of(voxel, index);
            if weight == 0.0 {
                continue;
            }
            let scale = 2.0 * self.differences[voxel] * weight;
            for (total, derivative) in sum.iter_mut().zip(&self.derivatives[voxel]) {
                *total += scale * derivative;
            }
        }

        // (sum / n_region) * (n_region / n) == sum / n
        let data = if self.inliers == 0 {
            [0.0; D]
        } else {
            sum.map(|s| s / self.inliers as f64)
        };
        let fraction = if cache.is_masked() {
            in_mask as f64 / region.num_voxels() as f64
        } else {
            1.0
        };
        (data, fraction)
    }
}

impl<B: Backend, const D: usize> CostFunction for RegistrationObjective<B, D> {
    fn number_of_parameters(&self) -> usize {
        self.sampler.spline().parameter_count()
    }

    fn forward(&mut self, parameters: &[f64]) -> Result<f64> {
        self.set_parameters_from_flat_vector(parameters)?;

        let cache = self.sampler.cache_basis(&self.fixed)?;
        let fixed_size = self.fixed.size();
        let mut differences = Vec::with_capacity(cache.len());
        let mut derivatives = Vec::with_capacity(cache.len());
        let mut sum = 0.0;
        let mut inliers = 0usize;
        for (voxel, index) in cache.region().iter().enumerate() {
            let difference = self.fixed_values[Region::linear_offset(&index, &fixed_size)] - cache.values()[voxel];
            if cache.is_inlier(voxel) {
                sum += difference * difference;
                inliers += 1;
                derivatives.push(self.moving_derivative(&cache, voxel));
            } else {
                derivatives.push([0.0; D]);
            }
            differences.push(difference);
        }

        let value = if inliers == 0 {
            tracing::warn!("No inlier voxels in the cost region, cost set to zero");
            0.0
        } else {
            sum / inliers as f64
        };
        if self.regularizer.weight() > 0.0 {
            tracing::debug!(
                "Regularization energy {:.6e} (weight {})",
                self.regularization_energy(),
                self.regularizer.weight()
            );
        }

        self.differences = differences;
        self.derivatives = derivatives;
        self.inliers = inliers;
        self.value = value;
        self.cache = Some(cache);
        self.state = EvaluationState::ForwardEvaluated;
        Ok(value)
    }

    fn gradient(&mut self, parameters: &[f64]) -> Result<Vec<f64>> {
        let up_to_date = self.state != EvaluationState::Idle && {
            let grid = self.sampler.spline().grid();
            parameters.len() == grid.parameter_count()
                && grid
                    .points()
                    .iter()
                    .flat_map(|point| point.coords().iter())
                    .eq(parameters.iter())
        };
        if !up_to_date {
            self.forward(parameters)?;
        }
        let Some(cache) = self.cache.as_ref() else {
            return Err(RegistrationError::invalid_configuration(
                "gradient requested without a forward pass",
            ));
        };

        let grid = self.sampler.spline().grid();
        let alpha = self.regularizer.weight();
        let mut gradient = vec![0.0; grid.parameter_count()];
        let mut uncovered = 0usize;

        for offset in 0..grid.len() {
            let index = grid.index_of(offset)?;
            let (start, end) = self.support(&index)?;
            let (data, fraction) = match self.sampler.compute_region(&self.fixed, &start, &end) {
                Ok(region) => self.data_term(cache, &region, &index),
                Err(err) if err.is_degenerate_region() => {
                    uncovered += 1;
                    ([0.0; D], if cache.is_masked() { 0.0 } else { 1.0 })
                }
                Err(err) => return Err(err),
            };
            let pull = if alpha > 0.0 {
                self.regularizer.gradient_at(grid, &index)
            } else {
                [0.0; D]
            };
            for axis in 0..D {
                gradient[offset * D + axis] = data[axis] + alpha * pull[axis] * fraction;
            }
        }

        if uncovered > 0 {
            tracing::debug!("{} control points have no voxels under their support", uncovered);
        }
        self.state = EvaluationState::GradientEvaluated;
        Ok(gradient)
    }
}
