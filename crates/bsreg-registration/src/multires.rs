//! Coarse-to-fine B-spline registration over image pyramids.

use burn::config::Config;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use bsreg_core::filter::MultiResolutionPyramid;
use bsreg_core::spline::MAX_DEGREE;
use bsreg_core::{BSpline, Image};

use crate::error::{self, RegistrationError};
use crate::objective::RegistrationObjective;
use crate::optimizer::{GradientDescentConfig, GradientDescentOptimizer, Optimizer};
use crate::progress::ProgressTracker;
use crate::sampler::DeformationSampler;
use crate::validation::{validate_mask_geometry, validate_pyramid_levels, validate_regularization_weight};

/// Configuration for [`MultiResolutionDriver`].
#[derive(Config, Debug, PartialEq)]
pub struct MultiResolutionConfig {
    /// Pyramid levels; level 0 is full resolution.
    #[config(default = "3")]
    pub levels: usize,
    /// Optimizer step size at level 0, doubled for every coarser level.
    #[config(default = "1.0")]
    pub step_size: f64,
    /// Convergence tolerance at level 0, times ten for every coarser level.
    #[config(default = "1e-6")]
    pub tolerance: f64,
    #[config(default = "0.85")]
    pub step_decay: f64,
    /// Iteration cap per level.
    #[config(default = "500")]
    pub max_iterations: usize,
    /// Regularization weight in `[0, 1]`.
    #[config(default = "0.0")]
    pub regularization_weight: f64,
    /// Finest level to run; `None` runs down to full resolution.
    pub abort_level: Option<usize>,
}

impl MultiResolutionConfig {
    pub fn validate(&self) -> error::Result<()> {
        if self.levels == 0 {
            return Err(RegistrationError::invalid_configuration(
                "Pyramid needs at least one level",
            ));
        }
        if let Some(abort) = self.abort_level {
            if abort >= self.levels {
                return Err(RegistrationError::invalid_configuration(format!(
                    "abort level {} is not below the level count {}",
                    abort, self.levels
                )));
            }
        }
        validate_regularization_weight(self.regularization_weight)?;
        self.optimizer_config(0).validate()
    }

    /// Optimizer settings for pyramid `level`.
    pub fn optimizer_config(&self, level: usize) -> GradientDescentConfig {
        GradientDescentConfig::new()
            .with_step_size(self.step_size * 2f64.powi(level as i32))
            .with_tolerance(self.tolerance * 10f64.powi(level as i32))
            .with_step_decay(self.step_decay)
            .with_max_iterations(self.max_iterations)
    }
}

/// Outcome of one pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: usize,
    /// Fixed image size at this level, `(x, y[, z])`.
    pub size: Vec<usize>,
    pub iterations: usize,
    pub cost: f64,
    pub converged: bool,
    pub final_step_size: f64,
}

/// Result of a multi-resolution registration.
#[derive(Debug, Clone)]
pub struct RegistrationResult<B: Backend, const D: usize> {
    /// Optimized deformation.
    pub spline: BSpline<D>,
    /// Full-resolution moving image resampled onto the fixed image.
    pub registered: Image<B, D>,
    /// Per-level summaries, coarsest first.
    pub levels: Vec<LevelSummary>,
}

/// Runs gradient-descent registration from the coarsest pyramid level to
/// the finest, carrying the control points across levels.
///
/// The deformation starts as the identity over the fixed image's physical
/// bounding box.
#[derive(Debug, Clone)]
pub struct MultiResolutionDriver<const D: usize> {
    config: MultiResolutionConfig,
    control_points: [usize; D],
    degrees: [usize; D],
    progress: ProgressTracker,
}

impl<const D: usize> MultiResolutionDriver<D> {
    /// Create a driver.
    ///
    /// # Arguments
    /// * `config` - Pyramid and optimizer settings
    /// * `control_points` - Control points per axis `(x, y[, z])`
    /// * `degrees` - Spline degree per axis
    pub fn new(
        config: MultiResolutionConfig,
        control_points: [usize; D],
        degrees: [usize; D],
    ) -> error::Result<Self> {
        config.validate()?;
        for axis in 0..D {
            if degrees[axis] == 0 || degrees[axis] > MAX_DEGREE {
                return Err(RegistrationError::invalid_configuration(format!(
                    "axis {}: degree {} outside 1..={}",
                    axis, degrees[axis], MAX_DEGREE
                )));
            }
            if control_points[axis] <= degrees[axis] {
                return Err(RegistrationError::invalid_configuration(format!(
                    "axis {}: {} control points cannot carry degree {}",
                    axis, control_points[axis], degrees[axis]
                )));
            }
        }
        Ok(Self {
            config,
            control_points,
            degrees,
            progress: ProgressTracker::console(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &MultiResolutionConfig {
        &self.config
    }

    /// Identity deformation over the physical bounding box of `fixed`.
    pub fn initial_spline<B: Backend>(&self, fixed: &Image<B, D>) -> error::Result<BSpline<D>> {
        let (start, extent) = fixed.physical_bounding_box();
        Ok(BSpline::create_identity(start, extent, self.control_points, self.degrees)?)
    }

    /// Register `moving` onto `fixed`, starting from the identity.
    ///
    /// # Arguments
    /// * `fixed` - Reference image
    /// * `moving` - Image to deform
    /// * `mask` - Optional mask in moving-image geometry
    pub fn run<B: Backend>(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        mask: Option<&Image<B, D>>,
    ) -> error::Result<RegistrationResult<B, D>> {
        validate_pyramid_levels(self.config.levels, &fixed.size())?;
        let spline = self.initial_spline(fixed)?;
        self.run_with_spline(fixed, moving, mask, spline)
    }

    /// Register `moving` onto `fixed`, starting from `spline`.
    pub fn run_with_spline<B: Backend>(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        mask: Option<&Image<B, D>>,
        spline: BSpline<D>,
    ) -> error::Result<RegistrationResult<B, D>> {
        let levels = self.config.levels;
        let finest = self.config.abort_level.unwrap_or(0);
        validate_pyramid_levels(levels, &fixed.size())?;
        validate_pyramid_levels(levels, &moving.size())?;
        if let Some(mask) = mask {
            validate_mask_geometry(mask, moving)?;
        }

        tracing::info!(
            "Starting registration: {} levels, {:?} control points, degrees {:?}",
            levels,
            self.control_points,
            self.degrees
        );

        let fixed_pyramid = MultiResolutionPyramid::new(fixed, levels)?;
        let moving_pyramid = MultiResolutionPyramid::new(moving, levels)?;
        let mask_pyramid = mask
            .map(|mask| MultiResolutionPyramid::without_smoothing(mask, levels))
            .transpose()?;

        let level_images = |level: usize| -> error::Result<(Image<B, D>, Image<B, D>, Option<Image<B, D>>)> {
            let missing = || RegistrationError::invalid_configuration(format!("pyramid has no level {}", level));
            let fixed = fixed_pyramid.level(level).cloned().ok_or_else(missing)?;
            let moving = moving_pyramid.level(level).cloned().ok_or_else(missing)?;
            let mask = match &mask_pyramid {
                Some(pyramid) => Some(pyramid.level(level).cloned().ok_or_else(missing)?),
                None => None,
            };
            Ok((fixed, moving, mask))
        };

        let coarsest = levels - 1;
        let (fixed_level, moving_level, mask_level) = level_images(coarsest)?;
        let mut objective =
            RegistrationObjective::new(fixed_level, moving_level, spline, self.config.regularization_weight)?;
        objective.set_mask(mask_level)?;

        let mut summaries = Vec::with_capacity(levels - finest);
        for level in (finest..levels).rev() {
            if level != coarsest {
                let (fixed_level, moving_level, mask_level) = level_images(level)?;
                objective.retarget(fixed_level, moving_level, mask_level, None)?;
            }

            let optimizer_config = self.config.optimizer_config(level);
            let size = objective.fixed().size().to_vec();
            tracing::info!(
                "Starting level {}/{} with step={}, tol={:e}, size {:?}",
                levels - level,
                levels - finest,
                optimizer_config.step_size,
                optimizer_config.tolerance,
                size
            );

            let mut optimizer = GradientDescentOptimizer::new(optimizer_config)?.with_progress(self.progress.clone());
            let start = objective.parameters();
            let result = optimizer.minimize(&mut objective, start)?;
            objective.set_parameters_from_flat_vector(&result.parameters)?;

            tracing::info!(
                "Level {} done: cost {:.6e} after {} iterations (converged: {})",
                level,
                result.cost,
                result.iterations,
                result.converged
            );
            summaries.push(LevelSummary {
                level,
                size,
                iterations: result.iterations,
                cost: result.cost,
                converged: result.converged,
                final_step_size: result.final_step_size,
            });
        }

        let sampler = DeformationSampler::new(objective.into_spline(), moving.clone());
        let registered = sampler.transform(fixed)?.image;
        tracing::info!("Registration finished after {} levels", summaries.len());

        Ok(RegistrationResult {
            spline: sampler.into_spline(),
            registered,
            levels: summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MultiResolutionConfig::new();
        assert_eq!(config.levels, 3);
        assert_eq!(config.step_size, 1.0);
        assert_eq!(config.abort_level, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = MultiResolutionConfig::new()
            .with_levels(2)
            .with_regularization_weight(0.05)
            .with_abort_level(Some(1));
        let path = std::env::temp_dir().join(format!("bsreg-multires-config-{}.json", std::process::id()));
        config.save(&path).unwrap();
        let loaded = MultiResolutionConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_level_schedule() {
        let config = MultiResolutionConfig::new().with_step_size(2.0).with_tolerance(1e-6);
        let coarse = config.optimizer_config(2);
        assert_eq!(coarse.step_size, 8.0);
        assert!((coarse.tolerance - 1e-4).abs() < 1e-18);
        assert_eq!(coarse.max_iterations, config.max_iterations);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let abort = MultiResolutionConfig::new().with_levels(2).with_abort_level(Some(2));
        assert!(MultiResolutionDriver::new(abort, [4, 4], [2, 2]).is_err());

        let alpha = MultiResolutionConfig::new().with_regularization_weight(1.5);
        assert!(MultiResolutionDriver::new(alpha, [4, 4], [2, 2]).is_err());

        assert!(MultiResolutionDriver::new(MultiResolutionConfig::new(), [2, 4], [2, 2]).is_err());
        assert!(MultiResolutionDriver::new(MultiResolutionConfig::new(), [4, 4], [0, 2]).is_err());
        assert!(MultiResolutionDriver::new(MultiResolutionConfig::new(), [4, 4], [2, 2]).is_ok());
    }
}
