//! Validation utilities for registration operations.
//!
//! Configuration values are checked once, before any level or iteration
//! runs, so misconfigurations fail fast with
//! [`RegistrationError::InvalidConfiguration`].

use burn::tensor::backend::Backend;
use bsreg_core::Image;

use crate::error::{RegistrationError, Result};

/// Validate the initial optimizer step size.
pub fn validate_step_size(step_size: f64) -> Result<()> {
    if !step_size.is_finite() || step_size <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Step size must be positive and finite, got {}",
            step_size
        )));
    }
    Ok(())
}

/// Validate the convergence tolerance on successive cost values.
pub fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Tolerance must be non-negative and finite, got {}",
            tolerance
        )));
    }
    Ok(())
}

/// Validate the step decay factor applied when the cost increases.
pub fn validate_step_decay(decay: f64) -> Result<()> {
    if !(decay > 0.0 && decay < 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Step decay must lie in (0, 1), got {}",
            decay
        )));
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

/// Validate the regularization weight `alpha`.
pub fn validate_regularization_weight(alpha: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Regularization weight must lie in [0, 1], got {}",
            alpha
        )));
    }
    Ok(())
}

/// Validate that `levels` halvings leave at least two voxels per axis.
pub fn validate_pyramid_levels<const D: usize>(levels: usize, size: &[usize; D]) -> Result<()> {
    if levels == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Pyramid needs at least one level",
        ));
    }
    for (axis, &extent) in size.iter().enumerate() {
        let coarsest = extent.checked_shr((levels - 1) as u32).unwrap_or(0);
        if coarsest < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} levels leave axis {} of size {} with fewer than two voxels",
                levels, axis, extent
            )));
        }
    }
    Ok(())
}

/// Validate that a mask shares the geometry of the image it masks.
pub fn validate_mask_geometry<B: Backend, const D: usize>(
    mask: &Image<B, D>,
    image: &Image<B, D>,
) -> Result<()> {
    if mask.size() != image.size() {
        return Err(RegistrationError::shape_mismatch(&image.size(), &mask.size()));
    }
    if !mask.same_geometry(image) {
        return Err(RegistrationError::invalid_configuration(
            "Mask origin, spacing or direction differs from the masked image",
        ));
    }
    Ok(())
}

/// Validate that every value is finite.
pub fn validate_finite(values: &[f64], what: &str) -> Result<()> {
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(RegistrationError::numerical_instability(format!(
            "{} has a non-finite entry at {}: {}",
            what, position, values[position]
        )));
    }
    Ok(())
}
