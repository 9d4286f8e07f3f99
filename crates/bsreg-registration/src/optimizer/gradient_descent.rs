//! Gradient descent with multiplicative step decay.

use std::sync::Arc;

use burn::config::Config;

use super::trait_::{OptimizationResult, Optimizer};
use crate::error::{self, RegistrationError};
use crate::objective::CostFunction;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::validation::{
    validate_finite, validate_iterations, validate_step_decay, validate_step_size, validate_tolerance,
};

/// Configuration for [`GradientDescentOptimizer`].
#[derive(Config, Debug, PartialEq)]
pub struct GradientDescentConfig {
    /// Initial step size.
    #[config(default = "1.0")]
    pub step_size: f64,
    /// Stop once successive costs differ by less than this.
    #[config(default = "1e-6")]
    pub tolerance: f64,
    /// Factor applied to the step whenever the cost increases.
    #[config(default = "0.85")]
    pub step_decay: f64,
    /// Hard cap on parameter updates.
    #[config(default = "500")]
    pub max_iterations: usize,
}

impl GradientDescentConfig {
    pub fn validate(&self) -> error::Result<()> {
        validate_step_size(self.step_size)?;
        validate_tolerance(self.tolerance)?;
        validate_step_decay(self.step_decay)?;
        validate_iterations(self.max_iterations)
    }
}

/// Plain gradient descent.
///
/// Each iteration evaluates the cost and its descent direction `g`, then
/// updates `x ← x + step · g`. The step shrinks by `step_decay` whenever the
/// cost grew since the previous iteration. From the second iteration on, the
/// run stops when `|cost − previous| < tolerance`.
#[derive(Debug, Clone)]
pub struct GradientDescentOptimizer {
    config: GradientDescentConfig,
    progress: ProgressTracker,
}

impl GradientDescentOptimizer {
    /// Create an optimizer.
    ///
    /// # Errors
    /// Returns [`RegistrationError::InvalidConfiguration`] for a
    /// non-positive step, negative tolerance, decay outside `(0, 1)` or an
    /// unusable iteration cap.
    pub fn new(config: GradientDescentConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: ProgressTracker::new(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.progress.add_callback(callback);
    }

    pub fn config(&self) -> &GradientDescentConfig {
        &self.config
    }

    fn checked_cost(&self, value: f64, iteration: usize) -> error::Result<f64> {
        if value.is_finite() {
            return Ok(value);
        }
        let err = RegistrationError::numerical_instability(format!(
            "cost is {} at iteration {}",
            value, iteration
        ));
        self.progress.error(&err.to_string());
        Err(err)
    }
}

impl Optimizer for GradientDescentOptimizer {
    fn minimize<C>(&mut self, cost: &mut C, initial: Vec<f64>) -> error::Result<OptimizationResult>
    where
        C: CostFunction + ?Sized,
    {
        if initial.len() != cost.number_of_parameters() {
            return Err(RegistrationError::dimension_mismatch(format!(
                "optimizer started with {} parameters, cost expects {}",
                initial.len(),
                cost.number_of_parameters()
            )));
        }
        validate_finite(&initial, "initial parameters")?;

        let max_iterations = self.config.max_iterations;
        let mut parameters = initial;
        let mut step = self.config.step_size;
        let mut previous: Option<f64> = None;

        self.progress.start();
        for iteration in 0..max_iterations {
            let value = self.checked_cost(cost.forward(&parameters)?, iteration)?;

            if let Some(previous) = previous {
                if (value - previous).abs() < self.config.tolerance {
                    tracing::debug!(
                        "Converged after {} iterations: cost {:.6e}, step {:.3e}",
                        iteration,
                        value,
                        step
                    );
                    self.progress.complete(iteration, value, step);
                    return Ok(OptimizationResult {
                        parameters,
                        cost: value,
                        iterations: iteration,
                        converged: true,
                        final_step_size: step,
                    });
                }
                if value > previous {
                    step *= self.config.step_decay;
                    tracing::debug!(
                        "Cost rose from {:.6e} to {:.6e}, step size now {:.3e}",
                        previous,
                        value,
                        step
                    );
                }
            }

            let gradient = cost.gradient(&parameters)?;
            validate_finite(&gradient, "gradient")?;
            for (x, g) in parameters.iter_mut().zip(&gradient) {
                *x += step * g;
            }
            previous = Some(value);
            self.progress.update(iteration + 1, Some(max_iterations), value, step);
        }

        let value = self.checked_cost(cost.forward(&parameters)?, max_iterations)?;
        tracing::debug!(
            "Stopped at the iteration cap of {} with cost {:.6e}",
            max_iterations,
            value
        );
        self.progress.complete(max_iterations, value, step);
        Ok(OptimizationResult {
            parameters,
            cost: value,
            iterations: max_iterations,
            converged: false,
            final_step_size: step,
        })
    }

    fn step_size(&self) -> f64 {
        self.config.step_size
    }

    fn set_step_size(&mut self, step_size: f64) {
        self.config.step_size = step_size;
    }
}
