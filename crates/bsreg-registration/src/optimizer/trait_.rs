//! Optimizer trait for parameter optimization.

use crate::error::Result;
use crate::objective::CostFunction;

/// Outcome of one optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Parameters after the last update.
    pub parameters: Vec<f64>,
    /// Cost at `parameters`.
    pub cost: f64,
    /// Number of parameter updates performed.
    pub iterations: usize,
    /// Whether the cost change fell below the tolerance before the cap.
    pub converged: bool,
    /// Step size in effect at the end of the run.
    pub final_step_size: f64,
}

/// Minimizes a [`CostFunction`] starting from an initial parameter vector.
///
/// # Examples
///
/// ```rust,ignore
/// use bsreg_registration::optimizer::{GradientDescentConfig, GradientDescentOptimizer, Optimizer};
///
/// let mut optimizer = GradientDescentOptimizer::new(GradientDescentConfig::new())?;
/// let start = objective.parameters();
/// let result = optimizer.minimize(&mut objective, start)?;
/// ```
pub trait Optimizer {
    /// Run until convergence or the iteration cap.
    ///
    /// # Arguments
    /// * `cost` - The cost function, exclusively borrowed for the run
    /// * `initial` - Starting parameters, one entry per cost parameter
    fn minimize<C>(&mut self, cost: &mut C, initial: Vec<f64>) -> Result<OptimizationResult>
    where
        C: CostFunction + ?Sized;

    /// Initial step size of the next run.
    fn step_size(&self) -> f64;

    /// Set the initial step size of the next run.
    fn set_step_size(&mut self, step_size: f64);
}
