//! Cost function trait definition.

use crate::error::Result;

/// Scalar cost over a flat parameter vector.
///
/// Implementors may cache intermediate results between [`forward`] and
/// [`gradient`] calls at the same parameters, which is why both take
/// `&mut self`.
///
/// [`forward`]: CostFunction::forward
/// [`gradient`]: CostFunction::gradient
pub trait CostFunction {
    /// Length of the parameter vector.
    fn number_of_parameters(&self) -> usize;

    /// Cost at `parameters`.
    fn forward(&mut self, parameters: &[f64]) -> Result<f64>;

    /// Descent direction at `parameters`: the negated gradient of
    /// [`forward`](CostFunction::forward), plus any penalty pull the cost
    /// applies outside its value.
    fn gradient(&mut self, parameters: &[f64]) -> Result<Vec<f64>>;
}
