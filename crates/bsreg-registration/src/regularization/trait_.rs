//! Regularizer trait definition.

use bsreg_core::ControlGrid;

/// Penalty on the shape of a control grid.
///
/// Regularizers keep the deformation plausible by pulling control points
/// toward a reference arrangement.
pub trait Regularizer<const D: usize> {
    /// Descent direction of the penalty for the control point at `index`.
    ///
    /// The result is not scaled by [`weight`](Self::weight).
    fn gradient_at(&self, grid: &ControlGrid<D>, index: &[usize; D]) -> [f64; D];

    /// Penalty of the whole grid, not scaled by the weight.
    fn energy(&self, grid: &ControlGrid<D>) -> f64;

    /// Get the weight (scaling factor) for this regularizer.
    fn weight(&self) -> f64;

    /// Set the weight (scaling factor) for this regularizer.
    fn set_weight(&mut self, weight: f64);
}
