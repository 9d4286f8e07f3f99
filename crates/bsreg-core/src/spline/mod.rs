//! Spline primitives: knot vectors, control grids and tensor-product splines.

pub mod bspline;
pub mod control_grid;
pub mod control_point;
pub mod knot_vector;

pub use bspline::{BSpline, BasisEvaluation, SplineSurface, SplineVolume};
pub use control_grid::ControlGrid;
pub use control_point::ControlPoint;
pub use knot_vector::{KnotVector, MAX_DEGREE};
