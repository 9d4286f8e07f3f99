pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod spatial;
pub mod spline;
pub mod transform;

pub use error::{Result, SplineError};
pub use image::{Image, Region};
pub use spatial::{Point, Vector, Spacing, Direction};
pub use spline::{BSpline, ControlGrid, ControlPoint, KnotVector, SplineSurface, SplineVolume};
