//! Spatial transforms applied to batches of physical points.

pub mod bspline;
pub mod trait_;

pub use trait_::Transform;
