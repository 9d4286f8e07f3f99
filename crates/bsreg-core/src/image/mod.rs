//! Images with physical geometry, index regions and voxel grids.

pub mod grid;
pub mod image;
pub mod region;

pub use grid::generate_grid;
pub use image::Image;
pub use region::{Region, RegionIter};
