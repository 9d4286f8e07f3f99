//! Image filters used to build registration pyramids and derivative images.

pub mod downsample;
pub mod gaussian;
pub mod gradient;
pub mod pyramid;

pub use downsample::DownsampleFilter;
pub use gaussian::GaussianFilter;
pub use gradient::GradientImageFilter;
pub use pyramid::MultiResolutionPyramid;
