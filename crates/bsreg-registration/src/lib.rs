//! Gradient-descent B-spline deformable image registration.
//!
//! A [`DeformationSampler`] resamples the moving image through a
//! [`BSpline`](bsreg_core::BSpline) deformation, a [`RegistrationObjective`]
//! turns the result into a mean squared difference and its control-point
//! gradient, and a [`GradientDescentOptimizer`] minimizes it. The
//! [`MultiResolutionDriver`] runs that loop coarse to fine over image
//! pyramids.

pub mod error;
pub mod multires;
pub mod objective;
pub mod optimizer;
pub mod progress;
pub mod regularization;
pub mod sampler;
pub mod validation;

pub use error::{RegistrationError, Result};
pub use multires::{LevelSummary, MultiResolutionConfig, MultiResolutionDriver, RegistrationResult};
pub use objective::{CostFunction, EvaluationState, RegistrationObjective};
pub use optimizer::{GradientDescentConfig, GradientDescentOptimizer, OptimizationResult, Optimizer};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use regularization::{LatticeRegularizer, Regularizer};
pub use sampler::{BasisCache, DeformationSampler, SampledImage};
