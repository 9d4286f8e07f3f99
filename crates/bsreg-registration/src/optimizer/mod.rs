//! Optimizers for registration cost functions.
//!
//! # Examples
//!
//! ```rust,ignore
//! use bsreg_registration::optimizer::{GradientDescentConfig, GradientDescentOptimizer, Optimizer};
//!
//! let config = GradientDescentConfig::new().with_step_size(20.0);
//! let mut optimizer = GradientDescentOptimizer::new(config)?;
//! let result = optimizer.minimize(&mut objective, start)?;
//! ```

pub mod gradient_descent;
pub mod trait_;

pub use gradient_descent::{GradientDescentConfig, GradientDescentOptimizer};
pub use trait_::{OptimizationResult, Optimizer};
