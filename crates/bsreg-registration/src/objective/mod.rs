//! Registration cost functions.

pub mod ssd;
pub mod trait_;

pub use ssd::{EvaluationState, RegistrationObjective};
pub use trait_::CostFunction;
