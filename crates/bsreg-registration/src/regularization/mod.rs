//! Regularization of control grids.

pub mod lattice;
pub mod trait_;

pub use lattice::LatticeRegularizer;
pub use trait_::Regularizer;
