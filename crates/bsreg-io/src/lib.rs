//! Plain-text persistence for B-spline deformations.
//!
//! Every value sits on its own line. Floats use Rust's shortest round-trip
//! formatting, so a spline read back is bit-identical to the one written.

pub mod spline_io;

pub use spline_io::{
    load_spline, read_control_grid, read_knot_vector, read_spline, save_spline, write_control_grid,
    write_knot_vector, write_spline,
};
