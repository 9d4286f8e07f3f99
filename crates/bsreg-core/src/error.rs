//! Error types for spline and image primitives.

use thiserror::Error;

/// Errors raised while building or evaluating splines and image geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    /// Knot values decrease, are not finite, or cannot form a single span.
    #[error("Invalid knot vector: {0}")]
    InvalidKnotVector(String),

    /// Knot vectors, control grid extents or parameter vectors disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A parametric box maps to no voxels of the requested region.
    #[error("Degenerate region: {0}")]
    DegenerateRegion(String),

    /// An index lies outside a grid or image.
    #[error("Index out of range: {0}")]
    OutOfRangeIndex(String),

    /// Image spacing or direction cannot define a coordinate system.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Result type for spline and image operations.
pub type Result<T> = std::result::Result<T, SplineError>;

impl SplineError {
    pub fn invalid_knot_vector(msg: impl Into<String>) -> Self {
        Self::InvalidKnotVector(msg.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn degenerate_region(msg: impl Into<String>) -> Self {
        Self::DegenerateRegion(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRangeIndex(msg.into())
    }

    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SplineError::invalid_knot_vector("knot 2 decreases");
        assert_eq!(err.to_string(), "Invalid knot vector: knot 2 decreases");

        let err = SplineError::out_of_range("[4, 0] outside [4, 4]");
        assert_eq!(err.to_string(), "Index out of range: [4, 0] outside [4, 4]");
    }

    #[test]
    fn test_error_variants() {
        assert!(matches!(
            SplineError::degenerate_region("empty"),
            SplineError::DegenerateRegion(_)
        ));
        assert!(matches!(
            SplineError::dimension_mismatch("3 != 4"),
            SplineError::DimensionMismatch(_)
        ));
    }
}
