//! Tensor-product B-spline surfaces and volumes.

use super::control_grid::ControlGrid;
use super::control_point::ControlPoint;
use super::knot_vector::{KnotVector, MAX_DEGREE};
use crate::error::{Result, SplineError};
use crate::spatial::Point;

/// Tensor-product B-spline over a `D`-dimensional control grid.
///
/// One [`KnotVector`] per parametric axis (u, v[, w]). Evaluating at a
/// parameter returns the weighted sum of the `(degree + 1)^D` control points
/// whose basis functions are non-zero there.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline<const D: usize> {
    grid: ControlGrid<D>,
    knots: [KnotVector; D],
}

/// Spline over a 2D control grid.
pub type SplineSurface = BSpline<2>;
/// Spline over a 3D control grid.
pub type SplineVolume = BSpline<3>;

/// Spans and basis values of one spline evaluation, reusable across calls.
#[derive(Debug, Clone, Copy)]
pub struct BasisEvaluation<const D: usize> {
    spans: [usize; D],
    degrees: [usize; D],
    basis: [[f64; MAX_DEGREE + 1]; D],
}

impl<const D: usize> Default for BasisEvaluation<D> {
    fn default() -> Self {
        Self {
            spans: [0; D],
            degrees: [0; D],
            basis: [[0.0; MAX_DEGREE + 1]; D],
        }
    }
}

impl<const D: usize> BasisEvaluation<D> {
    pub fn spans(&self) -> &[usize; D] {
        &self.spans
    }

    pub fn degrees(&self) -> &[usize; D] {
        &self.degrees
    }

    /// Non-zero basis values along `axis`; entry `k` belongs to control
    /// point `span - degree + k`.
    pub fn basis(&self, axis: usize) -> &[f64] {
        &self.basis[axis][..=self.degrees[axis]]
    }

    /// Visit every supporting control point with its tensor-product weight.
    pub fn for_each_support<F>(&self, mut f: F)
    where
        F: FnMut(&[usize; D], f64),
    {
        let mut local = [0usize; D];
        loop {
            let mut weight = 1.0;
            let mut index = [0usize; D];
            for axis in 0..D {
                weight *= self.basis[axis][local[axis]];
                index[axis] = self.spans[axis] - self.degrees[axis] + local[axis];
            }
            f(&index, weight);

            // Odometer over the local (degree + 1)^D block, last axis fastest.
            let mut axis = D;
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                local[axis] += 1;
                if local[axis] <= self.degrees[axis] {
                    break;
                }
                local[axis] = 0;
            }
        }
    }
}

impl<const D: usize> BSpline<D> {
    /// Create a spline from a control grid and one knot vector per axis.
    ///
    /// # Errors
    /// Returns [`SplineError::DimensionMismatch`] unless every axis satisfies
    /// `knots.len() == degree + grid_extent + 1`.
    pub fn new(grid: ControlGrid<D>, knots: [KnotVector; D]) -> Result<Self> {
        let dims = grid.dims();
        for (axis, kv) in knots.iter().enumerate() {
            if kv.len() != kv.degree() + dims[axis] + 1 {
                return Err(SplineError::dimension_mismatch(format!(
                    "axis {}: {} knots with degree {} do not fit {} control points",
                    axis,
                    kv.len(),
                    kv.degree(),
                    dims[axis]
                )));
            }
        }
        Ok(Self { grid, knots })
    }

    /// Spline that maps every point of the box `start .. start + size` to
    /// itself.
    ///
    /// Knots are uniform and unclamped so the valid domain is exactly the
    /// box. Control points form an evenly spaced lattice whose step and
    /// offset are fitted from the basis values at both ends of each axis.
    pub fn create_identity(
        domain_start: [f64; D],
        domain_size: [f64; D],
        control_points: [usize; D],
        degrees: [usize; D],
    ) -> Result<Self> {
        let mut steps = [0.0; D];
        let mut offsets = [0.0; D];
        let mut knots = Vec::with_capacity(D);

        for axis in 0..D {
            let start = domain_start[axis];
            let end = start + domain_size[axis];
            let kv = KnotVector::uniform_unclamped(control_points[axis], degrees[axis], start, end)?;

            // g(u) = sum_k N_k(u) * k, linear in u over the domain.
            let index_sum = |u: f64| -> f64 {
                let span = kv.find_span(u);
                let basis = kv.basis_functions(span, u);
                basis
                    .iter()
                    .enumerate()
                    .map(|(k, b)| b * (span - kv.degree() + k) as f64)
                    .sum()
            };
            let g0 = index_sum(start);
            let g1 = index_sum(end);
            if (g1 - g0).abs() < f64::EPSILON {
                return Err(SplineError::degenerate_region(format!(
                    "axis {} cannot be fitted over [{}, {}]",
                    axis, start, end
                )));
            }

            steps[axis] = domain_size[axis] / (g1 - g0);
            offsets[axis] = start - steps[axis] * g0;
            knots.push(kv);
        }

        let grid = ControlGrid::from_fn(control_points, |index| {
            ControlPoint::new(std::array::from_fn(|a| offsets[a] + index[a] as f64 * steps[a]))
        })?;

        let knots: [KnotVector; D] = knots
            .try_into()
            .map_err(|_| SplineError::dimension_mismatch("knot vector count"))?;
        Self::new(grid, knots)
    }

    pub fn grid(&self) -> &ControlGrid<D> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ControlGrid<D> {
        &mut self.grid
    }

    pub fn knots(&self) -> &[KnotVector; D] {
        &self.knots
    }

    pub fn knot_vector(&self, axis: usize) -> &KnotVector {
        &self.knots[axis]
    }

    pub fn degrees(&self) -> [usize; D] {
        std::array::from_fn(|a| self.knots[a].degree())
    }

    /// Valid parametric domain as `(start, end)` per axis.
    pub fn domain(&self) -> ([f64; D], [f64; D]) {
        let start = std::array::from_fn(|a| self.knots[a].domain().0);
        let end = std::array::from_fn(|a| self.knots[a].domain().1);
        (start, end)
    }

    pub fn parameter_count(&self) -> usize {
        self.grid.parameter_count()
    }

    pub fn parameters(&self) -> Vec<f64> {
        self.grid.parameters()
    }

    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.grid.set_parameters(parameters)
    }

    /// Evaluate the spline at a parametric point.
    pub fn point_at(&self, params: &[f64; D]) -> ControlPoint<D> {
        let mut evaluation = BasisEvaluation::default();
        self.point_at_with_basis(params, &mut evaluation)
    }

    /// Evaluate the spline and leave spans and basis values in `evaluation`.
    pub fn point_at_with_basis(
        &self,
        params: &[f64; D],
        evaluation: &mut BasisEvaluation<D>,
    ) -> ControlPoint<D> {
        for (axis, kv) in self.knots.iter().enumerate() {
            let u = params[axis];
            let span = kv.find_span(u);
            kv.basis_functions_into(span, u, &mut evaluation.basis[axis]);
            evaluation.spans[axis] = span;
            evaluation.degrees[axis] = kv.degree();
        }

        let mut acc = ControlPoint::zero();
        evaluation.for_each_support(|index, weight| {
            acc += *self.grid.point_unchecked(index) * weight;
        });
        acc
    }

    /// Map a physical point through the deformation.
    pub fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let params: [f64; D] = std::array::from_fn(|a| point[a]);
        self.point_at(&params).to_point()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clamped_surface() -> SplineSurface {
        let ku = KnotVector::uniform_clamped(4, 2, 0.0, 1.0).unwrap();
        let kv = KnotVector::uniform_clamped(3, 1, 0.0, 1.0).unwrap();
        let grid = ControlGrid::from_fn([4, 3], |[i, j]| {
            ControlPoint::new([i as f64 * 2.0, j as f64 * 3.0 + (i * j) as f64])
        })
        .unwrap();
        BSpline::new(grid, [ku, kv]).unwrap()
    }

    #[test]
    fn test_dimension_mismatch() {
        let ku = KnotVector::uniform_clamped(4, 2, 0.0, 1.0).unwrap();
        let kv = KnotVector::uniform_clamped(4, 2, 0.0, 1.0).unwrap();
        let grid = ControlGrid::<2>::new([4, 3]).unwrap();
        let err = BSpline::new(grid, [ku, kv]).unwrap_err();
        assert!(matches!(err, SplineError::DimensionMismatch(_)));
    }

    #[test]
    fn test_clamped_corners_interpolate() {
        let spline = clamped_surface();
        let corner = spline.point_at(&[0.0, 0.0]);
        assert!((corner.coords[0] - 0.0).abs() < 1e-12);
        assert!((corner.coords[1] - 0.0).abs() < 1e-12);

        let far = spline.point_at(&[1.0, 1.0]);
        let expected = spline.grid().get(&[3, 2]).unwrap();
        assert!((far.coords[0] - expected.coords[0]).abs() < 1e-12);
        assert!((far.coords[1] - expected.coords[1]).abs() < 1e-12);
        assert!((far.weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_basis_evaluation_is_recorded() {
        let spline = clamped_surface();
        let mut evaluation = BasisEvaluation::default();
        let direct = spline.point_at(&[0.3, 0.6]);
        let cached = spline.point_at_with_basis(&[0.3, 0.6], &mut evaluation);
        assert_eq!(direct, cached);
        assert_eq!(evaluation.basis(0).len(), 3);
        assert_eq!(evaluation.basis(1).len(), 2);

        let mut supports = 0;
        let mut total = 0.0;
        evaluation.for_each_support(|_, w| {
            supports += 1;
            total += w;
        });
        assert_eq!(supports, 6);
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_identity_surface() {
        let spline = SplineSurface::create_identity([0.0, -5.0], [15.0, 10.0], [4, 5], [2, 3]).unwrap();
        for &(x, y) in &[(0.0, -5.0), (15.0, 5.0), (3.3, 0.1), (7.5, -2.25)] {
            let p = spline.transform_point(&Point::from([x, y]));
            assert!((p[0] - x).abs() < 1e-9, "x: {} -> {}", x, p[0]);
            assert!((p[1] - y).abs() < 1e-9, "y: {} -> {}", y, p[1]);
        }
    }

    #[test]
    fn test_identity_control_lattice() {
        // 16 voxel axis, degree 2, 4 control points.
        let spline = SplineSurface::create_identity([0.0, 0.0], [15.0, 15.0], [4, 4], [2, 2]).unwrap();
        for i in 0..4 {
            let cp = spline.grid().get(&[i, 0]).unwrap();
            assert!((cp.coords[0] - (-3.75 + 7.5 * i as f64)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parameters() {
        let mut spline = clamped_surface();
        assert_eq!(spline.parameter_count(), 24);
        let mut params = spline.parameters();
        params[0] = 42.0;
        spline.set_parameters(&params).unwrap();
        assert_eq!(spline.grid().get(&[0, 0]).unwrap().coords[0], 42.0);
        assert!(spline.set_parameters(&params[1..]).is_err());
    }
}
