//! Knot vectors and Cox-de Boor basis evaluation.
//!
//! A knot vector of length `m + 1` with degree `p` supports `n + 1 = m - p`
//! control points. The valid parametric domain is `[knots[p], knots[n + 1]]`.

use crate::error::{Result, SplineError};

/// Highest supported spline degree.
///
/// Basis evaluation runs on fixed-size scratch buffers of `MAX_DEGREE + 1`
/// entries so the per-voxel hot path never allocates.
pub const MAX_DEGREE: usize = 15;

/// Ordered sequence of knot values together with the spline degree.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    knots: Vec<f64>,
    degree: usize,
    /// Index of the last control point (`len - degree - 2`).
    n: usize,
    lower: usize,
    upper: usize,
    /// First and last spans of non-zero width inside the domain.
    first_span: usize,
    last_span: usize,
}

impl KnotVector {
    /// Create a knot vector from raw knot values.
    ///
    /// # Errors
    /// Returns [`SplineError::InvalidKnotVector`] when any knot is smaller
    /// than its predecessor, a knot is not finite, the degree exceeds
    /// [`MAX_DEGREE`], there are fewer than `2 * degree + 2` knots, or the
    /// valid domain has zero length.
    pub fn new(knots: Vec<f64>, degree: usize) -> Result<Self> {
        if degree > MAX_DEGREE {
            return Err(SplineError::invalid_knot_vector(format!(
                "degree {} exceeds the supported maximum {}",
                degree, MAX_DEGREE
            )));
        }
        if knots.len() < 2 * degree + 2 {
            return Err(SplineError::invalid_knot_vector(format!(
                "{} knots cannot support a degree {} spline (need at least {})",
                knots.len(),
                degree,
                2 * degree + 2
            )));
        }
        if let Some(i) = knots.iter().position(|k| !k.is_finite()) {
            return Err(SplineError::invalid_knot_vector(format!(
                "knot {} is not finite ({})",
                i, knots[i]
            )));
        }
        if let Some(i) = knots.windows(2).position(|w| w[1] < w[0]) {
            return Err(SplineError::invalid_knot_vector(format!(
                "knot {} ({}) is smaller than knot {} ({})",
                i + 1,
                knots[i + 1],
                i,
                knots[i]
            )));
        }

        let n = knots.len() - degree - 2;
        if knots[degree] >= knots[n + 1] {
            return Err(SplineError::invalid_knot_vector(format!(
                "empty parametric domain [{}, {}]",
                knots[degree],
                knots[n + 1]
            )));
        }

        // A non-empty domain guarantees at least one span of positive width.
        let first_span = (degree..=n)
            .find(|&i| knots[i] < knots[i + 1])
            .unwrap_or(degree);
        let last_span = (degree..=n)
            .rev()
            .find(|&i| knots[i] < knots[i + 1])
            .unwrap_or(n);

        Ok(Self {
            knots,
            degree,
            n,
            lower: (degree + 2) / 2,
            upper: (degree + 1) / 2,
            first_span,
            last_span,
        })
    }

    /// Knot vector with `degree + 1` repeated knots at both ends.
    ///
    /// The spline interpolates its first and last control points, and the
    /// valid domain is exactly `[start, end]`.
    pub fn uniform_clamped(control_points: usize, degree: usize, start: f64, end: f64) -> Result<Self> {
        Self::check_uniform_arguments(control_points, degree, start, end)?;

        let interior = control_points - degree;
        let mut knots = Vec::with_capacity(control_points + degree + 1);
        knots.extend(std::iter::repeat(start).take(degree + 1));
        for i in 1..interior {
            knots.push(start + (end - start) * i as f64 / interior as f64);
        }
        knots.extend(std::iter::repeat(end).take(degree + 1));

        Self::new(knots, degree)
    }

    /// Evenly spaced knot vector whose valid domain is exactly `[start, end]`.
    ///
    /// Knots extend `degree` intervals beyond both ends of the domain, so every
    /// basis function inside the domain has full support.
    pub fn uniform_unclamped(control_points: usize, degree: usize, start: f64, end: f64) -> Result<Self> {
        Self::check_uniform_arguments(control_points, degree, start, end)?;

        let interval = (end - start) / (control_points - degree) as f64;
        let knots = (0..control_points + degree + 1)
            .map(|i| start + (i as f64 - degree as f64) * interval)
            .collect();

        Self::new(knots, degree)
    }

    fn check_uniform_arguments(control_points: usize, degree: usize, start: f64, end: f64) -> Result<()> {
        if control_points <= degree {
            return Err(SplineError::invalid_knot_vector(format!(
                "{} control points cannot support a degree {} spline",
                control_points, degree
            )));
        }
        if !(start.is_finite() && end.is_finite()) || end <= start {
            return Err(SplineError::invalid_knot_vector(format!(
                "invalid domain [{}, {}]",
                start, end
            )));
        }
        Ok(())
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Index of the last control point supported by this knot vector.
    pub fn n(&self) -> usize {
        self.n
    }

    /// `ceil((degree + 1) / 2)`.
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// `floor((degree + 1) / 2)`.
    pub fn upper(&self) -> usize {
        self.upper
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Number of control points along this axis.
    pub fn control_point_count(&self) -> usize {
        self.n + 1
    }

    /// Valid parametric domain `(knots[degree], knots[n + 1])`.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.n + 1])
    }

    /// Find the knot span containing `u`.
    ///
    /// Returns `i` with `knots[i] <= u < knots[i + 1]`. Parameters at or
    /// before the domain start map to the first span, parameters at or after
    /// the domain end map to the last span.
    pub fn find_span(&self, u: f64) -> usize {
        if u >= self.knots[self.n + 1] {
            return self.last_span;
        }
        if u <= self.knots[self.degree] {
            return self.first_span;
        }

        let mut low = self.degree;
        let mut high = self.n + 1;
        let mut mid = (low + high) / 2;
        while u < self.knots[mid] || u >= self.knots[mid + 1] {
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    /// Evaluate the `degree + 1` non-zero basis functions at `u`.
    pub fn basis_functions(&self, span: usize, u: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.degree + 1];
        self.basis_functions_into(span, u, &mut out);
        out
    }

    /// Evaluate the non-zero basis functions at `u` into `out`.
    ///
    /// `out[k]` receives the value of basis function `span - degree + k`.
    ///
    /// # Panics
    /// Panics if `out` holds fewer than `degree + 1` values or `span` was not
    /// produced by [`KnotVector::find_span`].
    pub fn basis_functions_into(&self, span: usize, u: f64, out: &mut [f64]) {
        let p = self.degree;
        let mut left = [0.0f64; MAX_DEGREE + 1];
        let mut right = [0.0f64; MAX_DEGREE + 1];

        out[0] = 1.0;
        for j in 1..=p {
            left[j] = u - self.knots[span + 1 - j];
            right[j] = self.knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = out[r] / (right[r + 1] + left[j - r]);
                out[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            out[j] = saved;
        }
    }

    /// Parametric support of control point `i`, clipped to the valid domain.
    ///
    /// # Errors
    /// Returns [`SplineError::OutOfRangeIndex`] if `i > n`.
    pub fn find_range(&self, i: usize) -> Result<(f64, f64)> {
        if i > self.n {
            return Err(SplineError::out_of_range(format!(
                "control point {} outside [0, {}]",
                i, self.n
            )));
        }
        let (start, end) = self.domain();
        Ok((
            self.knots[i].max(start),
            self.knots[i + self.degree + 1].min(end),
        ))
    }
}
